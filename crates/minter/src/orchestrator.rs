//! # ミントフローのオーケストレーション
//!
//! 状態取得 → アドレス導出 → 組み立て → 署名 → 送信を
//! 厳密に逐次で進める。各段階の出力が次の段階の唯一の入力で、
//! 内部に並列性はない。失敗した試行は内部で再試行せず、
//! 呼び出し側がフロー全体をやり直す。

use std::sync::Arc;

use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;

use galleon_pda::{AddressDeriver, DerivedAddress};
use galleon_rpc::{Commitment, LedgerRpc, SubmitAck};
use galleon_types::Creator;

use crate::assembler::{partially_sign, AssembledTransaction, TransactionAssembler};
use crate::candy::CandyMachineState;
use crate::instructions::{self, MintNftAccounts, NftMetadataArgs, MINT_ACCOUNT_SIZE};
use crate::MintError;

/// この残高（lamports）を下回るとミント前に警告を出す
const LOW_BALANCE_LAMPORTS: u64 = 100_000_000;

/// ミントフローの段階。遷移は宣言順に一方向。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MintStage {
    Init,
    ContextFetched,
    AddressesDerived,
    Assembled,
    Submitted,
    Confirmed,
    Failed,
}

/// 未署名トランザクションに署名する外部コラボレータ。
/// ウォレット側の署名処理はこのコアの範囲外。
#[async_trait::async_trait]
pub trait TransactionSigner: Send + Sync {
    /// 署名者（= fee payer）の公開鍵。
    fn pubkey(&self) -> Pubkey;

    /// 自身のスロットに署名したトランザクションを返す。
    async fn sign_transaction(&self, tx: &[u8]) -> Result<Vec<u8>, String>;
}

/// メタデータ付きミントの入力。
#[derive(Debug, Clone)]
pub struct NftMetadataParams {
    pub name: String,
    pub symbol: String,
    /// オフチェーンJSONドキュメントのURL
    pub uri: String,
    pub seller_fee_basis_points: u16,
}

/// ミントフローで導出したアドレス一式。
#[derive(Debug, Clone)]
struct MintAddresses {
    associated_token: Pubkey,
    metadata: DerivedAddress,
    master_edition: DerivedAddress,
}

/// 送信が受理されたミントの結果。
#[derive(Debug, Clone)]
pub struct MintReceipt {
    /// ノードが返したトランザクション署名
    pub signature: String,
    /// 新しく発行されたミントのアドレス
    pub mint: Pubkey,
    /// 送信した署名済みトランザクション
    pub transaction: Vec<u8>,
}

/// ミントフローのオーケストレータ。
pub struct NftMinter {
    rpc: Arc<dyn LedgerRpc>,
    signer: Arc<dyn TransactionSigner>,
    deriver: AddressDeriver,
    commitment: Commitment,
}

impl NftMinter {
    pub fn new(rpc: Arc<dyn LedgerRpc>, signer: Arc<dyn TransactionSigner>) -> Self {
        Self {
            rpc,
            signer,
            deriver: AddressDeriver::default(),
            commitment: Commitment::Confirmed,
        }
    }

    /// 送信時に要求するコミットメントレベルを変更する。
    pub fn with_commitment(mut self, commitment: Commitment) -> Self {
        self.commitment = commitment;
        self
    }

    /// Candy Machineの発行枠を1つ消費してNFTをミントする。
    pub async fn mint_from_candy_machine(
        &self,
        candy_machine: &Pubkey,
    ) -> Result<MintReceipt, MintError> {
        let payer = self.signer.pubkey();

        // Init → ContextFetched
        let data = self
            .rpc
            .get_account_data(candy_machine)
            .await?
            .ok_or(MintError::AccountMissing(*candy_machine))?;
        let state = CandyMachineState::parse(&data)?;
        tracing::debug!(
            stage = ?MintStage::ContextFetched,
            %candy_machine,
            remaining = state.items_remaining(),
            "Candy Machineの状態を取得"
        );

        // ContextFetched → AddressesDerived
        let mint_keypair = Keypair::new();
        let mint = mint_keypair.pubkey();
        let addresses = self.derive_addresses(&payer, &mint)?;
        let candy_creator = self.deriver.candy_machine_creator(candy_machine)?;
        tracing::debug!(stage = ?MintStage::AddressesDerived, %mint, "アドレスを導出");

        self.warn_if_low_balance(&payer).await;

        // AddressesDerived → Assembled
        let mut ixs = self.common_instructions(&payer, &mint, &addresses).await?;
        ixs.push(instructions::candy_machine_mint_nft(
            &MintNftAccounts {
                candy_machine: *candy_machine,
                candy_machine_creator: candy_creator.address,
                payer,
                wallet: state.wallet,
                metadata: addresses.metadata.address,
                mint,
                mint_authority: payer,
                update_authority: payer,
                master_edition: addresses.master_edition.address,
            },
            candy_creator.nonce,
        ));

        let blockhash = self.rpc.get_latest_blockhash().await?;
        let assembled =
            TransactionAssembler::build(&payer, &blockhash, &ixs, &[payer, mint])?;
        tracing::debug!(stage = ?MintStage::Assembled, instructions = ixs.len(), "トランザクションを組み立て");

        self.submit(assembled, &mint_keypair, mint).await
    }

    /// メタデータレコードを作成してNFTをミントする。
    /// クリエイターはpayer1人、配分100%、自己署名つき。
    pub async fn mint_with_metadata(
        &self,
        params: &NftMetadataParams,
    ) -> Result<MintReceipt, MintError> {
        let payer = self.signer.pubkey();

        // メタデータフローに外部の状態取得はない。Init → ContextFetched
        // は導出に使うクリエイターリストの確定のみ。
        let creators = vec![Creator {
            address: payer,
            verified: false,
            share: 100,
        }];

        let mint_keypair = Keypair::new();
        let mint = mint_keypair.pubkey();
        let addresses = self.derive_addresses(&payer, &mint)?;
        tracing::debug!(stage = ?MintStage::AddressesDerived, %mint, "アドレスを導出");

        self.warn_if_low_balance(&payer).await;

        let mut ixs = self.common_instructions(&payer, &mint, &addresses).await?;
        ixs.push(instructions::create_metadata_account_v3(
            &addresses.metadata.address,
            &mint,
            &payer,
            &payer,
            &payer,
            &NftMetadataArgs {
                name: params.name.clone(),
                symbol: params.symbol.clone(),
                uri: params.uri.clone(),
                seller_fee_basis_points: params.seller_fee_basis_points,
                creators,
                is_mutable: true,
            },
        ));
        ixs.push(instructions::sign_metadata(&addresses.metadata.address, &payer));
        ixs.push(instructions::puff_metadata(&addresses.metadata.address));

        let blockhash = self.rpc.get_latest_blockhash().await?;
        let assembled =
            TransactionAssembler::build(&payer, &blockhash, &ixs, &[payer, mint])?;
        tracing::debug!(stage = ?MintStage::Assembled, instructions = ixs.len(), "トランザクションを組み立て");

        self.submit(assembled, &mint_keypair, mint).await
    }

    /// 両フロー共通の先頭4命令。
    /// (1) ミントアカウント作成 (2) ミント初期化
    /// (3) 関連トークンアカウント作成 (4) 1単位のミント
    async fn common_instructions(
        &self,
        payer: &Pubkey,
        mint: &Pubkey,
        addresses: &MintAddresses,
    ) -> Result<Vec<Instruction>, MintError> {
        let rent = self
            .rpc
            .get_minimum_balance_for_rent_exemption(MINT_ACCOUNT_SIZE as usize)
            .await?;

        Ok(vec![
            instructions::create_mint_account(payer, mint, rent),
            instructions::initialize_mint(mint, 0, payer),
            instructions::create_associated_token_account(
                payer,
                payer,
                mint,
                &addresses.associated_token,
            ),
            instructions::mint_to(mint, &addresses.associated_token, payer, 1),
        ])
    }

    fn derive_addresses(&self, payer: &Pubkey, mint: &Pubkey) -> Result<MintAddresses, MintError> {
        Ok(MintAddresses {
            associated_token: self.deriver.associated_token_address(payer, mint)?.address,
            metadata: self.deriver.metadata_address(mint)?,
            master_edition: self.deriver.master_edition_address(mint)?,
        })
    }

    /// 残高が少ない場合に警告する。残高取得の失敗はフローを止めない。
    async fn warn_if_low_balance(&self, payer: &Pubkey) {
        match self.rpc.get_balance(payer).await {
            Ok(balance) if balance < LOW_BALANCE_LAMPORTS => {
                tracing::warn!(%payer, balance, "残高が少ないためミントが失敗する可能性があります");
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(%payer, error = %e, "残高の取得に失敗"),
        }
    }

    /// Assembled → Submitted → Confirmed | Failed。
    /// ミントキーペアで部分署名し、外部署名者に残りを委ねてから送信する。
    /// 「Confirmed」は送信が受理されたことだけを意味する。
    async fn submit(
        &self,
        assembled: AssembledTransaction,
        mint_keypair: &Keypair,
        mint: Pubkey,
    ) -> Result<MintReceipt, MintError> {
        let partially_signed = partially_sign(&assembled.bytes, mint_keypair)?;
        let signed = self
            .signer
            .sign_transaction(&partially_signed)
            .await
            .map_err(MintError::Signing)?;

        tracing::debug!(stage = ?MintStage::Submitted, %mint, "トランザクションを送信");
        match self.rpc.send_transaction(&signed, self.commitment).await? {
            SubmitAck::Accepted(signature) => {
                tracing::info!(stage = ?MintStage::Confirmed, %signature, %mint, "ミント送信が受理されました");
                Ok(MintReceipt {
                    signature,
                    mint,
                    transaction: signed,
                })
            }
            SubmitAck::Rejected(reason) => {
                tracing::warn!(stage = ?MintStage::Failed, %reason, %mint, "ミントが拒否されました");
                Err(MintError::SubmissionRejected(reason))
            }
        }
    }
}
