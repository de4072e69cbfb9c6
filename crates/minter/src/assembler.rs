//! # トランザクション組み立て
//!
//! 命令列を与えられた順序のまま1つのトランザクションにまとめる。
//! 組み立ては全か無か。署名者が欠けていれば部分的な結果は返さない。

use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;
use solana_sdk::transaction::Transaction;

use crate::MintError;

/// 組み立て済み（未署名）トランザクション。
#[derive(Debug, Clone)]
pub struct AssembledTransaction {
    /// bincodeでシリアライズされたトランザクション。署名スロットは空。
    pub bytes: Vec<u8>,
    pub blockhash: Hash,
    pub fee_payer: Pubkey,
    /// メッセージが要求する署名者（並び順はメッセージ通り）
    pub signers: Vec<Pubkey>,
}

pub struct TransactionAssembler;

impl TransactionAssembler {
    /// 命令列を署名者検証つきで1トランザクションにまとめる。
    ///
    /// 命令の順序は与えられたまま保存される。メッセージが要求する
    /// 署名者のうち`signers`に含まれないものがあれば`MissingSigner`。
    pub fn build(
        fee_payer: &Pubkey,
        blockhash: &Hash,
        instructions: &[Instruction],
        signers: &[Pubkey],
    ) -> Result<AssembledTransaction, MintError> {
        let message = Message::new_with_blockhash(instructions, Some(fee_payer), blockhash);

        let num_signers = message.header.num_required_signatures as usize;
        let required: Vec<Pubkey> = message.account_keys[..num_signers].to_vec();
        for key in &required {
            if !signers.contains(key) {
                return Err(MintError::MissingSigner(*key));
            }
        }

        let tx = Transaction {
            signatures: vec![Signature::default(); num_signers],
            message,
        };
        let bytes = bincode::serialize(&tx)
            .map_err(|e| MintError::Serialize(format!("トランザクションのシリアライズに失敗: {e}")))?;

        Ok(AssembledTransaction {
            bytes,
            blockhash: *blockhash,
            fee_payer: *fee_payer,
            signers: required,
        })
    }
}

/// トランザクションに部分署名を適用する。
/// キーペアの公開鍵に対応する署名スロットへEd25519署名をセットする。
pub fn partially_sign(tx_bytes: &[u8], keypair: &Keypair) -> Result<Vec<u8>, MintError> {
    let mut tx: Transaction = bincode::deserialize(tx_bytes)
        .map_err(|e| MintError::Serialize(format!("トランザクションのデシリアライズに失敗: {e}")))?;

    let num_signers = tx.message.header.num_required_signatures as usize;
    let pubkey = keypair.pubkey();
    let index = tx
        .message
        .account_keys
        .iter()
        .take(num_signers)
        .position(|key| *key == pubkey)
        .ok_or(MintError::MissingSigner(pubkey))?;

    let signature = keypair.sign_message(&tx.message.serialize());
    tx.signatures[index] = signature;

    bincode::serialize(&tx)
        .map_err(|e| MintError::Serialize(format!("トランザクションのシリアライズに失敗: {e}")))
}
