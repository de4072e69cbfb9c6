//! # 命令ビルダー
//!
//! ミントフローが使う各プログラムの命令をワイヤ形式で組み立てる。
//! データレイアウトは各プログラムの公開契約。

use sha2::{Digest, Sha256};
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::sysvar;

use galleon_pda::{
    associated_token_program_id, candy_machine_program_id, metadata_program_id,
    system_program_id, token_program_id,
};
use galleon_types::Creator;

/// SPL Tokenのミントアカウントのデータサイズ（バイト）
pub const MINT_ACCOUNT_SIZE: u64 = 82;

// ---------------------------------------------------------------------------
// System Program
// ---------------------------------------------------------------------------

/// ミントアカウント用に資金を入れたアカウントを作成する。
/// rentはpayerが負担し、所有者はSPL Tokenプログラムになる。
pub fn create_mint_account(payer: &Pubkey, mint: &Pubkey, lamports: u64) -> Instruction {
    solana_sdk::system_instruction::create_account(
        payer,
        mint,
        lamports,
        MINT_ACCOUNT_SIZE,
        &token_program_id(),
    )
}

// ---------------------------------------------------------------------------
// SPL Token
// ---------------------------------------------------------------------------

/// SPL Token `InitializeMint` 命令。
///
/// データ: [0] ‖ decimals(1) ‖ mint_authority(32) ‖
///         freeze_authority(COption: 1 + 32)
/// authorityがミント権限とフリーズ権限を兼ねる。
pub fn initialize_mint(mint: &Pubkey, decimals: u8, authority: &Pubkey) -> Instruction {
    let mut data = Vec::with_capacity(67);
    data.push(0u8);
    data.push(decimals);
    data.extend_from_slice(authority.as_ref());
    data.push(1u8);
    data.extend_from_slice(authority.as_ref());

    Instruction {
        program_id: token_program_id(),
        accounts: vec![
            AccountMeta::new(*mint, false),
            AccountMeta::new_readonly(sysvar::rent::id(), false),
        ],
        data,
    }
}

/// SPL Token `MintTo` 命令。
///
/// データ: [7] ‖ amount(u64 LE)
pub fn mint_to(mint: &Pubkey, destination: &Pubkey, authority: &Pubkey, amount: u64) -> Instruction {
    let mut data = Vec::with_capacity(9);
    data.push(7u8);
    data.extend_from_slice(&amount.to_le_bytes());

    Instruction {
        program_id: token_program_id(),
        accounts: vec![
            AccountMeta::new(*mint, false),
            AccountMeta::new(*destination, false),
            AccountMeta::new_readonly(*authority, true),
        ],
        data,
    }
}

// ---------------------------------------------------------------------------
// Associated Token Account
// ---------------------------------------------------------------------------

/// 関連トークンアカウントの`CreateIdempotent`命令。
/// 既に存在する場合はなにもしない。データ: [1]
pub fn create_associated_token_account(
    payer: &Pubkey,
    wallet: &Pubkey,
    mint: &Pubkey,
    associated_token: &Pubkey,
) -> Instruction {
    Instruction {
        program_id: associated_token_program_id(),
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(*associated_token, false),
            AccountMeta::new_readonly(*wallet, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(system_program_id(), false),
            AccountMeta::new_readonly(token_program_id(), false),
        ],
        data: vec![1u8],
    }
}

// ---------------------------------------------------------------------------
// Token Metadata
// ---------------------------------------------------------------------------

/// `CreateMetadataAccountV3`へ渡すメタデータ。
#[derive(Debug, Clone)]
pub struct NftMetadataArgs {
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub seller_fee_basis_points: u16,
    pub creators: Vec<Creator>,
    pub is_mutable: bool,
}

/// Token Metadata `CreateMetadataAccountV3` 命令。
///
/// データ: [33] ‖ name(String) ‖ symbol(String) ‖ uri(String) ‖
///         seller_fee_basis_points(u16) ‖ creators(Option<Vec>) ‖
///         collection(Option=0) ‖ uses(Option=0) ‖ is_mutable(1) ‖
///         collection_details(Option=0)
pub fn create_metadata_account_v3(
    metadata: &Pubkey,
    mint: &Pubkey,
    mint_authority: &Pubkey,
    payer: &Pubkey,
    update_authority: &Pubkey,
    args: &NftMetadataArgs,
) -> Instruction {
    let mut data = vec![33u8];
    put_string(&mut data, &args.name);
    put_string(&mut data, &args.symbol);
    put_string(&mut data, &args.uri);
    data.extend_from_slice(&args.seller_fee_basis_points.to_le_bytes());
    if args.creators.is_empty() {
        data.push(0);
    } else {
        data.push(1);
        data.extend_from_slice(&(args.creators.len() as u32).to_le_bytes());
        for creator in &args.creators {
            data.extend_from_slice(creator.address.as_ref());
            data.push(creator.verified as u8);
            data.push(creator.share);
        }
    }
    data.push(0); // collection
    data.push(0); // uses
    data.push(args.is_mutable as u8);
    data.push(0); // collection_details

    Instruction {
        program_id: metadata_program_id(),
        accounts: vec![
            AccountMeta::new(*metadata, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(*mint_authority, true),
            AccountMeta::new(*payer, true),
            AccountMeta::new_readonly(*update_authority, true),
            AccountMeta::new_readonly(system_program_id(), false),
            AccountMeta::new_readonly(sysvar::rent::id(), false),
        ],
        data,
    }
}

/// Token Metadata `SignMetadata` 命令。クリエイターが自身の
/// verifiedフラグを立てる。データ: [7]
pub fn sign_metadata(metadata: &Pubkey, creator: &Pubkey) -> Instruction {
    Instruction {
        program_id: metadata_program_id(),
        accounts: vec![
            AccountMeta::new(*metadata, false),
            AccountMeta::new_readonly(*creator, true),
        ],
        data: vec![7u8],
    }
}

/// Token Metadata `PuffMetadata` 命令。可変長アカウントを最大サイズ
/// までパディングし、後からの更新を可能にする。データ: [14]
pub fn puff_metadata(metadata: &Pubkey) -> Instruction {
    Instruction {
        program_id: metadata_program_id(),
        accounts: vec![AccountMeta::new(*metadata, false)],
        data: vec![14u8],
    }
}

// ---------------------------------------------------------------------------
// Candy Machine
// ---------------------------------------------------------------------------

/// `MintNft`命令が参照するアカウント一式。
/// 並び順はプログラムの公開契約。
#[derive(Debug, Clone)]
pub struct MintNftAccounts {
    pub candy_machine: Pubkey,
    pub candy_machine_creator: Pubkey,
    pub payer: Pubkey,
    /// Candy Machineの売上受け取りウォレット
    pub wallet: Pubkey,
    pub metadata: Pubkey,
    pub mint: Pubkey,
    pub mint_authority: Pubkey,
    pub update_authority: Pubkey,
    pub master_edition: Pubkey,
}

/// Candy Machine `MintNft` 命令。事前確保された発行枠を1つ消費する。
///
/// データ: sha256("global:mint_nft")[..8] ‖ creator_bump(1)
pub fn candy_machine_mint_nft(accounts: &MintNftAccounts, creator_bump: u8) -> Instruction {
    let mut data = anchor_discriminator("mint_nft").to_vec();
    data.push(creator_bump);

    Instruction {
        program_id: candy_machine_program_id(),
        accounts: vec![
            AccountMeta::new(accounts.candy_machine, false),
            AccountMeta::new_readonly(accounts.candy_machine_creator, false),
            AccountMeta::new(accounts.payer, true),
            AccountMeta::new(accounts.wallet, false),
            AccountMeta::new(accounts.metadata, false),
            AccountMeta::new(accounts.mint, false),
            AccountMeta::new_readonly(accounts.mint_authority, true),
            AccountMeta::new_readonly(accounts.update_authority, true),
            AccountMeta::new(accounts.master_edition, false),
            AccountMeta::new_readonly(metadata_program_id(), false),
            AccountMeta::new_readonly(token_program_id(), false),
            AccountMeta::new_readonly(system_program_id(), false),
            AccountMeta::new_readonly(sysvar::rent::id(), false),
            AccountMeta::new_readonly(sysvar::clock::id(), false),
            AccountMeta::new_readonly(sysvar::recent_blockhashes::id(), false),
            AccountMeta::new_readonly(sysvar::instructions::id(), false),
        ],
        data,
    }
}

/// anchorプログラムのメソッド識別子。
fn anchor_discriminator(method: &str) -> [u8; 8] {
    let mut hasher = Sha256::new();
    hasher.update(format!("global:{method}").as_bytes());
    let hash: [u8; 32] = hasher.finalize().into();
    hash[..8].try_into().unwrap()
}

/// borsh文字列（u32長 + バイト列）を書き込む。
fn put_string(data: &mut Vec<u8>, value: &str) {
    data.extend_from_slice(&(value.len() as u32).to_le_bytes());
    data.extend_from_slice(value.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_mint_layout() {
        let mint = Pubkey::new_unique();
        let authority = Pubkey::new_unique();
        let ix = initialize_mint(&mint, 0, &authority);

        assert_eq!(ix.program_id, token_program_id());
        assert_eq!(ix.data.len(), 67);
        assert_eq!(ix.data[0], 0);
        assert_eq!(ix.data[1], 0);
        assert_eq!(&ix.data[2..34], authority.as_ref());
        assert_eq!(ix.data[34], 1);
        assert_eq!(&ix.data[35..67], authority.as_ref());
    }

    #[test]
    fn test_mint_to_layout() {
        let ix = mint_to(
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            1,
        );
        assert_eq!(ix.data, vec![7, 1, 0, 0, 0, 0, 0, 0, 0]);
        assert!(ix.accounts[2].is_signer);
    }

    #[test]
    fn test_create_metadata_v3_data_prefix_and_signers() {
        let args = NftMetadataArgs {
            name: "Pirate Ship #7".to_string(),
            symbol: "SHIP".to_string(),
            uri: "https://example.org/ship.json".to_string(),
            seller_fee_basis_points: 77,
            creators: vec![Creator {
                address: Pubkey::new_unique(),
                verified: false,
                share: 100,
            }],
            is_mutable: true,
        };
        let ix = create_metadata_account_v3(
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &args,
        );

        assert_eq!(ix.program_id, metadata_program_id());
        assert_eq!(ix.data[0], 33);
        // name長 + 本文が直後に続く
        assert_eq!(&ix.data[1..5], &14u32.to_le_bytes());
        assert_eq!(&ix.data[5..19], b"Pirate Ship #7");
        // mint_authority / payer / update_authority が署名者
        let signer_flags: Vec<bool> = ix.accounts.iter().map(|a| a.is_signer).collect();
        assert_eq!(signer_flags, vec![false, false, true, true, true, false, false]);
    }

    #[test]
    fn test_candy_machine_mint_nft_accounts() {
        let accounts = MintNftAccounts {
            candy_machine: Pubkey::new_unique(),
            candy_machine_creator: Pubkey::new_unique(),
            payer: Pubkey::new_unique(),
            wallet: Pubkey::new_unique(),
            metadata: Pubkey::new_unique(),
            mint: Pubkey::new_unique(),
            mint_authority: Pubkey::new_unique(),
            update_authority: Pubkey::new_unique(),
            master_edition: Pubkey::new_unique(),
        };
        let ix = candy_machine_mint_nft(&accounts, 254);

        assert_eq!(ix.program_id, candy_machine_program_id());
        assert_eq!(ix.accounts.len(), 16);
        assert_eq!(ix.data.len(), 9);
        assert_eq!(ix.data[8], 254);
        assert_eq!(ix.data[..8], anchor_discriminator("mint_nft"));
        assert_eq!(ix.accounts[2].pubkey, accounts.payer);
        assert!(ix.accounts[2].is_signer);
    }

    #[test]
    fn test_anchor_discriminator_is_stable() {
        assert_eq!(
            anchor_discriminator("mint_nft"),
            anchor_discriminator("mint_nft")
        );
        assert_ne!(
            anchor_discriminator("mint_nft"),
            anchor_discriminator("update_candy_machine")
        );
    }
}
