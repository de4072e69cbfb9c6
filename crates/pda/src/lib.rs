//! # プログラム導出アドレス (PDA)
//!
//! シード列とnonceをSHA-256でハッシュし、ed25519曲線上の点に
//! ならないアドレスを探索する。曲線上に乗った候補は秘密鍵が
//! 存在しうるため棄却し、nonceを下げて再試行する。
//!
//! 探索は同一入力に対して常に同一の (address, nonce) を返す。
//! 乱数も外部状態も使わない。

use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// シード1要素の最大長（バイト）
pub const MAX_SEED_LEN: usize = 32;

/// ハッシュ入力末尾に付くドメイン分離サフィックス
const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

// ---------------------------------------------------------------------------
// 既知プログラムID
// ---------------------------------------------------------------------------

/// Token MetadataプログラムID。
pub fn metadata_program_id() -> Pubkey {
    Pubkey::from_str("metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s").unwrap()
}

/// SPL TokenプログラムID。
pub fn token_program_id() -> Pubkey {
    Pubkey::from_str("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA").unwrap()
}

/// Associated Token AccountプログラムID。
pub fn associated_token_program_id() -> Pubkey {
    Pubkey::from_str("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL").unwrap()
}

/// Candy MachineプログラムID。
pub fn candy_machine_program_id() -> Pubkey {
    Pubkey::from_str("cndy3Z4yapfJBmL3ShUp5exZKqR3z33thTzeNMm2gRZ").unwrap()
}

/// System ProgramのID。
pub fn system_program_id() -> Pubkey {
    Pubkey::from_str("11111111111111111111111111111111").unwrap()
}

// ---------------------------------------------------------------------------
// 曲線判定
// ---------------------------------------------------------------------------

/// 32バイト列がed25519曲線上の点かどうかを判定する。
/// テストでは決定的なモックに差し替える。
pub trait CurveCheck: Send + Sync {
    fn is_on_curve(&self, point: &[u8; 32]) -> bool;
}

/// ed25519の点展開による判定。
pub struct Ed25519Curve;

impl CurveCheck for Ed25519Curve {
    fn is_on_curve(&self, point: &[u8; 32]) -> bool {
        curve25519_dalek::edwards::CompressedEdwardsY(*point)
            .decompress()
            .is_some()
    }
}

// ---------------------------------------------------------------------------
// 導出
// ---------------------------------------------------------------------------

/// 導出エラー。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeriveError {
    /// シードが長すぎる。ハッシュ計算前に弾かれる。
    #[error("シードが{MAX_SEED_LEN}バイトを超えています: {0}バイト")]
    SeedTooLong(usize),
    /// 全nonce (255..=0) が曲線上に乗った。このシード列では導出不能。
    #[error("全nonceを試しましたが曲線外のアドレスが見つかりませんでした")]
    DerivationExhausted,
}

/// 1回の導出試行の結果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeriveAttempt {
    /// 曲線外のアドレスが得られた
    Derived(Pubkey),
    /// 候補が曲線上に乗った。nonceを変えて再試行する。
    CurveCollision,
}

/// 導出済みアドレス。`seeds`にはnonceを含まない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedAddress {
    pub address: Pubkey,
    pub nonce: u8,
    pub seeds: Vec<Vec<u8>>,
}

/// PDA探索器。曲線判定を差し替え可能にしてある。
pub struct AddressDeriver {
    curve: Box<dyn CurveCheck>,
}

impl Default for AddressDeriver {
    fn default() -> Self {
        Self::new(Box::new(Ed25519Curve))
    }
}

impl AddressDeriver {
    pub fn new(curve: Box<dyn CurveCheck>) -> Self {
        Self { curve }
    }

    /// 与えられたシード列から候補アドレスを1つ計算する。
    ///
    /// ハッシュ入力: seeds ‖ "ProgramDerivedAddress" ‖ program_id
    /// 32バイト超のシードがあればハッシュ計算せずに失敗する。
    pub fn create_address(
        &self,
        seeds: &[&[u8]],
        program_id: &Pubkey,
    ) -> Result<DeriveAttempt, DeriveError> {
        for seed in seeds {
            if seed.len() > MAX_SEED_LEN {
                return Err(DeriveError::SeedTooLong(seed.len()));
            }
        }

        let mut hasher = Sha256::new();
        for seed in seeds {
            hasher.update(seed);
        }
        hasher.update(PDA_MARKER);
        hasher.update(program_id.as_ref());
        let hash: [u8; 32] = hasher.finalize().into();

        if self.curve.is_on_curve(&hash) {
            Ok(DeriveAttempt::CurveCollision)
        } else {
            Ok(DeriveAttempt::Derived(Pubkey::new_from_array(hash)))
        }
    }

    /// nonceを255から0まで下げながら曲線外アドレスを探索する。
    /// nonceは末尾シードとして追加される。
    pub fn find_program_address(
        &self,
        seeds: &[&[u8]],
        program_id: &Pubkey,
    ) -> Result<DerivedAddress, DeriveError> {
        // 長すぎるシードはnonce探索に入る前に弾く
        for seed in seeds {
            if seed.len() > MAX_SEED_LEN {
                return Err(DeriveError::SeedTooLong(seed.len()));
            }
        }

        let mut nonce = 255u8;
        loop {
            let nonce_seed = [nonce];
            let mut attempt_seeds: Vec<&[u8]> = seeds.to_vec();
            attempt_seeds.push(&nonce_seed);

            match self.create_address(&attempt_seeds, program_id)? {
                DeriveAttempt::Derived(address) => {
                    return Ok(DerivedAddress {
                        address,
                        nonce,
                        seeds: seeds.iter().map(|seed| seed.to_vec()).collect(),
                    });
                }
                DeriveAttempt::CurveCollision => {
                    if nonce == 0 {
                        return Err(DeriveError::DerivationExhausted);
                    }
                    nonce -= 1;
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // 既知シードのヘルパー
    // -----------------------------------------------------------------------

    /// ミントのメタデータアカウントPDA。
    /// seeds = ["metadata", metadata_program, mint]
    pub fn metadata_address(&self, mint: &Pubkey) -> Result<DerivedAddress, DeriveError> {
        let program = metadata_program_id();
        self.find_program_address(
            &[b"metadata", program.as_ref(), mint.as_ref()],
            &program,
        )
    }

    /// ミントのマスターエディションPDA。供給量が1に固定される根拠。
    /// seeds = ["metadata", metadata_program, mint, "edition"]
    pub fn master_edition_address(&self, mint: &Pubkey) -> Result<DerivedAddress, DeriveError> {
        let program = metadata_program_id();
        self.find_program_address(
            &[b"metadata", program.as_ref(), mint.as_ref(), b"edition"],
            &program,
        )
    }

    /// Candy MachineのクリエイターPDA。
    /// seeds = ["candy_machine", candy_machine]
    pub fn candy_machine_creator(
        &self,
        candy_machine: &Pubkey,
    ) -> Result<DerivedAddress, DeriveError> {
        self.find_program_address(
            &[b"candy_machine", candy_machine.as_ref()],
            &candy_machine_program_id(),
        )
    }

    /// ウォレットとミントごとに一意な関連トークンアカウント。
    /// seeds = [wallet, token_program, mint]
    pub fn associated_token_address(
        &self,
        wallet: &Pubkey,
        mint: &Pubkey,
    ) -> Result<DerivedAddress, DeriveError> {
        self.find_program_address(
            &[
                wallet.as_ref(),
                token_program_id().as_ref(),
                mint.as_ref(),
            ],
            &associated_token_program_id(),
        )
    }
}
