//! # NFTミント
//!
//! 1点もののNFTを発行するためのトランザクション組み立てと
//! 送信までの一連のオーケストレーション。
//!
//! - `instructions` — 各プログラムの命令をワイヤ形式で組み立てる
//! - `candy` — Candy Machineアカウントの読み取り
//! - `assembler` — 命令列を署名者検証つきで1トランザクションにまとめる
//! - `orchestrator` — 状態取得→導出→組み立て→送信の逐次フロー

#[allow(deprecated)] // solana-sdk 2.x のsystem_instruction/sysvar非推奨警告を抑制
pub mod instructions;
pub mod candy;
pub mod assembler;
pub mod orchestrator;

pub use assembler::{AssembledTransaction, TransactionAssembler};
pub use candy::CandyMachineState;
pub use orchestrator::{MintReceipt, MintStage, NftMetadataParams, NftMinter, TransactionSigner};

use solana_sdk::pubkey::Pubkey;

/// ミントフロー全体のエラー。
#[derive(Debug, thiserror::Error)]
pub enum MintError {
    /// アドレス導出の失敗。このシード列では決定的に失敗する。
    #[error("アドレス導出に失敗: {0}")]
    Derive(#[from] galleon_pda::DeriveError),
    /// RPC通信の失敗。呼び出し側がフロー全体をやり直す。
    #[error("ネットワークエラー: {0}")]
    Network(#[from] galleon_rpc::RpcError),
    /// 参照したアカウントが存在しない
    #[error("アカウントが存在しません: {0}")]
    AccountMissing(Pubkey),
    /// アカウントデータが公開レイアウトと一致しない
    #[error("アカウントデータのパースに失敗: {0}")]
    Parse(#[from] galleon_types::ParseError),
    /// 必要な署名者が署名者集合に含まれていない
    #[error("必要な署名者がありません: {0}")]
    MissingSigner(Pubkey),
    /// 外部署名者による署名の失敗
    #[error("署名に失敗: {0}")]
    Signing(String),
    /// ノードが送信を拒否した。理由は応答そのまま。
    #[error("トランザクションが拒否されました: {0}")]
    SubmissionRejected(String),
    /// トランザクションのシリアライズ/デシリアライズ失敗
    #[error("トランザクションのシリアライズに失敗: {0}")]
    Serialize(String),
}
