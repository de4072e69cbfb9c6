//! # Ledger RPCコラボレータ
//!
//! コアが台帳から必要とする操作だけを切り出した抽象インターフェース。
//! 実装は`JsonRpcLedger`（素のJSON-RPC 2.0 over HTTP）。
//! テストではプログラム可能なモックに差し替える。

pub mod json;

pub use json::JsonRpcLedger;

use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;

/// RPCエラー。すべて一時的なものとして扱い、内部では再試行しない。
/// 再試行の判断は呼び出し側が行う。
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// HTTP送信自体の失敗
    #[error("RPC送信に失敗: {0}")]
    Transport(String),
    /// レスポンスがJSON-RPCの形をしていない
    #[error("RPCレスポンスのパースに失敗: {0}")]
    Protocol(String),
    /// ノードがエラー応答を返した
    #[error("RPCエラー応答: {0}")]
    Node(String),
}

/// トランザクション送信時に要求するコミットメントレベル。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

/// 送信の即時応答。
/// `Accepted`は送信が受理されたことだけを意味し、チェーン上の
/// ファイナリティを意味しない。`Rejected`の理由はノードの応答そのまま。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitAck {
    Accepted(String),
    Rejected(String),
}

/// 台帳RPCの抽象インターフェース。
#[async_trait::async_trait]
pub trait LedgerRpc: Send + Sync {
    /// アドレスのアカウントデータを取得する。アカウントが存在しなければNone。
    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, RpcError>;

    /// 最新のブロックハッシュを取得する。
    async fn get_latest_blockhash(&self) -> Result<Hash, RpcError>;

    /// 指定サイズのアカウントがrent免除になる最小残高（lamports）。
    async fn get_minimum_balance_for_rent_exemption(
        &self,
        data_len: usize,
    ) -> Result<u64, RpcError>;

    /// アドレスの残高（lamports）。
    async fn get_balance(&self, address: &Pubkey) -> Result<u64, RpcError>;

    /// 署名済みトランザクションを送信する。
    /// ノードのエラー応答は`Ok(SubmitAck::Rejected)`として返し、
    /// 理由をそのまま保持する。Errは送信自体の失敗のみ。
    async fn send_transaction(
        &self,
        tx: &[u8],
        commitment: Commitment,
    ) -> Result<SubmitAck, RpcError>;
}
