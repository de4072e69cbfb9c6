//! # JSON-RPC 2.0 実装
//!
//! 素のJSON-RPCリクエストをreqwestで送る。SDKのRPCクライアントには
//! 依存せず、コアが使うメソッドだけを実装する。

use base64::Engine;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

use crate::{Commitment, LedgerRpc, RpcError, SubmitAck};

/// Base64エンジン。アカウントデータとトランザクションの両方で使う。
fn b64() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

/// JSON-RPC 2.0で台帳ノードと通信するRPC実装。
pub struct JsonRpcLedger {
    url: String,
    http: reqwest::Client,
}

impl JsonRpcLedger {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http: reqwest::Client::new(),
        }
    }

    /// 環境変数`SOLANA_RPC_URL`から構築する。未設定ならdevnet。
    pub fn from_env() -> Self {
        let url = std::env::var("SOLANA_RPC_URL")
            .unwrap_or_else(|_| "https://api.devnet.solana.com".to_string());
        Self::new(url)
    }

    /// JSON-RPCリクエストを1回送り、`result`フィールドを取り出す。
    async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, RpcError> {
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RpcError::Transport(format!("{method}の送信に失敗: {e}")))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RpcError::Protocol(format!("{method}のレスポンスのパースに失敗: {e}")))?;

        if let Some(error) = body.get("error") {
            return Err(RpcError::Node(error.to_string()));
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| RpcError::Protocol(format!("{method}のレスポンスにresultがありません")))
    }
}

#[async_trait::async_trait]
impl LedgerRpc for JsonRpcLedger {
    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, RpcError> {
        let result = self
            .call(
                "getAccountInfo",
                serde_json::json!([address.to_string(), {"encoding": "base64"}]),
            )
            .await?;

        let value = result.get("value");
        if value.is_none() || value == Some(&serde_json::Value::Null) {
            return Ok(None);
        }

        let encoded = result
            .pointer("/value/data/0")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                RpcError::Protocol("getAccountInfoのレスポンスにdataがありません".to_string())
            })?;

        let data = b64()
            .decode(encoded)
            .map_err(|e| RpcError::Protocol(format!("アカウントデータのBase64デコードに失敗: {e}")))?;
        Ok(Some(data))
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, RpcError> {
        let result = self
            .call("getLatestBlockhash", serde_json::json!([]))
            .await?;

        let blockhash = result
            .pointer("/value/blockhash")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                RpcError::Protocol("getLatestBlockhashのレスポンスにblockhashがありません".to_string())
            })?;

        Hash::from_str(blockhash)
            .map_err(|e| RpcError::Protocol(format!("ブロックハッシュのパースに失敗: {e}")))
    }

    async fn get_minimum_balance_for_rent_exemption(
        &self,
        data_len: usize,
    ) -> Result<u64, RpcError> {
        let result = self
            .call(
                "getMinimumBalanceForRentExemption",
                serde_json::json!([data_len]),
            )
            .await?;

        result.as_u64().ok_or_else(|| {
            RpcError::Protocol("rent免除残高が数値ではありません".to_string())
        })
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64, RpcError> {
        let result = self
            .call("getBalance", serde_json::json!([address.to_string()]))
            .await?;

        result
            .pointer("/value")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| RpcError::Protocol("残高が数値ではありません".to_string()))
    }

    async fn send_transaction(
        &self,
        tx: &[u8],
        commitment: Commitment,
    ) -> Result<SubmitAck, RpcError> {
        let tx_b64 = b64().encode(tx);
        let params = serde_json::json!([
            tx_b64,
            {"encoding": "base64", "preflightCommitment": commitment.as_str()},
        ]);

        // ノードのエラー応答は拒否理由としてそのまま呼び出し側へ返す
        match self.call("sendTransaction", params).await {
            Ok(result) => {
                let signature = result.as_str().ok_or_else(|| {
                    RpcError::Protocol("sendTransactionのレスポンスに署名がありません".to_string())
                })?;
                tracing::debug!(%signature, "トランザクション送信が受理されました");
                Ok(SubmitAck::Accepted(signature.to_string()))
            }
            Err(RpcError::Node(reason)) => {
                tracing::debug!(%reason, "トランザクション送信が拒否されました");
                Ok(SubmitAck::Rejected(reason))
            }
            Err(other) => Err(other),
        }
    }
}
