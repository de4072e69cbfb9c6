//! # HTTPフェッチの抽象化
//!
//! オフチェーンJSONと画像の取得を抽象化する。実装はreqwest。
//! テストではURL→バイト列のモックに差し替える。

/// フェッチエラー。
/// `Missing`は恒久的な欠落ではなく、再試行可能なものとして扱われる。
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// 404等、リソースが見つからない
    #[error("リソースが見つかりません: {0}")]
    Missing(String),
    /// 404以外のエラーステータス
    #[error("HTTPステータス{status}: {url}")]
    Status { status: u16, url: String },
    /// 送信自体の失敗
    #[error("HTTP通信に失敗: {0}")]
    Network(String),
    /// レスポンスがJSONとして不正
    #[error("JSONのデコードに失敗: {0}")]
    Decode(String),
}

/// URLからバイト列を取得するコラボレータ。
#[async_trait::async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError>;

    /// URLをJSONとして取得する。
    async fn fetch_json(&self, url: &str) -> Result<serde_json::Value, FetchError> {
        let bytes = self.fetch_bytes(url).await?;
        serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

/// reqwestによる実装。
pub struct ReqwestFetcher {
    http: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(format!("{url}の取得に失敗: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::Missing(url.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(format!("{url}の本文の読み取りに失敗: {e}")))?;
        Ok(bytes.to_vec())
    }
}
