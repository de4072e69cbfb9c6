//! # 永続キャッシュ
//!
//! ミント参照ごとにJSONブロブと画像ブロブを別キーで保持する
//! キー・バリューストアの抽象化と、ファイルシステム実装。
//! エビクションは行わない。エントリは無期限に蓄積される。

use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;

/// 無視リストを永続化するキー
pub const IGNORE_LIST_KEY: &str = "ignored_tokens.json";

/// アセットスナップショット（JSONブロブ）のキー。
pub fn json_key(token_ref: &Pubkey) -> String {
    format!("json_{token_ref}.json")
}

/// 正規化済み画像（PNGブロブ）のキー。
pub fn image_key(token_ref: &Pubkey) -> String {
    format!("image_{token_ref}.png")
}

/// キャッシュエラー。
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("キャッシュの読み書きに失敗: {0}")]
    Io(String),
    #[error("キャッシュエントリのエンコードに失敗: {0}")]
    Encode(String),
}

/// 永続キャッシュの抽象インターフェース。
///
/// 同一キーへの書き込みは単一書き込み者を前提とする。値は同じ
/// ミント参照から決定的に導けるため、競合時は後勝ちで構わない。
#[async_trait::async_trait]
pub trait AssetCache: Send + Sync {
    /// キーの値を読む。存在しなければNone。
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// キーへ値を書く。既存の値は上書きされる。
    async fn write(&self, key: &str, value: &[u8]) -> Result<(), CacheError>;

    /// キーが存在するか。
    async fn contains(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.read(key).await?.is_some())
    }
}

/// ファイルシステム実装。1キー1ファイル。
pub struct FsAssetCache {
    dir: PathBuf,
}

impl FsAssetCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// 環境変数`GALLEON_CACHE_DIR`から構築する。
    pub fn from_env() -> Self {
        let dir = std::env::var("GALLEON_CACHE_DIR")
            .unwrap_or_else(|_| ".galleon-cache".to_string());
        Self::new(dir)
    }
}

#[async_trait::async_trait]
impl AssetCache for FsAssetCache {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        match tokio::fs::read(self.dir.join(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::Io(format!("{key}の読み取りに失敗: {e}"))),
        }
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CacheError::Io(format!("キャッシュディレクトリの作成に失敗: {e}")))?;
        tokio::fs::write(self.dir.join(key), value)
            .await
            .map_err(|e| CacheError::Io(format!("{key}の書き込みに失敗: {e}")))
    }

    async fn contains(&self, key: &str) -> Result<bool, CacheError> {
        tokio::fs::try_exists(self.dir.join(key))
            .await
            .map_err(|e| CacheError::Io(format!("{key}の存在確認に失敗: {e}")))
    }
}

/// メモリ実装。テストとオフライン実行用。
#[derive(Default)]
pub struct MemCache {
    inner: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl AssetCache for MemCache {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.inner.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        self.inner.write().await.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.inner.read().await.contains_key(key))
    }
}
