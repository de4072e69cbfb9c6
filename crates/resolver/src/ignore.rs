//! # 無視リスト
//!
//! 構造不正と判定されたミント参照の恒久的な隔離リスト。
//! キャッシュストアの固定キーにJSON配列として永続化する。
//! 登録は構造不正のみが対象で、ネットワーク起因の失敗は記録しない。

use solana_sdk::pubkey::Pubkey;
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::cache::{AssetCache, CacheError, IGNORE_LIST_KEY};

/// 永続化つきの隔離リスト。
pub struct IgnoreList {
    cache: Arc<dyn AssetCache>,
    inner: RwLock<HashSet<Pubkey>>,
}

impl IgnoreList {
    /// キャッシュから既存のリストを読み込む。
    /// エントリが壊れていても起動は止めず、空のリストから始める。
    pub async fn load(cache: Arc<dyn AssetCache>) -> Result<Self, CacheError> {
        let set = match cache.read(IGNORE_LIST_KEY).await? {
            Some(bytes) => match serde_json::from_slice::<Vec<String>>(&bytes) {
                Ok(entries) => entries
                    .iter()
                    .filter_map(|entry| Pubkey::from_str(entry).ok())
                    .collect(),
                Err(e) => {
                    tracing::warn!(error = %e, "無視リストのパースに失敗したため空から開始");
                    HashSet::new()
                }
            },
            None => HashSet::new(),
        };

        Ok(Self {
            cache,
            inner: RwLock::new(set),
        })
    }

    pub async fn contains(&self, token_ref: &Pubkey) -> bool {
        self.inner.read().await.contains(token_ref)
    }

    /// 隔離リストへ追加して永続化する。
    /// 既に登録済みならなにもせずfalseを返す（冪等）。
    pub async fn add(&self, token_ref: &Pubkey) -> Result<bool, CacheError> {
        {
            let mut set = self.inner.write().await;
            if !set.insert(*token_ref) {
                return Ok(false);
            }
        }

        let mut snapshot: Vec<String> = self
            .inner
            .read()
            .await
            .iter()
            .map(|key| key.to_string())
            .collect();
        snapshot.sort();

        let bytes = serde_json::to_vec(&snapshot)
            .map_err(|e| CacheError::Encode(format!("無視リストのエンコードに失敗: {e}")))?;
        self.cache.write(IGNORE_LIST_KEY, &bytes).await?;
        Ok(true)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
