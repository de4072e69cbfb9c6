//! # 解決済みアセットの共有ストア
//!
//! 並行して完了する解決結果を集約する単一所有者のストア。
//! ミント参照をキーとした冪等なupsertで更新する。

use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use tokio::sync::RwLock;

use galleon_types::NftAsset;

/// ミント参照をキーとするアセットストア。
///
/// 同一キーへの並行upsertは後勝ち。値は同じミント参照から
/// 決定的に導けるため、どちらが残っても同じ内容になる。
#[derive(Default)]
pub struct AssetStore {
    inner: RwLock<HashMap<Pubkey, NftAsset>>,
}

impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// アセットを登録または置き換える。
    pub async fn upsert(&self, asset: NftAsset) {
        self.inner.write().await.insert(asset.token_ref, asset);
    }

    pub async fn get(&self, token_ref: &Pubkey) -> Option<NftAsset> {
        self.inner.read().await.get(token_ref).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// 保持している全アセットのスナップショット。
    pub async fn all(&self) -> Vec<NftAsset> {
        self.inner.read().await.values().cloned().collect()
    }
}
