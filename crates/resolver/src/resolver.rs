//! # 解決パイプライン
//!
//! ミント参照 → メタデータPDA → オンチェーンアカウント →
//! オフチェーンJSON → 画像、の順で1アセットを組み立てる。
//! 画像の取得はJSONの取得に依存するため厳密に逐次。
//! 異なるミント参照の解決同士は自由に並行してよい。
//!
//! 隔離の方針: オンチェーンメタデータの構造不正だけが恒久的な
//! 隔離対象。オフチェーン/ネットワーク起因の失敗はアセットを
//! `Pending`のまま残し、負の記録は一切残さない。

use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;

use galleon_pda::{AddressDeriver, DeriveError};
use galleon_rpc::{LedgerRpc, RpcError};
use galleon_types::{MetadataAccount, NftAsset, NftImage, NftStatus, OffchainMetadata};

use crate::cache::{image_key, json_key, AssetCache, CacheError};
use crate::fetch::HttpFetcher;
use crate::ignore::IgnoreList;
use crate::normalize;

/// 正規化後の画像解像度（1辺、ピクセル）の既定値
const DEFAULT_IMAGE_SIZE: u32 = 256;

/// 解決の失敗。
/// オフチェーン取得の失敗はここには現れず、アセットの`error`に残る。
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// オンチェーン取得の失敗。再試行は呼び出し側の判断。
    #[error("ネットワークエラー: {0}")]
    Network(#[from] RpcError),
    /// メタデータPDAの導出失敗
    #[error("アドレス導出に失敗: {0}")]
    Derive(#[from] DeriveError),
    /// キャッシュ/隔離リストの永続化失敗
    #[error("キャッシュの操作に失敗: {0}")]
    Cache(#[from] CacheError),
}

/// アセット解決パイプライン。
pub struct AssetResolver {
    rpc: Arc<dyn LedgerRpc>,
    http: Arc<dyn HttpFetcher>,
    cache: Arc<dyn AssetCache>,
    ignore: IgnoreList,
    deriver: AddressDeriver,
    image_size: u32,
}

impl AssetResolver {
    /// コラボレータを注入して構築する。既存の隔離リストを読み込む。
    pub async fn new(
        rpc: Arc<dyn LedgerRpc>,
        http: Arc<dyn HttpFetcher>,
        cache: Arc<dyn AssetCache>,
    ) -> Result<Self, CacheError> {
        let ignore = IgnoreList::load(cache.clone()).await?;
        Ok(Self {
            rpc,
            http,
            cache,
            ignore,
            deriver: AddressDeriver::default(),
            image_size: DEFAULT_IMAGE_SIZE,
        })
    }

    /// 正規化後の画像解像度を変更する。
    pub fn with_image_size(mut self, size: u32) -> Self {
        self.image_size = size;
        self
    }

    pub fn ignore_list(&self) -> &IgnoreList {
        &self.ignore
    }

    /// ミント参照を解決してアセットを組み立てる。
    ///
    /// 返ったfutureの完了がそのまま解決完了の通知になる。
    /// 完了したアセットは呼び出し側のストアが所有する。
    pub async fn resolve(&self, token_ref: &Pubkey) -> Result<NftAsset, ResolveError> {
        // Step 1: 隔離済みならネットワークに触れず終了
        if self.ignore.contains(token_ref).await {
            tracing::debug!(%token_ref, "隔離済みのため解決をスキップ");
            return Ok(NftAsset::ignored(*token_ref));
        }

        // Step 2: メタデータPDAの導出
        let metadata_pda = self.deriver.metadata_address(token_ref)?;

        // Step 3: オンチェーンアカウントの取得
        let account = self.rpc.get_account_data(&metadata_pda.address).await?;
        let data = match account {
            Some(data) if !data.is_empty() => data,
            _ => {
                // メタデータアカウントがない = NFTではない。恒久的に隔離。
                self.ignore.add(token_ref).await?;
                tracing::warn!(%token_ref, "メタデータアカウントが存在しないため隔離");
                return Ok(NftAsset::ignored(*token_ref));
            }
        };

        // Step 4: 公開レイアウトのパース。構造不正は恒久的に隔離。
        let metadata = match MetadataAccount::parse(&data) {
            Ok(metadata) => metadata,
            Err(e) => {
                self.ignore.add(token_ref).await?;
                tracing::warn!(%token_ref, error = %e, "メタデータのパースに失敗したため隔離");
                return Ok(NftAsset::failed(*token_ref, e.to_string()));
            }
        };

        let json_uri = metadata.uri.clone();
        let mut asset = NftAsset {
            metadata: Some(metadata),
            ..NftAsset::pending(*token_ref)
        };

        // Step 5: オフチェーンJSON。失敗してもPendingのまま、隔離しない。
        match self.http.fetch_bytes(&json_uri).await {
            Ok(bytes) => match serde_json::from_slice::<OffchainMetadata>(&bytes) {
                Ok(json) => {
                    asset.json = Some(json);
                    asset.status = NftStatus::Loaded;
                    self.persist_snapshot(token_ref, &asset).await;
                }
                Err(e) => {
                    asset.error = Some(format!("オフチェーンJSONのパースに失敗: {e}"));
                }
            },
            Err(e) => {
                tracing::debug!(%token_ref, error = %e, "オフチェーンJSONの取得に失敗");
                asset.error = Some(e.to_string());
            }
        }

        // Step 6: 画像。JSONのimageフィールドに依存するため必ずこの後。
        // 失敗してもJSONロード済みの状態は落とさない。
        if let Some(image_url) = asset.json.as_ref().and_then(|json| json.image.clone()) {
            match self.load_image(token_ref, &image_url).await {
                Ok(img) => asset.image = Some(img),
                Err(e) => {
                    tracing::debug!(%token_ref, error = %e, "画像の取得に失敗");
                    asset.error = Some(e);
                }
            }
        }

        Ok(asset)
    }

    /// キャッシュにJSONブロブと画像ブロブが揃っていればネットワークに
    /// 触れず再構築し、なければ完全な`resolve`を行う。
    pub async fn resolve_from_cache_or_remote(
        &self,
        token_ref: &Pubkey,
    ) -> Result<NftAsset, ResolveError> {
        if let Some(asset) = self.load_cached(token_ref).await? {
            tracing::debug!(%token_ref, "キャッシュからアセットを復元");
            return Ok(asset);
        }
        self.resolve(token_ref).await
    }

    async fn load_cached(&self, token_ref: &Pubkey) -> Result<Option<NftAsset>, ResolveError> {
        let Some(snapshot) = self.cache.read(&json_key(token_ref)).await? else {
            return Ok(None);
        };
        let Some(png) = self.cache.read(&image_key(token_ref)).await? else {
            return Ok(None);
        };

        let mut asset: NftAsset = match serde_json::from_slice(&snapshot) {
            Ok(asset) => asset,
            Err(e) => {
                // スナップショットが壊れていたら作り直す
                tracing::warn!(%token_ref, error = %e, "キャッシュエントリのパースに失敗");
                return Ok(None);
            }
        };

        asset.image = Some(NftImage {
            external_url: asset.json.as_ref().and_then(|json| json.image.clone()),
            png,
            width: self.image_size,
            height: self.image_size,
        });
        asset.status = NftStatus::Loaded;
        Ok(Some(asset))
    }

    /// 画像を取得して正規化し、キャッシュへ永続化する。
    async fn load_image(&self, token_ref: &Pubkey, url: &str) -> Result<NftImage, String> {
        let bytes = self.http.fetch_bytes(url).await.map_err(|e| e.to_string())?;
        let png = normalize::square_png(&bytes, self.image_size).map_err(|e| e.to_string())?;

        if let Err(e) = self.cache.write(&image_key(token_ref), &png).await {
            tracing::warn!(%token_ref, error = %e, "画像ブロブの永続化に失敗");
        }

        Ok(NftImage {
            external_url: Some(url.to_string()),
            png,
            width: self.image_size,
            height: self.image_size,
        })
    }

    /// JSONロード済みアセットのスナップショットを永続化する。
    /// 永続化の失敗は解決結果自体を失敗にはしない。
    async fn persist_snapshot(&self, token_ref: &Pubkey, asset: &NftAsset) {
        match serde_json::to_vec(asset) {
            Ok(bytes) => {
                if let Err(e) = self.cache.write(&json_key(token_ref), &bytes).await {
                    tracing::warn!(%token_ref, error = %e, "JSONブロブの永続化に失敗");
                }
            }
            Err(e) => tracing::warn!(%token_ref, error = %e, "スナップショットのエンコードに失敗"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemCache;
    use crate::fetch::FetchError;
    use crate::normalize::tiny_png;
    use galleon_rpc::{Commitment, SubmitAck};
    use solana_sdk::hash::Hash;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// アドレス→データのモックRPC。呼び出し回数を数える。
    struct MockRpc {
        accounts: Mutex<HashMap<Pubkey, Vec<u8>>>,
        calls: AtomicUsize,
    }

    impl MockRpc {
        fn new() -> Self {
            Self {
                accounts: Mutex::new(HashMap::new()),
                calls: AtomicUsize::new(0),
            }
        }

        fn with_account(self, address: Pubkey, data: Vec<u8>) -> Self {
            self.accounts.lock().unwrap().insert(address, data);
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl LedgerRpc for MockRpc {
        async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, RpcError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.accounts.lock().unwrap().get(address).cloned())
        }

        async fn get_latest_blockhash(&self) -> Result<Hash, RpcError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Hash::new_unique())
        }

        async fn get_minimum_balance_for_rent_exemption(
            &self,
            _data_len: usize,
        ) -> Result<u64, RpcError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }

        async fn get_balance(&self, _address: &Pubkey) -> Result<u64, RpcError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }

        async fn send_transaction(
            &self,
            _tx: &[u8],
            _commitment: Commitment,
        ) -> Result<SubmitAck, RpcError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SubmitAck::Rejected("テストでは送信しない".to_string()))
        }
    }

    /// URL→バイト列のモックHTTP。登録のないURLは404扱い。
    struct MockHttp {
        responses: Mutex<HashMap<String, Vec<u8>>>,
        calls: AtomicUsize,
    }

    impl MockHttp {
        fn new() -> Self {
            Self {
                responses: Mutex::new(HashMap::new()),
                calls: AtomicUsize::new(0),
            }
        }

        fn with_response(self, url: &str, bytes: Vec<u8>) -> Self {
            self.responses.lock().unwrap().insert(url.to_string(), bytes);
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl HttpFetcher for MockHttp {
        async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::Missing(url.to_string()))
        }
    }

    /// テスト用: 公開レイアウト通りのメタデータアカウントを組み立てる。
    fn encode_metadata(mint: &Pubkey, uri: &str) -> Vec<u8> {
        fn put_padded(data: &mut Vec<u8>, value: &str, capacity: u32) {
            data.extend_from_slice(&capacity.to_le_bytes());
            let mut bytes = value.as_bytes().to_vec();
            bytes.resize(capacity as usize, 0);
            data.extend_from_slice(&bytes);
        }

        let mut data = vec![4u8];
        data.extend_from_slice(Pubkey::new_unique().as_ref());
        data.extend_from_slice(mint.as_ref());
        put_padded(&mut data, "Pirate Ship #7", 32);
        put_padded(&mut data, "SHIP", 10);
        put_padded(&mut data, uri, 200);
        data.extend_from_slice(&500u16.to_le_bytes());
        data.push(0); // creators: None
        data
    }

    /// メタデータPDA（解決パイプラインが参照するアカウントの場所）
    fn metadata_pda(token_ref: &Pubkey) -> Pubkey {
        AddressDeriver::default()
            .metadata_address(token_ref)
            .unwrap()
            .address
    }

    async fn build_resolver(
        rpc: Arc<MockRpc>,
        http: Arc<MockHttp>,
        cache: Arc<MemCache>,
    ) -> AssetResolver {
        AssetResolver::new(rpc, http, cache)
            .await
            .unwrap()
            .with_image_size(8)
    }

    #[tokio::test]
    async fn test_full_resolution_loads_json_and_image() {
        let token_ref = Pubkey::new_unique();
        let json_uri = "https://example.org/ship.json";
        let image_uri = "https://example.org/ship.png";

        let rpc = Arc::new(
            MockRpc::new().with_account(metadata_pda(&token_ref), encode_metadata(&token_ref, json_uri)),
        );
        let json_doc = serde_json::json!({"name": "Pirate Ship #7", "image": image_uri});
        let http = Arc::new(
            MockHttp::new()
                .with_response(json_uri, serde_json::to_vec(&json_doc).unwrap())
                .with_response(image_uri, tiny_png(3, 5)),
        );
        let cache = Arc::new(MemCache::new());

        let resolver = build_resolver(rpc, http, cache.clone()).await;
        let asset = resolver.resolve(&token_ref).await.unwrap();

        assert_eq!(asset.status, NftStatus::Loaded);
        assert_eq!(asset.metadata.as_ref().unwrap().name, "Pirate Ship #7");
        assert_eq!(asset.json.as_ref().unwrap().image.as_deref(), Some(image_uri));
        let img = asset.image.as_ref().unwrap();
        assert_eq!((img.width, img.height), (8, 8));
        // 両ブロブがキャッシュに永続化されている
        assert!(cache.contains(&json_key(&token_ref)).await.unwrap());
        assert!(cache.contains(&image_key(&token_ref)).await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_account_is_quarantined_without_cache_writes() {
        let token_ref = Pubkey::new_unique();
        let rpc = Arc::new(MockRpc::new().with_account(metadata_pda(&token_ref), Vec::new()));
        let http = Arc::new(MockHttp::new());
        let cache = Arc::new(MemCache::new());

        let resolver = build_resolver(rpc, http.clone(), cache.clone()).await;
        let asset = resolver.resolve(&token_ref).await.unwrap();

        assert_eq!(asset.status, NftStatus::Ignored);
        assert!(resolver.ignore_list().contains(&token_ref).await);
        // JSON/画像のキャッシュエントリは作られない
        assert!(!cache.contains(&json_key(&token_ref)).await.unwrap());
        assert!(!cache.contains(&image_key(&token_ref)).await.unwrap());
        assert_eq!(http.calls(), 0);
    }

    #[tokio::test]
    async fn test_quarantine_is_idempotent_and_short_circuits() {
        let token_ref = Pubkey::new_unique();
        // パース不能な構造不正データ
        let rpc = Arc::new(
            MockRpc::new().with_account(metadata_pda(&token_ref), vec![4, 1, 2, 3]),
        );
        let http = Arc::new(MockHttp::new());
        let cache = Arc::new(MemCache::new());

        let resolver = build_resolver(rpc.clone(), http, cache).await;

        let first = resolver.resolve(&token_ref).await.unwrap();
        assert_eq!(first.status, NftStatus::Failed);
        assert!(first.error.is_some());
        assert_eq!(resolver.ignore_list().len().await, 1);
        assert_eq!(rpc.calls(), 1);

        // 2回目は隔離リストで短絡し、ネットワークに一切触れない
        let second = resolver.resolve(&token_ref).await.unwrap();
        assert_eq!(second.status, NftStatus::Ignored);
        assert_eq!(resolver.ignore_list().len().await, 1);
        assert_eq!(rpc.calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_offchain_json_stays_pending() {
        let token_ref = Pubkey::new_unique();
        let json_uri = "https://example.org/missing.json";
        let rpc = Arc::new(
            MockRpc::new().with_account(metadata_pda(&token_ref), encode_metadata(&token_ref, json_uri)),
        );
        let http = Arc::new(MockHttp::new()); // 全URLが404
        let cache = Arc::new(MemCache::new());

        let resolver = build_resolver(rpc, http, cache.clone()).await;
        let asset = resolver.resolve(&token_ref).await.unwrap();

        // 一時的な失敗: Pendingのまま、隔離もキャッシュ書き込みもなし
        assert_eq!(asset.status, NftStatus::Pending);
        assert!(asset.error.is_some());
        assert!(resolver.ignore_list().is_empty().await);
        assert!(!cache.contains(&json_key(&token_ref)).await.unwrap());
    }

    #[tokio::test]
    async fn test_image_failure_keeps_loaded_status() {
        let token_ref = Pubkey::new_unique();
        let json_uri = "https://example.org/ship.json";
        let image_uri = "https://example.org/broken.png";

        let rpc = Arc::new(
            MockRpc::new().with_account(metadata_pda(&token_ref), encode_metadata(&token_ref, json_uri)),
        );
        let json_doc = serde_json::json!({"image": image_uri});
        let http = Arc::new(
            MockHttp::new()
                .with_response(json_uri, serde_json::to_vec(&json_doc).unwrap())
                .with_response(image_uri, b"not an image".to_vec()),
        );
        let cache = Arc::new(MemCache::new());

        let resolver = build_resolver(rpc, http, cache.clone()).await;
        let asset = resolver.resolve(&token_ref).await.unwrap();

        assert_eq!(asset.status, NftStatus::Loaded);
        assert!(asset.image.is_none());
        assert!(asset.error.is_some());
        // JSONブロブは永続化済み、画像ブロブはなし
        assert!(cache.contains(&json_key(&token_ref)).await.unwrap());
        assert!(!cache.contains(&image_key(&token_ref)).await.unwrap());
    }

    #[tokio::test]
    async fn test_cache_hit_makes_zero_network_calls() {
        let token_ref = Pubkey::new_unique();
        let rpc = Arc::new(MockRpc::new());
        let http = Arc::new(MockHttp::new());
        let cache = Arc::new(MemCache::new());

        // 事前に両ブロブを永続化しておく
        let mut snapshot = NftAsset::pending(token_ref);
        snapshot.json = Some(OffchainMetadata {
            name: Some("Pirate Ship #7".to_string()),
            image: Some("https://example.org/ship.png".to_string()),
            ..OffchainMetadata::default()
        });
        snapshot.status = NftStatus::Loaded;
        cache
            .write(&json_key(&token_ref), &serde_json::to_vec(&snapshot).unwrap())
            .await
            .unwrap();
        cache
            .write(&image_key(&token_ref), &tiny_png(8, 8))
            .await
            .unwrap();

        let resolver = build_resolver(rpc.clone(), http.clone(), cache).await;
        let asset = resolver
            .resolve_from_cache_or_remote(&token_ref)
            .await
            .unwrap();

        assert_eq!(asset.status, NftStatus::Loaded);
        assert_eq!(asset.json.as_ref().unwrap().name.as_deref(), Some("Pirate Ship #7"));
        assert!(asset.image.is_some());
        assert_eq!(rpc.calls(), 0);
        assert_eq!(http.calls(), 0);
    }

    #[tokio::test]
    async fn test_partial_cache_falls_back_to_full_resolution() {
        let token_ref = Pubkey::new_unique();
        let json_uri = "https://example.org/ship.json";
        let rpc = Arc::new(
            MockRpc::new().with_account(metadata_pda(&token_ref), encode_metadata(&token_ref, json_uri)),
        );
        let json_doc = serde_json::json!({"name": "Pirate Ship #7"});
        let http = Arc::new(
            MockHttp::new().with_response(json_uri, serde_json::to_vec(&json_doc).unwrap()),
        );
        let cache = Arc::new(MemCache::new());
        // 画像ブロブだけ存在する中途半端な状態
        cache
            .write(&image_key(&token_ref), &tiny_png(8, 8))
            .await
            .unwrap();

        let resolver = build_resolver(rpc.clone(), http, cache).await;
        let asset = resolver
            .resolve_from_cache_or_remote(&token_ref)
            .await
            .unwrap();

        assert_eq!(asset.status, NftStatus::Loaded);
        assert!(rpc.calls() > 0);
    }
}
