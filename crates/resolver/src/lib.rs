//! # NFTアセット解決
//!
//! 32バイトのミント参照から、オンチェーンメタデータ・オフチェーン
//! JSON・正規化済み画像まで揃ったNFTアセットを組み立てるパイプライン。
//!
//! - `fetch` — HTTPフェッチの抽象化
//! - `cache` — 永続キャッシュ（JSONブロブ + 画像ブロブ）
//! - `ignore` — 構造不正トークンの恒久的な隔離リスト
//! - `normalize` — 画像の固定解像度への正規化
//! - `resolver` — 解決パイプライン本体
//! - `store` — 解決済みアセットの共有ストア

pub mod cache;
pub mod fetch;
pub mod ignore;
pub mod normalize;
pub mod resolver;
pub mod store;

pub use cache::{AssetCache, CacheError, FsAssetCache, MemCache};
pub use fetch::{FetchError, HttpFetcher, ReqwestFetcher};
pub use ignore::IgnoreList;
pub use resolver::{AssetResolver, ResolveError};
pub use store::AssetStore;
