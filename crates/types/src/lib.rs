//! # Galleon 共有型定義
//!
//! NFTアセットのデータモデルと、オンチェーン/オフチェーンの
//! ワイヤ形式をRust構造体として提供する。
//!
//! ## エンコーディング規則
//! - Base58: Solanaアドレス・ミント参照（`Pubkey`のDisplay実装）
//! - オンチェーンアカウント: 公開されたプログラムのバイトレイアウト
//!   （`layout` / `metadata` モジュール）
//! - オフチェーンドキュメント: JSON（serde）

pub mod layout;
pub mod metadata;

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

pub use layout::{Cursor, ParseError};
pub use metadata::{Creator, MetadataAccount};

// ---------------------------------------------------------------------------
// オフチェーンJSONドキュメント
// ---------------------------------------------------------------------------

/// メタデータアカウントのuriが指すオフチェーンJSONドキュメント。
/// 発行者ごとにフィールドの揺れが大きいため、未知のフィールドは無視し、
/// 既知のフィールドもすべて省略可能として扱う。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OffchainMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// 画像URL。画像フェッチはこのフィールドに依存する。
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub external_url: Option<String>,
    #[serde(default)]
    pub seller_fee_basis_points: Option<u16>,
    #[serde(default)]
    pub attributes: Option<Vec<JsonAttribute>>,
}

/// オフチェーンJSONのattributes要素。
/// valueは文字列・数値の両方が実在するためJSON値のまま保持する。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonAttribute {
    #[serde(default)]
    pub trait_type: Option<String>,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// 正規化済み画像
// ---------------------------------------------------------------------------

/// 固定解像度へ正規化された画像。PNGで保持する。
#[derive(Debug, Clone)]
pub struct NftImage {
    /// 取得元URL
    pub external_url: Option<String>,
    /// 正規化済みPNGバイト列
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

// ---------------------------------------------------------------------------
// NFTアセット
// ---------------------------------------------------------------------------

/// アセット解決の状態。
/// `Loaded`と`Ignored`は排他で、どちらも終端状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NftStatus {
    /// 未解決、またはオフチェーン取得が失敗して再試行待ち
    Pending,
    /// オンチェーンメタデータとオフチェーンJSONの取得が完了
    Loaded,
    /// 無視リストに登録済み（構造不正の隔離）
    Ignored,
    /// オンチェーンメタデータのパースに失敗
    Failed,
}

/// 解決済み（または解決中の）NFTアセット。
///
/// 画像バイト列はJSONスナップショットには含めない。キャッシュでは
/// JSONブロブと画像ブロブを別キーで保持する。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NftAsset {
    /// 32バイトのオンチェーンミント参照
    pub token_ref: Pubkey,
    /// パース済みオンチェーンメタデータ
    pub metadata: Option<MetadataAccount>,
    /// オフチェーンJSONドキュメント
    pub json: Option<OffchainMetadata>,
    /// 正規化済み画像（キャッシュでは別ブロブ）
    #[serde(skip)]
    pub image: Option<NftImage>,
    pub status: NftStatus,
    /// 直近の失敗理由。Pendingのまま残ったアセットの再試行判断に使う。
    pub error: Option<String>,
}

impl NftAsset {
    /// 未解決のアセットを作る。
    pub fn pending(token_ref: Pubkey) -> Self {
        Self {
            token_ref,
            metadata: None,
            json: None,
            image: None,
            status: NftStatus::Pending,
            error: None,
        }
    }

    /// 無視リスト由来の終端アセットを作る。
    pub fn ignored(token_ref: Pubkey) -> Self {
        Self {
            status: NftStatus::Ignored,
            ..Self::pending(token_ref)
        }
    }

    /// パース失敗の終端アセットを作る。
    pub fn failed(token_ref: Pubkey, reason: impl Into<String>) -> Self {
        Self {
            status: NftStatus::Failed,
            error: Some(reason.into()),
            ..Self::pending(token_ref)
        }
    }
}
