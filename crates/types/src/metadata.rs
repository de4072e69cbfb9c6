//! # トークンメタデータアカウントのレイアウト
//!
//! Token Metadataプログラムが公開しているメタデータアカウントの
//! バイトレイアウトを読む。レイアウトはプログラム側の公開契約で、
//! name/symbol/uriは固定容量に確保され末尾NULでパディングされる。

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::layout::{Cursor, ParseError};

/// nameフィールドの容量（バイト）
pub const MAX_NAME_LENGTH: u32 = 32;
/// symbolフィールドの容量（バイト）
pub const MAX_SYMBOL_LENGTH: u32 = 10;
/// uriフィールドの容量（バイト）
pub const MAX_URI_LENGTH: u32 = 200;
/// クリエイターリストの最大要素数
pub const MAX_CREATOR_COUNT: u32 = 5;

/// クリエイター1件。オンチェーンでは {address(32), verified(1), share(1)} の順。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    pub address: Pubkey,
    pub verified: bool,
    /// ロイヤリティ配分（パーセント）
    pub share: u8,
}

/// パース済みメタデータアカウント。
///
/// アカウント全体のうち、この下流（アセット解決・表示）が使う
/// 先頭部分だけを読む。後続フィールドは読み飛ばされる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataAccount {
    /// アカウント種別タグ
    pub key: u8,
    pub update_authority: Pubkey,
    pub mint: Pubkey,
    pub name: String,
    pub symbol: String,
    /// オフチェーンJSONドキュメントのURL
    pub uri: String,
    pub seller_fee_basis_points: u16,
    pub creators: Vec<Creator>,
}

impl MetadataAccount {
    /// アカウントデータをレイアウト通りに読む。
    ///
    /// レイアウト:
    /// key(1) ‖ update_authority(32) ‖ mint(32) ‖ name(4+len) ‖
    /// symbol(4+len) ‖ uri(4+len) ‖ seller_fee_basis_points(2) ‖
    /// creators(Option: 1 [+ 4 + n*(32+1+1)])
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let mut cursor = Cursor::new(data);

        let key = cursor.read_u8()?;
        let update_authority = cursor.read_pubkey()?;
        let mint = cursor.read_pubkey()?;
        let name = cursor.read_string(MAX_NAME_LENGTH)?;
        let symbol = cursor.read_string(MAX_SYMBOL_LENGTH)?;
        let uri = cursor.read_string(MAX_URI_LENGTH)?;
        let seller_fee_basis_points = cursor.read_u16_le()?;
        let creators = read_creators(&mut cursor)?;

        Ok(Self {
            key,
            update_authority,
            mint,
            name,
            symbol,
            uri,
            seller_fee_basis_points,
            creators,
        })
    }
}

/// Option<Vec<Creator>> を読む。Noneは空リストとして扱う。
fn read_creators(cursor: &mut Cursor<'_>) -> Result<Vec<Creator>, ParseError> {
    if !cursor.read_option_tag()? {
        return Ok(Vec::new());
    }
    let count = cursor.read_u32_le()?;
    if count > MAX_CREATOR_COUNT {
        return Err(ParseError::TooManyElements {
            len: count,
            max: MAX_CREATOR_COUNT,
        });
    }
    let mut creators = Vec::with_capacity(count as usize);
    for _ in 0..count {
        creators.push(Creator {
            address: cursor.read_pubkey()?,
            verified: cursor.read_bool()?,
            share: cursor.read_u8()?,
        });
    }
    Ok(creators)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// テスト用: オンチェーンレイアウト通りにメタデータアカウントを組み立てる。
    /// name/symbol/uriは実機同様に固定容量までNULパディングする。
    pub fn encode_metadata_account(
        update_authority: &Pubkey,
        mint: &Pubkey,
        name: &str,
        symbol: &str,
        uri: &str,
        seller_fee_basis_points: u16,
        creators: &[Creator],
    ) -> Vec<u8> {
        let mut data = vec![4u8];
        data.extend_from_slice(update_authority.as_ref());
        data.extend_from_slice(mint.as_ref());
        put_padded_string(&mut data, name, MAX_NAME_LENGTH);
        put_padded_string(&mut data, symbol, MAX_SYMBOL_LENGTH);
        put_padded_string(&mut data, uri, MAX_URI_LENGTH);
        data.extend_from_slice(&seller_fee_basis_points.to_le_bytes());
        if creators.is_empty() {
            data.push(0);
        } else {
            data.push(1);
            data.extend_from_slice(&(creators.len() as u32).to_le_bytes());
            for creator in creators {
                data.extend_from_slice(creator.address.as_ref());
                data.push(creator.verified as u8);
                data.push(creator.share);
            }
        }
        // 後続フィールド（primary_sale_happened, is_mutable）
        data.push(0);
        data.push(1);
        data
    }

    fn put_padded_string(data: &mut Vec<u8>, value: &str, capacity: u32) {
        data.extend_from_slice(&capacity.to_le_bytes());
        let mut bytes = value.as_bytes().to_vec();
        bytes.resize(capacity as usize, 0);
        data.extend_from_slice(&bytes);
    }
}
