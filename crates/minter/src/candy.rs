//! # Candy Machineアカウントの読み取り
//!
//! 発行枠を事前確保するCandy Machineのアカウントレイアウトを読み、
//! ミントフローが必要とする部分（売上ウォレット・クリエイター・
//! 残り発行数）を取り出す。レイアウトはプログラムの公開契約。

use solana_sdk::pubkey::Pubkey;

use galleon_types::{Creator, Cursor, ParseError};

/// シンボル文字列の容量
const MAX_SYMBOL_LENGTH: u32 = 10;
/// uuid文字列の容量
const MAX_UUID_LENGTH: u32 = 6;
/// 隠し設定のname/uri容量
const MAX_HIDDEN_NAME_LENGTH: u32 = 32;
const MAX_HIDDEN_URI_LENGTH: u32 = 200;
/// クリエイターリストの最大要素数
const MAX_CREATOR_COUNT: u32 = 5;

/// パース済みCandy Machineアカウント。
///
/// レイアウト（8バイトのアカウント識別子の後）:
/// authority(32) ‖ wallet(32) ‖ token_mint(Option: 1 [+32]) ‖
/// items_redeemed(u64) ‖ uuid(String) ‖ price(u64) ‖ symbol(String) ‖
/// seller_fee_basis_points(u16) ‖ max_supply(u64) ‖ is_mutable(1) ‖
/// retain_authority(1) ‖ go_live_date(Option<i64>) ‖
/// end_settings(Option: 1 [+1+8]) ‖ creators(Vec) ‖
/// hidden_settings(Option) ‖ whitelist_mint_settings(Option) ‖
/// items_available(u64)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandyMachineState {
    pub authority: Pubkey,
    /// ミント代金の受け取りウォレット
    pub wallet: Pubkey,
    pub token_mint: Option<Pubkey>,
    pub items_redeemed: u64,
    pub price: u64,
    pub symbol: String,
    pub seller_fee_basis_points: u16,
    pub go_live_date: Option<i64>,
    pub creators: Vec<Creator>,
    pub items_available: u64,
}

impl CandyMachineState {
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let mut cursor = Cursor::new(data);

        // アカウント識別子は読み飛ばす
        cursor.read_bytes(8)?;

        let authority = cursor.read_pubkey()?;
        let wallet = cursor.read_pubkey()?;
        let token_mint = if cursor.read_option_tag()? {
            Some(cursor.read_pubkey()?)
        } else {
            None
        };
        let items_redeemed = cursor.read_u64_le()?;

        let _uuid = cursor.read_string(MAX_UUID_LENGTH)?;
        let price = cursor.read_u64_le()?;
        let symbol = cursor.read_string(MAX_SYMBOL_LENGTH)?;
        let seller_fee_basis_points = cursor.read_u16_le()?;
        let _max_supply = cursor.read_u64_le()?;
        let _is_mutable = cursor.read_bool()?;
        let _retain_authority = cursor.read_bool()?;
        let go_live_date = if cursor.read_option_tag()? {
            Some(cursor.read_i64_le()?)
        } else {
            None
        };

        // end_settings: end_setting_type(1) + number(8)
        if cursor.read_option_tag()? {
            cursor.read_u8()?;
            cursor.read_u64_le()?;
        }

        let creators = read_creators(&mut cursor)?;

        // hidden_settings: name + uri + hash(32)
        if cursor.read_option_tag()? {
            cursor.read_string(MAX_HIDDEN_NAME_LENGTH)?;
            cursor.read_string(MAX_HIDDEN_URI_LENGTH)?;
            cursor.read_bytes(32)?;
        }

        // whitelist_mint_settings: mode(1) + mint(32) + presale(1) +
        // discount_price(Option<u64>)
        if cursor.read_option_tag()? {
            cursor.read_u8()?;
            cursor.read_pubkey()?;
            cursor.read_bool()?;
            if cursor.read_option_tag()? {
                cursor.read_u64_le()?;
            }
        }

        let items_available = cursor.read_u64_le()?;

        Ok(Self {
            authority,
            wallet,
            token_mint,
            items_redeemed,
            price,
            symbol,
            seller_fee_basis_points,
            go_live_date,
            creators,
            items_available,
        })
    }

    /// 残り発行数。
    pub fn items_remaining(&self) -> u64 {
        self.items_available.saturating_sub(self.items_redeemed)
    }
}

fn read_creators(cursor: &mut Cursor<'_>) -> Result<Vec<Creator>, ParseError> {
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
