//! # オンチェーンバイナリレイアウトの読み取り
//!
//! 外部プログラムが公開しているアカウントレイアウトを読むための
//! カーソルと共通エラー型。レイアウトはプログラム側の公開契約であり、
//! ビット単位で一致させて読む。

use solana_sdk::pubkey::Pubkey;

/// オンチェーンレイアウトのパースエラー。
/// 構造不正は呼び出し側で恒久的な隔離対象になる。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// データが宣言されたレイアウトより短い
    #[error("アカウントデータが途中で終了しています (offset {0})")]
    UnexpectedEnd(usize),
    /// 文字列長フィールドがレイアウト上限を超えている
    #[error("文字列長がレイアウト上限を超えています: {len} > {max}")]
    StringTooLong { len: u32, max: u32 },
    /// 文字列がUTF-8として不正
    #[error("文字列がUTF-8ではありません (offset {0})")]
    InvalidUtf8(usize),
    /// Option/boolフラグが0/1以外
    #[error("フラグバイトが不正です: {0}")]
    InvalidFlag(u8),
    /// 要素数フィールドがレイアウト上限を超えている
    #[error("要素数がレイアウト上限を超えています: {len} > {max}")]
    TooManyElements { len: u32, max: u32 },
}

/// バイト列を先頭から読み進めるカーソル。
/// すべての読み取りは残量検査つきで、不足は`UnexpectedEnd`になる。
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// 現在位置。エラー報告用。
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ParseError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(ParseError::UnexpectedEnd(self.pos))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, ParseError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16, ParseError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, ParseError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_u64_le(&mut self) -> Result<u64, ParseError> {
        let bytes: [u8; 8] = self.read_bytes(8)?.try_into().unwrap();
        Ok(u64::from_le_bytes(bytes))
    }

    pub fn read_i64_le(&mut self) -> Result<i64, ParseError> {
        let bytes: [u8; 8] = self.read_bytes(8)?.try_into().unwrap();
        Ok(i64::from_le_bytes(bytes))
    }

    pub fn read_pubkey(&mut self) -> Result<Pubkey, ParseError> {
        let bytes: [u8; 32] = self.read_bytes(32)?.try_into().unwrap();
        Ok(Pubkey::new_from_array(bytes))
    }

    /// borsh boolを読む。0/1以外は構造不正。
    pub fn read_bool(&mut self) -> Result<bool, ParseError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ParseError::InvalidFlag(other)),
        }
    }

    /// borsh Optionのタグを読む。trueなら後続に中身が続く。
    pub fn read_option_tag(&mut self) -> Result<bool, ParseError> {
        self.read_bool()
    }

    /// borsh文字列（u32長 + バイト列）を読む。
    ///
    /// オンチェーンでは固定容量に確保された文字列が末尾NULで
    /// パディングされていることがあるため、末尾NULは取り除く。
    pub fn read_string(&mut self, max: u32) -> Result<String, ParseError> {
        let len = self.read_u32_le()?;
        if len > max {
            return Err(ParseError::StringTooLong { len, max });
        }
        let start = self.pos;
        let bytes = self.read_bytes(len as usize)?;
        let text = std::str::from_utf8(bytes).map_err(|_| ParseError::InvalidUtf8(start))?;
        Ok(text.trim_end_matches('\0').to_string())
    }
}
