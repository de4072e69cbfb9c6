//! # 画像の正規化
//!
//! 取得した画像を固定の正方形解像度へ引き伸ばし、PNGで再エンコード
//! する。アスペクト比は保持しない（レターボックスなし）。

/// 正規化エラー。
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("画像のデコードに失敗: {0}")]
    Decode(String),
    #[error("画像のエンコードに失敗: {0}")]
    Encode(String),
}

/// 画像バイト列を`size`×`size`のPNGへ正規化する。
pub fn square_png(bytes: &[u8], size: u32) -> Result<Vec<u8>, NormalizeError> {
    let decoded =
        image::load_from_memory(bytes).map_err(|e| NormalizeError::Decode(e.to_string()))?;

    // 縦横とも強制的にsizeへ。アスペクト比は保持しない。
    let resized = decoded.resize_exact(size, size, image::imageops::FilterType::Triangle);

    let mut out = Vec::new();
    resized
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .map_err(|e| NormalizeError::Encode(e.to_string()))?;
    Ok(out)
}

/// テスト用: 単色の小さなPNGを作る。
#[cfg(test)]
pub(crate) fn tiny_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    #[test]
    fn test_stretches_to_square() {
        let source = tiny_png(3, 5);
        let normalized = square_png(&source, 8).unwrap();

        let decoded = image::load_from_memory(&normalized).unwrap();
        assert_eq!(decoded.dimensions(), (8, 8));
    }

    #[test]
    fn test_rejects_garbage_bytes() {
        let result = square_png(b"definitely not an image", 8);
        assert!(matches!(result, Err(NormalizeError::Decode(_))));
    }
}
