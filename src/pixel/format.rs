//! 画素フォーマットとビットマップレイアウト

use serde::{Deserialize, Serialize};

/// 1画素あたりのバイト数（全フォーマット共通）
pub const BYTES_PER_PIXEL: usize = 4;

/// 1チャネルあたりのビット数
pub const BITS_PER_COMPONENT: usize = 8;

/// モデル入力バッファの画素フォーマット
///
/// いずれも 8bit x 4 で、1バイトはアルファではなくパディング（常に不透明）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// [X, R, G, B]
    #[default]
    Argb32,
    /// [B, G, R, X]
    Bgra32,
    /// [R, G, B, X]
    Rgba32,
    /// [X, B, G, R]
    Abgr32,
}

impl PixelFormat {
    /// 描画サーフェスに渡すビットマップ情報
    pub fn bitmap_info(self) -> BitmapInfo {
        match self {
            PixelFormat::Argb32 => BitmapInfo::new(AlphaInfo::NoneSkipFirst, ByteOrder::Big),
            PixelFormat::Bgra32 => BitmapInfo::new(AlphaInfo::NoneSkipFirst, ByteOrder::Little32),
            PixelFormat::Rgba32 => BitmapInfo::new(AlphaInfo::NoneSkipLast, ByteOrder::Big),
            PixelFormat::Abgr32 => BitmapInfo::new(AlphaInfo::NoneSkipLast, ByteOrder::Little32),
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        BYTES_PER_PIXEL
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PixelFormat::Argb32 => write!(f, "32ARGB"),
            PixelFormat::Bgra32 => write!(f, "32BGRA"),
            PixelFormat::Rgba32 => write!(f, "32RGBA"),
            PixelFormat::Abgr32 => write!(f, "32ABGR"),
        }
    }
}

/// パディングバイトの位置（アルファとしては扱わない）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaInfo {
    NoneSkipFirst,
    NoneSkipLast,
}

/// 32bitワードのバイト順
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Big,
    Little32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmapInfo {
    pub alpha: AlphaInfo,
    pub byte_order: ByteOrder,
}

/// 1画素内の各バイトのオフセット
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelOffsets {
    pub pad: usize,
    pub r: usize,
    pub g: usize,
    pub b: usize,
}

impl BitmapInfo {
    pub fn new(alpha: AlphaInfo, byte_order: ByteOrder) -> Self {
        Self { alpha, byte_order }
    }

    /// メモリ上のバイトオフセットを求める
    ///
    /// ビッグエンディアンのワード表現で skip-first は XRGB、skip-last は RGBX。
    /// リトルエンディアンはそれを反転した並びになる。
    pub fn channel_offsets(&self) -> ChannelOffsets {
        let (pad, r, g, b) = match self.alpha {
            AlphaInfo::NoneSkipFirst => (0, 1, 2, 3),
            AlphaInfo::NoneSkipLast => (3, 0, 1, 2),
        };
        match self.byte_order {
            ByteOrder::Big => ChannelOffsets { pad, r, g, b },
            ByteOrder::Little32 => ChannelOffsets {
                pad: 3 - pad,
                r: 3 - r,
                g: 3 - g,
                b: 3 - b,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argb_layout() {
        let offsets = PixelFormat::Argb32.bitmap_info().channel_offsets();
        assert_eq!(offsets, ChannelOffsets { pad: 0, r: 1, g: 2, b: 3 });
    }

    #[test]
    fn test_bgra_layout() {
        let offsets = PixelFormat::Bgra32.bitmap_info().channel_offsets();
        assert_eq!(offsets, ChannelOffsets { pad: 3, r: 2, g: 1, b: 0 });
    }

    #[test]
    fn test_skip_last_layouts() {
        let rgba = PixelFormat::Rgba32.bitmap_info().channel_offsets();
        assert_eq!(rgba, ChannelOffsets { pad: 3, r: 0, g: 1, b: 2 });
        let abgr = PixelFormat::Abgr32.bitmap_info().channel_offsets();
        assert_eq!(abgr, ChannelOffsets { pad: 0, r: 3, g: 2, b: 1 });
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&PixelFormat::Bgra32).unwrap();
        assert_eq!(json, "\"bgra32\"");
        let parsed: PixelFormat = serde_json::from_str("\"argb32\"").unwrap();
        assert_eq!(parsed, PixelFormat::Argb32);
        assert_eq!(PixelFormat::default().to_string(), "32ARGB");
    }
}
