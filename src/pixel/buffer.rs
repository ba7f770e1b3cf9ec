//! モデル入力用の固定レイアウト画素バッファ
//!
//! 行は上から下の順に格納され（左上原点）、各行は `bytes_per_row` バイト。
//! 行末のパディングはゼロで埋められる。

use image::{Rgb, RgbImage};
use std::ops::{Deref, DerefMut};

use super::error::ConversionError;
use super::format::{PixelFormat, BYTES_PER_PIXEL};

/// 幅・高さの上限
pub const MAX_DIMENSION: u32 = 16384;

/// 行アラインメントの既定値（バイト）
pub const DEFAULT_ROW_ALIGNMENT: usize = 64;

/// バッファ確保時の属性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferAttributes {
    /// 1行のバイト数をこの値の倍数に切り上げる（2の累乗）
    pub row_alignment: usize,
}

impl Default for BufferAttributes {
    fn default() -> Self {
        Self {
            row_alignment: DEFAULT_ROW_ALIGNMENT,
        }
    }
}

/// 画素バッファ
pub struct PixelBuffer {
    width: u32,
    height: u32,
    bytes_per_row: usize,
    format: PixelFormat,
    data: Vec<u8>,
    locked: bool,
    lock_count: u32,
}

impl PixelBuffer {
    /// 既定属性でバッファを確保
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Result<Self, ConversionError> {
        Self::with_attributes(width, height, format, &BufferAttributes::default())
    }

    /// 属性を指定してバッファを確保
    ///
    /// 確保に失敗してもパニックせず `ConversionError` を返す。
    pub fn with_attributes(
        width: u32,
        height: u32,
        format: PixelFormat,
        attributes: &BufferAttributes,
    ) -> Result<Self, ConversionError> {
        if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(ConversionError::InvalidDimensions { width, height });
        }

        let alignment = attributes.row_alignment;
        if alignment == 0 || !alignment.is_power_of_two() {
            return Err(ConversionError::UnsupportedRowAlignment(alignment));
        }

        let overflow = || ConversionError::SizeOverflow { width, height };
        let packed = (width as usize)
            .checked_mul(format.bytes_per_pixel())
            .ok_or_else(overflow)?;
        let bytes_per_row = packed.checked_add(alignment - 1).ok_or_else(overflow)? & !(alignment - 1);
        let len = bytes_per_row
            .checked_mul(height as usize)
            .ok_or_else(overflow)?;

        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| ConversionError::AllocationFailed { bytes: len })?;
        data.resize(len, 0);

        Ok(Self {
            width,
            height,
            bytes_per_row,
            format,
            data,
            locked: false,
            lock_count: 0,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bytes_per_row(&self) -> usize {
        self.bytes_per_row
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// 行パディングを含む生バイト列
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// ガードが解放されずに残っているか（`mem::forget` された場合のみ true）
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// これまでにロックした回数
    pub fn lock_count(&self) -> u32 {
        self.lock_count
    }

    /// ベースアドレスを排他的にロックする
    ///
    /// 返されたガードを drop するとロックが解除される（早期 return でも同様）。
    pub fn lock_base_address(&mut self) -> BaseAddressGuard<'_> {
        self.locked = true;
        self.lock_count += 1;
        log::trace!("画素バッファをロック: {}x{}", self.width, self.height);
        BaseAddressGuard { buffer: self }
    }

    /// y行目の画素部分（パディングを除く）
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.bytes_per_row;
        let end = start + self.width as usize * BYTES_PER_PIXEL;
        self.data.get(start..end)
    }

    /// メモリ上の並びのままの4バイト
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width {
            return None;
        }
        let row = self.row(y)?;
        let start = x as usize * BYTES_PER_PIXEL;
        let mut pixel = [0u8; 4];
        pixel.copy_from_slice(&row[start..start + BYTES_PER_PIXEL]);
        Some(pixel)
    }

    /// フォーマットを考慮した (R, G, B)
    pub fn rgb(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        let pixel = self.pixel(x, y)?;
        let offsets = self.format.bitmap_info().channel_offsets();
        Some([pixel[offsets.r], pixel[offsets.g], pixel[offsets.b]])
    }

    /// パディングバイト（常に 0xFF のはず）
    pub fn padding_byte(&self, x: u32, y: u32) -> Option<u8> {
        let pixel = self.pixel(x, y)?;
        Some(pixel[self.format.bitmap_info().channel_offsets().pad])
    }

    /// RGB画像として取り出す（パディングと行末を除去）
    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| {
            Rgb(self.rgb(x, y).unwrap_or([0, 0, 0]))
        })
    }
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes_per_row", &self.bytes_per_row)
            .field("format", &self.format)
            .field("locked", &self.locked)
            .field("lock_count", &self.lock_count)
            .finish()
    }
}

/// ロック中のベースアドレスへのアクセス
pub struct BaseAddressGuard<'a> {
    buffer: &'a mut PixelBuffer,
}

impl Deref for BaseAddressGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buffer.data
    }
}

impl DerefMut for BaseAddressGuard<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.buffer.data
    }
}

impl Drop for BaseAddressGuard<'_> {
    fn drop(&mut self) {
        self.buffer.locked = false;
        log::trace!("画素バッファのロックを解除");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_alignment() {
        let buffer = PixelBuffer::new(3, 2, PixelFormat::Argb32).unwrap();
        assert_eq!(buffer.bytes_per_row(), 64);
        assert_eq!(buffer.as_bytes().len(), 128);
        assert_eq!(buffer.row(0).unwrap().len(), 12);

        let wide = PixelBuffer::new(17, 1, PixelFormat::Argb32).unwrap();
        assert_eq!(wide.bytes_per_row(), 128);
    }

    #[test]
    fn test_packed_rows_with_unit_alignment() {
        let attributes = BufferAttributes { row_alignment: 1 };
        let buffer = PixelBuffer::with_attributes(5, 3, PixelFormat::Bgra32, &attributes).unwrap();
        assert_eq!(buffer.bytes_per_row(), 20);
        assert_eq!(buffer.as_bytes().len(), 60);
    }

    #[test]
    fn test_invalid_dimensions() {
        assert!(matches!(
            PixelBuffer::new(0, 10, PixelFormat::Argb32),
            Err(ConversionError::InvalidDimensions { width: 0, height: 10 })
        ));
        assert!(matches!(
            PixelBuffer::new(10, 0, PixelFormat::Argb32),
            Err(ConversionError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            PixelBuffer::new(MAX_DIMENSION + 1, 1, PixelFormat::Argb32),
            Err(ConversionError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_invalid_alignment() {
        let attributes = BufferAttributes { row_alignment: 48 };
        let result = PixelBuffer::with_attributes(4, 4, PixelFormat::Argb32, &attributes);
        assert!(matches!(result, Err(ConversionError::UnsupportedRowAlignment(48))));

        let attributes = BufferAttributes { row_alignment: 0 };
        let result = PixelBuffer::with_attributes(4, 4, PixelFormat::Argb32, &attributes);
        assert!(result.unwrap_err().is_allocation_failure());
    }

    #[test]
    fn test_lock_released_on_drop() {
        let mut buffer = PixelBuffer::new(2, 2, PixelFormat::Argb32).unwrap();
        {
            let mut guard = buffer.lock_base_address();
            guard[0] = 0xFF;
            guard[1] = 10;
        }
        assert!(!buffer.is_locked());
        assert_eq!(buffer.lock_count(), 1);
        assert_eq!(buffer.pixel(0, 0), Some([0xFF, 10, 0, 0]));
        assert_eq!(buffer.rgb(0, 0), Some([10, 0, 0]));
        assert_eq!(buffer.padding_byte(0, 0), Some(0xFF));
    }

    #[test]
    fn test_forgotten_guard_stays_locked() {
        let mut buffer = PixelBuffer::new(2, 2, PixelFormat::Argb32).unwrap();
        std::mem::forget(buffer.lock_base_address());
        assert!(buffer.is_locked());
        assert_eq!(buffer.lock_count(), 1);

        drop(buffer.lock_base_address());
        assert!(!buffer.is_locked());
        assert_eq!(buffer.lock_count(), 2);
    }

    #[test]
    fn test_out_of_range_access() {
        let buffer = PixelBuffer::new(2, 2, PixelFormat::Argb32).unwrap();
        assert!(buffer.pixel(2, 0).is_none());
        assert!(buffer.pixel(0, 2).is_none());
        assert!(buffer.row(2).is_none());
    }
}
