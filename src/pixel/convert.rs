//! 画像 → モデル入力バッファ変換
//!
//! 1. W x H の4バイト画素バッファを確保
//! 2. ベースアドレスを排他ロック（ガードで必ず解除）
//! 3. バッファのメモリを直接使う描画サーフェスを作成（DeviceRGB, 先頭バイトはスキップ）
//! 4. 左下原点のサーフェスを上下反転し、メモリの行順（上→下）で書き込まれるようにする
//! 5. 画像を同サイズの矩形に描画（拡縮・切り抜きなし）

use image::{DynamicImage, RgbaImage};
use serde::{Deserialize, Serialize};

use super::buffer::{BufferAttributes, PixelBuffer, DEFAULT_ROW_ALIGNMENT};
use super::error::ConversionError;
use super::format::{PixelFormat, BITS_PER_COMPONENT};
use super::surface::{ColorSpace, DrawingSurface, Rect};

/// 変換オプション
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOptions {
    /// 出力画素フォーマット
    #[serde(default)]
    pub pixel_format: PixelFormat,
    /// 行アラインメント（バイト）
    #[serde(default = "default_row_alignment")]
    pub row_alignment: usize,
}

fn default_row_alignment() -> usize {
    DEFAULT_ROW_ALIGNMENT
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            pixel_format: PixelFormat::default(),
            row_alignment: DEFAULT_ROW_ALIGNMENT,
        }
    }
}

/// 画像をモデル入力用の画素バッファに変換
pub fn to_pixel_buffer(
    image: &DynamicImage,
    options: &ConversionOptions,
) -> Result<PixelBuffer, ConversionError> {
    let attributes = BufferAttributes {
        row_alignment: options.row_alignment,
    };
    let mut buffer =
        PixelBuffer::with_attributes(image.width(), image.height(), options.pixel_format, &attributes)?;

    let rgba = image.to_rgba8();
    let bytes_per_row = buffer.bytes_per_row();
    draw_into(&mut buffer, &rgba, bytes_per_row)?;

    log::debug!(
        "画素バッファに変換: {}x{} {} (bytes_per_row={})",
        buffer.width(),
        buffer.height(),
        buffer.format(),
        buffer.bytes_per_row()
    );
    Ok(buffer)
}

/// ロックしたバッファに上下反転付きで画像を描く
pub(crate) fn draw_into(
    buffer: &mut PixelBuffer,
    image: &RgbaImage,
    bytes_per_row: usize,
) -> Result<(), ConversionError> {
    let width = buffer.width() as usize;
    let height = buffer.height() as usize;
    let bitmap_info = buffer.format().bitmap_info();

    let mut base_address = buffer.lock_base_address();
    let mut surface = DrawingSurface::new(
        &mut base_address,
        width,
        height,
        BITS_PER_COMPONENT,
        bytes_per_row,
        ColorSpace::DeviceRgb,
        bitmap_info,
    )?;

    surface.translate_by(0.0, height as f64);
    surface.scale_by(1.0, -1.0);
    surface.draw_image(image, Rect::new(0.0, 0.0, width as f64, height as f64))?;

    Ok(())
}

/// `DynamicImage` から直接バッファを作る拡張
pub trait ToPixelBuffer {
    fn to_pixel_buffer(&self) -> Result<PixelBuffer, ConversionError> {
        self.to_pixel_buffer_with(&ConversionOptions::default())
    }

    fn to_pixel_buffer_with(&self, options: &ConversionOptions) -> Result<PixelBuffer, ConversionError>;
}

impl ToPixelBuffer for DynamicImage {
    fn to_pixel_buffer_with(&self, options: &ConversionOptions) -> Result<PixelBuffer, ConversionError> {
        to_pixel_buffer(self, options)
    }
}
