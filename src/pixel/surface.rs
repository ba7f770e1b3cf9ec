//! メモリ直結の描画サーフェス
//!
//! デバイス座標は左下原点・y上向き。メモリ上の行 `r` はデバイス座標の
//! `y ∈ [H-1-r, H-r)` に対応する。画像は矩形の最小 y 側に先頭行が来るように描く。

use image::RgbaImage;

use super::error::ConversionError;
use super::format::{BitmapInfo, BITS_PER_COMPONENT, BYTES_PER_PIXEL};

const SINGULAR_EPSILON: f64 = 1e-12;

/// 色空間
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    DeviceRgb,
    DeviceGray,
}

impl ColorSpace {
    pub fn components(self) -> usize {
        match self {
            ColorSpace::DeviceRgb => 3,
            ColorSpace::DeviceGray => 1,
        }
    }
}

/// アフィン変換 `(x, y) -> (a*x + c*y + tx, b*x + d*y + ty)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

impl AffineTransform {
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self { tx, ty, ..Self::IDENTITY }
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self { a: sx, d: sy, ..Self::IDENTITY }
    }

    /// `self` を適用した後に `other` を適用する変換
    pub fn concat(&self, other: &Self) -> Self {
        Self {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            tx: self.tx * other.a + self.ty * other.c + other.tx,
            ty: self.tx * other.b + self.ty * other.d + other.ty,
        }
    }

    /// 逆変換（特異行列なら None）
    pub fn invert(&self) -> Option<Self> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < SINGULAR_EPSILON {
            return None;
        }
        Some(Self {
            a: self.d / det,
            b: -self.b / det,
            c: -self.c / det,
            d: self.a / det,
            tx: (self.c * self.ty - self.d * self.tx) / det,
            ty: (self.b * self.tx - self.a * self.ty) / det,
        })
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.tx,
            self.b * x + self.d * y + self.ty,
        )
    }
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// ユーザー座標系の矩形
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// 外部メモリに直接描画するサーフェス
pub struct DrawingSurface<'a> {
    data: &'a mut [u8],
    width: usize,
    height: usize,
    bytes_per_row: usize,
    color_space: ColorSpace,
    bitmap_info: BitmapInfo,
    ctm: AffineTransform,
}

impl<'a> DrawingSurface<'a> {
    /// サーフェスを作成
    ///
    /// 引数の組み合わせがメモリと矛盾する場合はエラー。
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        data: &'a mut [u8],
        width: usize,
        height: usize,
        bits_per_component: usize,
        bytes_per_row: usize,
        color_space: ColorSpace,
        bitmap_info: BitmapInfo,
    ) -> Result<Self, ConversionError> {
        if width == 0 || height == 0 {
            return Err(ConversionError::UnsupportedSurface(format!(
                "サイズが0です: {}x{}",
                width, height
            )));
        }
        if bits_per_component != BITS_PER_COMPONENT {
            return Err(ConversionError::UnsupportedSurface(format!(
                "bits_per_component {} は未対応です",
                bits_per_component
            )));
        }
        if color_space.components() + 1 != BYTES_PER_PIXEL {
            return Err(ConversionError::UnsupportedSurface(format!(
                "{:?} は {:?} の4バイト画素と組み合わせられません",
                color_space, bitmap_info.alpha
            )));
        }

        let len = data.len();
        let inconsistent = || ConversionError::InconsistentBytesPerRow {
            bytes_per_row,
            width,
            height,
            len,
        };
        let packed = width.checked_mul(BYTES_PER_PIXEL).ok_or_else(inconsistent)?;
        if bytes_per_row < packed {
            return Err(inconsistent());
        }
        let required = bytes_per_row
            .checked_mul(height - 1)
            .and_then(|n| n.checked_add(packed))
            .ok_or_else(inconsistent)?;
        if required > len {
            return Err(inconsistent());
        }

        Ok(Self {
            data,
            width,
            height,
            bytes_per_row,
            color_space,
            bitmap_info,
            ctm: AffineTransform::IDENTITY,
        })
    }

    pub fn ctm(&self) -> AffineTransform {
        self.ctm
    }

    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    /// ユーザー座標で先に適用される変換を追加
    pub fn concat_ctm(&mut self, transform: AffineTransform) {
        self.ctm = transform.concat(&self.ctm);
    }

    pub fn translate_by(&mut self, tx: f64, ty: f64) {
        self.concat_ctm(AffineTransform::translation(tx, ty));
    }

    pub fn scale_by(&mut self, sx: f64, sy: f64) {
        self.concat_ctm(AffineTransform::scale(sx, sy));
    }

    /// 画像を矩形に描画する
    ///
    /// 各デバイス画素の中心を逆変換して最近傍でサンプリングし、
    /// 既存の内容にソースオーバーで合成する。パディングバイトは 0xFF。
    pub fn draw_image(&mut self, image: &RgbaImage, rect: Rect) -> Result<(), ConversionError> {
        let inverse = self.ctm.invert().ok_or(ConversionError::SingularTransform)?;
        let (image_width, image_height) = image.dimensions();
        if image_width == 0 || image_height == 0 || rect.width <= 0.0 || rect.height <= 0.0 {
            return Ok(());
        }

        let offsets = self.bitmap_info.channel_offsets();
        for row in 0..self.height {
            let device_y = (self.height - row) as f64 - 0.5;
            let row_start = row * self.bytes_per_row;

            for col in 0..self.width {
                let (ux, uy) = inverse.apply(col as f64 + 0.5, device_y);
                if !rect.contains(ux, uy) {
                    continue;
                }

                let u = (ux - rect.x) / rect.width;
                let v = (uy - rect.y) / rect.height;
                let sx = ((u * image_width as f64).floor() as u32).min(image_width - 1);
                let sy = ((v * image_height as f64).floor() as u32).min(image_height - 1);
                let [r, g, b, a] = image.get_pixel(sx, sy).0;

                let start = row_start + col * BYTES_PER_PIXEL;
                let pixel = &mut self.data[start..start + BYTES_PER_PIXEL];
                pixel[offsets.r] = blend(r, pixel[offsets.r], a);
                pixel[offsets.g] = blend(g, pixel[offsets.g], a);
                pixel[offsets.b] = blend(b, pixel[offsets.b], a);
                pixel[offsets.pad] = 0xFF;
            }
        }

        Ok(())
    }
}

fn blend(src: u8, dst: u8, alpha: u8) -> u8 {
    let alpha = alpha as u32;
    ((src as u32 * alpha + dst as u32 * (255 - alpha) + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::format::PixelFormat;
    use image::Rgba;

    fn two_row_image() -> RgbaImage {
        RgbaImage::from_fn(2, 2, |_, y| {
            if y == 0 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        })
    }

    #[test]
    fn test_flip_transform_maps_top_to_bottom() {
        let ctm = AffineTransform::scale(1.0, -1.0).concat(&AffineTransform::translation(0.0, 10.0));
        assert_eq!(ctm.apply(3.0, 0.0), (3.0, 10.0));
        assert_eq!(ctm.apply(3.0, 10.0), (3.0, 0.0));
        assert_eq!(ctm.invert().unwrap().apply(3.0, 10.0), (3.0, 0.0));
    }

    #[test]
    fn test_invert_roundtrip() {
        let t = AffineTransform::translation(4.0, -2.0).concat(&AffineTransform::scale(2.0, 3.0));
        let inv = t.invert().unwrap();
        let (x, y) = t.apply(1.5, 2.5);
        let (bx, by) = inv.apply(x, y);
        assert!((bx - 1.5).abs() < 1e-9);
        assert!((by - 2.5).abs() < 1e-9);
        assert!(AffineTransform::scale(0.0, 1.0).invert().is_none());
    }

    #[test]
    fn test_rejects_short_bytes_per_row() {
        let mut data = vec![0u8; 64];
        let result = DrawingSurface::new(
            &mut data,
            4,
            4,
            8,
            12,
            ColorSpace::DeviceRgb,
            PixelFormat::Argb32.bitmap_info(),
        );
        assert!(matches!(result, Err(ConversionError::InconsistentBytesPerRow { .. })));
    }

    #[test]
    fn test_rejects_short_memory() {
        let mut data = vec![0u8; 63];
        let result = DrawingSurface::new(
            &mut data,
            4,
            4,
            8,
            16,
            ColorSpace::DeviceRgb,
            PixelFormat::Argb32.bitmap_info(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_gray_and_wide_components() {
        let mut data = vec![0u8; 64];
        let gray = DrawingSurface::new(
            &mut data,
            4,
            4,
            8,
            16,
            ColorSpace::DeviceGray,
            PixelFormat::Argb32.bitmap_info(),
        );
        assert!(matches!(gray, Err(ConversionError::UnsupportedSurface(_))));

        let mut data = vec![0u8; 64];
        let sixteen = DrawingSurface::new(
            &mut data,
            4,
            4,
            16,
            16,
            ColorSpace::DeviceRgb,
            PixelFormat::Argb32.bitmap_info(),
        );
        assert!(matches!(sixteen, Err(ConversionError::UnsupportedSurface(_))));
    }

    #[test]
    fn test_identity_draw_is_upside_down() {
        let image = two_row_image();
        let mut data = vec![0u8; 16];
        let mut surface = DrawingSurface::new(
            &mut data,
            2,
            2,
            8,
            8,
            ColorSpace::DeviceRgb,
            PixelFormat::Argb32.bitmap_info(),
        )
        .unwrap();
        surface.draw_image(&image, Rect::new(0.0, 0.0, 2.0, 2.0)).unwrap();

        // 反転なしでは先頭行がメモリの最終行に書かれる
        assert_eq!(&data[0..4], &[0xFF, 0, 0, 255]);
        assert_eq!(&data[8..12], &[0xFF, 255, 0, 0]);
    }

    #[test]
    fn test_flipped_draw_keeps_memory_order() {
        let image = two_row_image();
        let mut data = vec![0u8; 16];
        let mut surface = DrawingSurface::new(
            &mut data,
            2,
            2,
            8,
            8,
            ColorSpace::DeviceRgb,
            PixelFormat::Argb32.bitmap_info(),
        )
        .unwrap();
        surface.translate_by(0.0, 2.0);
        surface.scale_by(1.0, -1.0);
        surface.draw_image(&image, Rect::new(0.0, 0.0, 2.0, 2.0)).unwrap();

        assert_eq!(&data[0..4], &[0xFF, 255, 0, 0]);
        assert_eq!(&data[12..16], &[0xFF, 0, 0, 255]);
    }

    #[test]
    fn test_scaled_rect_uses_nearest_neighbour() {
        let image = RgbaImage::from_pixel(1, 1, Rgba([10, 20, 30, 255]));
        let mut data = vec![0u8; 16];
        let mut surface = DrawingSurface::new(
            &mut data,
            2,
            2,
            8,
            8,
            ColorSpace::DeviceRgb,
            PixelFormat::Bgra32.bitmap_info(),
        )
        .unwrap();
        surface.draw_image(&image, Rect::new(0.0, 0.0, 2.0, 2.0)).unwrap();
        for chunk in data.chunks(4) {
            assert_eq!(chunk, &[30, 20, 10, 0xFF]);
        }
    }

    #[test]
    fn test_translucent_source_composites_over_black() {
        let image = RgbaImage::from_pixel(1, 1, Rgba([200, 100, 50, 0]));
        let mut data = vec![0u8; 4];
        let mut surface = DrawingSurface::new(
            &mut data,
            1,
            1,
            8,
            4,
            ColorSpace::DeviceRgb,
            PixelFormat::Argb32.bitmap_info(),
        )
        .unwrap();
        surface.draw_image(&image, Rect::new(0.0, 0.0, 1.0, 1.0)).unwrap();
        assert_eq!(data, vec![0xFF, 0, 0, 0]);
        assert_eq!(blend(200, 0, 128), 100);
    }

    #[test]
    fn test_singular_transform_is_error() {
        let image = two_row_image();
        let mut data = vec![0u8; 16];
        let mut surface = DrawingSurface::new(
            &mut data,
            2,
            2,
            8,
            8,
            ColorSpace::DeviceRgb,
            PixelFormat::Argb32.bitmap_info(),
        )
        .unwrap();
        surface.scale_by(1.0, 0.0);
        let result = surface.draw_image(&image, Rect::new(0.0, 0.0, 2.0, 2.0));
        assert!(matches!(result, Err(ConversionError::SingularTransform)));
    }
}
