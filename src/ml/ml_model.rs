//! 機械学習モデルの共通定義
//!
//! じゃんけん画像分類用のCNNモデルと、画素バッファからの入力テンソル作成を提供します。

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, Relu,
    },
    tensor::{backend::Backend, Int, Tensor},
};
use image::imageops::FilterType;

use crate::pixel::PixelBuffer;

/// 全結合層に入る直前の特徴マップサイズ
pub const POOLED_SIZE: usize = 4;

/// 最終畳み込み層のチャネル数
const FEATURE_CHANNELS: usize = 64;

/// ImageNetの平均と標準偏差
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// モデル設定
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// 分類クラス数
    pub num_classes: usize,
    /// ドロップアウト率（推論時は無効）
    #[config(default = 0.0)]
    pub dropout: f64,
    /// 入力画像サイズ（正方形）
    #[config(default = 64)]
    pub image_size: usize,
}

impl ModelConfig {
    /// モデルを初期化
    pub fn init<B: Backend>(&self, device: &B::Device) -> GestureNet<B> {
        // Conv (3x3, no padding): size -> size - 2
        // Pool (2x2): size -> size / 2
        let after_conv1 = self.image_size.saturating_sub(2);
        let after_pool1 = after_conv1 / 2;
        let after_conv2 = after_pool1.saturating_sub(2);
        let after_pool2 = after_conv2 / 2;
        let feature_map_size = after_pool2.saturating_sub(2);

        let d = FEATURE_CHANNELS * POOLED_SIZE * POOLED_SIZE;
        log::debug!(
            "[Model] 入力 {0}x{0} -> Conv3後 {1} x {2}x{2} -> Pool {1} x {3}x{3} -> FC {4} -> {5} -> {6}",
            self.image_size,
            FEATURE_CHANNELS,
            feature_map_size,
            POOLED_SIZE,
            d,
            d / 8,
            self.num_classes
        );

        GestureNet {
            conv1: Conv2dConfig::new([3, 16], [3, 3]).with_stride([1, 1]).init(device),
            pool1: MaxPool2dConfig::new([2, 2]).init(),
            conv2: Conv2dConfig::new([16, 32], [3, 3]).with_stride([1, 1]).init(device),
            pool2: MaxPool2dConfig::new([2, 2]).init(),
            conv3: Conv2dConfig::new([32, FEATURE_CHANNELS], [3, 3]).with_stride([1, 1]).init(device),
            pool3: AdaptiveAvgPool2dConfig::new([POOLED_SIZE, POOLED_SIZE]).init(),
            dropout: DropoutConfig::new(self.dropout).init(),
            fc1: LinearConfig::new(d, d / 8).init(device),
            fc2: LinearConfig::new(d / 8, self.num_classes).init(device),
            activation: Relu::new(),
        }
    }
}

/// じゃんけん画像分類用CNNモデル
///
/// # アーキテクチャ
/// - {Conv 3x3 + ReLU + MaxPool 2x2} x 2
/// - Conv 3x3 + ReLU
/// - AdaptiveAvgPool -> 4x4
/// - FC: 1024 -> 128 + ReLU
/// - FC: 128 -> num_classes
#[derive(Module, Debug)]
pub struct GestureNet<B: Backend> {
    conv1: Conv2d<B>, // 3 -> 16
    pool1: MaxPool2d,
    conv2: Conv2d<B>, // 16 -> 32
    pool2: MaxPool2d,
    conv3: Conv2d<B>, // 32 -> 64
    pool3: AdaptiveAvgPool2d,

    dropout: Dropout,
    fc1: Linear<B>,
    fc2: Linear<B>,

    activation: Relu,
}

impl<B: Backend> GestureNet<B> {
    /// 順伝播
    ///
    /// - `images`: バッチ画像 [batch_size, 3, size, size]
    /// - 戻り値: クラスごとのロジット [batch_size, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch_size, _, _, _] = images.dims();

        let x = self.conv1.forward(images);
        let x = self.activation.forward(x);
        let x = self.pool1.forward(x);

        let x = self.conv2.forward(x);
        let x = self.activation.forward(x);
        let x = self.pool2.forward(x);

        let x = self.conv3.forward(x);
        let x = self.activation.forward(x);
        let x = self.pool3.forward(x);

        let [_, c, h, w] = x.dims();
        let x = x.reshape([batch_size, c * h * w]);
        let x = self.dropout.forward(x);

        let x = self.fc1.forward(x);
        let x = self.activation.forward(x);

        self.fc2.forward(x)
    }

    /// 予測クラスIDとロジット
    pub fn predict(&self, images: Tensor<B, 4>) -> (Tensor<B, 2, Int>, Tensor<B, 2>) {
        let output = self.forward(images);
        let predictions = output.clone().argmax(1);
        (predictions, output)
    }
}

/// 画素バッファをモデル入力に変換
///
/// フォーマットに従ってRGBを取り出し、`size` x `size` に縮小した後、
/// ImageNetの平均と標準偏差で正規化する。戻り値は (C, H, W) の順で平坦化。
pub fn pixel_buffer_to_input(buffer: &PixelBuffer, size: usize) -> Vec<f32> {
    let rgb = buffer.to_rgb_image();
    let target = size as u32;
    let img = if rgb.dimensions() == (target, target) {
        rgb
    } else {
        image::imageops::resize(&rgb, target, target, FilterType::Triangle)
    };

    let mut data = Vec::with_capacity(3 * size * size);
    for channel in 0..3 {
        for y in 0..target {
            for x in 0..target {
                let value = img.get_pixel(x, y)[channel] as f32 / 255.0;
                data.push((value - MEAN[channel]) / STD[channel]);
            }
        }
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::ToPixelBuffer;
    use burn_ndarray::{NdArray, NdArrayDevice};
    use image::{DynamicImage, Rgb, RgbImage};

    #[test]
    fn test_forward_shape() {
        let device = NdArrayDevice::Cpu;
        let model = ModelConfig::new(3).init::<NdArray>(&device);
        let images = Tensor::<NdArray, 4>::zeros([2, 3, 64, 64], &device);
        assert_eq!(model.forward(images).dims(), [2, 3]);
    }

    #[test]
    fn test_smallest_input_size() {
        let device = NdArrayDevice::Cpu;
        let config = ModelConfig::new(3).with_image_size(18);
        let model = config.init::<NdArray>(&device);
        let images = Tensor::<NdArray, 4>::zeros([1, 3, 18, 18], &device);
        let (predictions, logits) = model.predict(images);
        assert_eq!(predictions.dims(), [1, 1]);
        assert_eq!(logits.dims(), [1, 3]);
    }

    #[test]
    fn test_input_is_resized_and_normalized() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 5, Rgb([255, 255, 255])));
        let buffer = image.to_pixel_buffer().unwrap();
        let input = pixel_buffer_to_input(&buffer, 18);

        assert_eq!(input.len(), 3 * 18 * 18);
        let expected_red = (1.0 - MEAN[0]) / STD[0];
        let expected_blue = (1.0 - MEAN[2]) / STD[2];
        assert!((input[0] - expected_red).abs() < 1e-5);
        assert!((input[input.len() - 1] - expected_blue).abs() < 1e-5);
    }

    #[test]
    fn test_input_is_channel_major() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([255, 0, 0])));
        let options = crate::pixel::ConversionOptions {
            pixel_format: crate::pixel::PixelFormat::Bgra32,
            row_alignment: 16,
        };
        let buffer = image.to_pixel_buffer_with(&options).unwrap();
        let input = pixel_buffer_to_input(&buffer, 2);

        let red = (1.0 - MEAN[0]) / STD[0];
        let green = (0.0 - MEAN[1]) / STD[1];
        assert!(input[..4].iter().all(|v| (v - red).abs() < 1e-5));
        assert!(input[4..8].iter().all(|v| (v - green).abs() < 1e-5));
    }
}
