//! モデル推論機能

use anyhow::Result;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};

use burn::{
    backend::Wgpu,
    module::Module,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::{activation::softmax, backend::Backend, Tensor},
};
use burn_ndarray::{NdArray, NdArrayDevice};
use burn_wgpu::WgpuDevice;

use crate::classifier::{Classifier, Prediction};
use crate::ml::{pixel_buffer_to_input, GestureNet, ModelConfig};
use crate::model::{load_model_with_metadata, save_model_with_metadata, AppConfig, DeviceType, InferenceConfig, ModelMetadata};
use crate::pixel::{PixelBuffer, PixelFormat};

type ModelRecorder = BinBytesRecorder<FullPrecisionSettings>;

/// 推論エンジン
pub struct InferenceEngine<B: Backend> {
    model: GestureNet<B>,
    config: InferenceConfig,
    device: B::Device,
}

impl<B: Backend> InferenceEngine<B> {
    /// モデルを読み込んで推論エンジンを初期化
    pub fn load<P: AsRef<Path>>(model_path: P, device: B::Device) -> Result<Self> {
        let (metadata, model_binary) = load_model_with_metadata(model_path.as_ref())?;
        metadata.validate()?;
        let config = InferenceConfig::from_metadata(&metadata);

        // 推論時はドロップアウトなし
        let model_config = ModelConfig {
            num_classes: config.num_classes(),
            dropout: 0.0,
            image_size: config.model_input_size as usize,
        };
        let model = model_config.init::<B>(&device);

        let recorder = ModelRecorder::default();
        let record = <ModelRecorder as Recorder<B>>::load(&recorder, model_binary, &device)
            .map_err(|e| anyhow::anyhow!("モデル重みの読み込みエラー: {:?}", e))?;
        let model = model.load_record(record);

        log::info!(
            "モデルを読み込みました: {} ({})",
            model_path.as_ref().display(),
            config.summary()
        );

        Ok(Self {
            model,
            config,
            device,
        })
    }

    /// 初期化済みのモデルから直接作成
    pub fn from_parts(model: GestureNet<B>, config: InferenceConfig, device: B::Device) -> Self {
        Self {
            model,
            config,
            device,
        }
    }

    /// 画素バッファ1枚を分類
    pub fn predict_pixels(&self, buffer: &PixelBuffer) -> Result<Prediction> {
        if buffer.format() != self.config.input_pixel_format {
            log::debug!(
                "入力フォーマット {} はモデル想定 {} と異なります（チャネル順は読み替えます）",
                buffer.format(),
                self.config.input_pixel_format
            );
        }

        let size = self.config.model_input_size as usize;
        let input = pixel_buffer_to_input(buffer, size);

        // Tensorに変換 [1, 3, size, size]
        let tensor = Tensor::<B, 1>::from_floats(input.as_slice(), &self.device)
            .reshape([1, 3, size, size]);

        let output = self.model.forward(tensor);
        let probabilities = softmax(output, 1)
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| anyhow::anyhow!("推論結果の取得エラー: {:?}", e))?;

        let (class_idx, confidence) = probabilities
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best: Option<(usize, f32)>, (i, p)| match best {
                Some((_, best_p)) if best_p >= p => best,
                _ => Some((i, p)),
            })
            .ok_or_else(|| anyhow::anyhow!("推論結果が空です"))?;

        let label = self
            .config
            .class_index_to_label(class_idx)
            .ok_or_else(|| anyhow::anyhow!("クラスインデックス {} は範囲外です", class_idx))?;

        Ok(Prediction {
            label: label.to_string(),
            confidence,
        })
    }

    /// 複数バッファをまとめて分類
    pub fn predict_batch(&self, buffers: &[PixelBuffer]) -> Result<Vec<Prediction>> {
        buffers.iter().map(|buffer| self.predict_pixels(buffer)).collect()
    }

    /// InferenceConfigへの参照を取得
    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }
}

impl<B: Backend> Classifier for InferenceEngine<B> {
    fn predict(&self, buffer: &PixelBuffer) -> Result<Prediction> {
        self.predict_pixels(buffer)
    }
}

/// 設定に従ってバックエンドを選び、分類器を読み込む
///
/// WGPU の初期化に失敗した場合（アダプタがない環境ではパニックする）は CPU に切り替える。
pub fn load_classifier(config: &AppConfig) -> Result<Box<dyn Classifier>> {
    let model_path = PathBuf::from(&config.model.model_path);
    log::info!("計算デバイス: {}", config.device_type);

    match config.device_type {
        DeviceType::Wgpu => with_cpu_fallback(
            || load_engine::<Wgpu>(&model_path, WgpuDevice::default()),
            || load_engine::<NdArray>(&model_path, NdArrayDevice::Cpu),
        ),
        DeviceType::Cpu => load_engine::<NdArray>(&model_path, NdArrayDevice::Cpu),
    }
}

fn load_engine<B: Backend>(model_path: &Path, device: B::Device) -> Result<Box<dyn Classifier>>
where
    B::Device: 'static,
    InferenceEngine<B>: 'static,
{
    Ok(Box::new(InferenceEngine::<B>::load(model_path, device)?))
}

/// パニックを含むバックエンド初期化の失敗を `Err` に変換
fn catch_backend_panic<T>(load: impl FnOnce() -> Result<T>) -> Result<T> {
    match std::panic::catch_unwind(AssertUnwindSafe(load)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "不明なパニック".to_string());
            Err(anyhow::anyhow!("バックエンドの初期化中にパニックしました: {}", message))
        }
    }
}

fn with_cpu_fallback<T>(
    primary: impl FnOnce() -> Result<T>,
    fallback: impl FnOnce() -> Result<T>,
) -> Result<T> {
    match catch_backend_panic(primary) {
        Ok(value) => Ok(value),
        Err(e) => {
            log::warn!("WGPUで読み込めませんでした。CPUで再試行します: {:#}", e);
            fallback()
        }
    }
}

/// 未学習の重みでモデルアーカイブを書き出す
///
/// 変換・推論パイプラインの動作確認用。予測ラベルに意味はない。
pub fn export_untrained_model(
    output_path: &Path,
    class_labels: Vec<String>,
    model_input_size: u32,
) -> Result<PathBuf> {
    let metadata = ModelMetadata::new(
        "rps-untrained",
        class_labels,
        model_input_size,
        PixelFormat::Argb32,
    );
    metadata.validate()?;

    let device = NdArrayDevice::Cpu;
    let model = ModelConfig {
        num_classes: metadata.class_labels.len(),
        dropout: 0.0,
        image_size: model_input_size as usize,
    }
    .init::<NdArray>(&device);

    let recorder = ModelRecorder::default();
    let model_binary = <ModelRecorder as Recorder<NdArray>>::record(&recorder, model.into_record(), ())
        .map_err(|e| anyhow::anyhow!("モデル重みの書き出しエラー: {:?}", e))?;

    save_model_with_metadata(output_path, &metadata, &model_binary)
}
