//! モデルメタデータを使用した推論設定
//!
//! 保存されたモデルメタデータを読み込んで推論に必要な情報を取得します。

use anyhow::{Context, Result};
use std::path::Path;

use crate::model::model_metadata::ModelMetadata;
use crate::model::model_storage;
use crate::pixel::PixelFormat;

/// モデルメタデータから推論用情報を取得
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceConfig {
    /// クラスラベル（出力インデックス順）
    pub class_labels: Vec<String>,

    /// モデル入力解像度（正方形）
    pub model_input_size: u32,

    /// 想定する入力画素フォーマット
    pub input_pixel_format: PixelFormat,
}

impl InferenceConfig {
    /// メタデータからInferenceConfigを作成
    pub fn from_metadata(metadata: &ModelMetadata) -> Self {
        Self {
            class_labels: metadata.class_labels.clone(),
            model_input_size: metadata.model_input_size,
            input_pixel_format: metadata.input_pixel_format,
        }
    }

    /// モデルファイルから推論設定を読み込む
    pub fn load_from_model(model_path: &Path) -> Result<Self> {
        let metadata = model_storage::load_metadata(model_path)
            .context("Failed to load model metadata")?;
        metadata.validate()?;
        Ok(Self::from_metadata(&metadata))
    }

    pub fn num_classes(&self) -> usize {
        self.class_labels.len()
    }

    /// クラスインデックスからラベルを取得
    pub fn class_index_to_label(&self, index: usize) -> Option<&str> {
        self.class_labels.get(index).map(String::as_str)
    }

    /// ラベルからクラスインデックスを取得
    pub fn label_to_class_index(&self, label: &str) -> Option<usize> {
        self.class_labels.iter().position(|l| l == label)
    }

    /// 設定情報を1行で
    pub fn summary(&self) -> String {
        format!(
            "{} クラス [{}], 入力 {}x{}",
            self.num_classes(),
            self.class_labels.join(", "),
            self.model_input_size,
            self.model_input_size
        )
    }
}
