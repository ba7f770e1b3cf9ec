//! モデルメタデータの定義
//!
//! tar.gz 形式のモデルアーカイブに `metadata.json` として同梱される。
//! 推論時はここに書かれたラベル順・入力サイズに従う。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::pixel::PixelFormat;

/// ネットワークが受け付ける最小の入力サイズ
pub const MIN_MODEL_INPUT_SIZE: u32 = 18;

/// 既定のモデル入力サイズ（正方形）
pub const DEFAULT_MODEL_INPUT_SIZE: u32 = 64;

/// モデルメタデータ
///
/// tar.gz 形式で保存される情報：
/// - metadata.json: このメタデータ（JSON形式）
/// - model.bin: モデルの重み（バイナリ）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// モデル名（表示用）
    pub model_name: String,

    /// クラスラベル（出力インデックス順）
    /// 例: ["paper", "rock", "scissors"]
    pub class_labels: Vec<String>,

    /// モデル入力サイズ（正方形の一辺、ピクセル）
    /// 画素バッファはこのサイズに縮小してから推論する
    pub model_input_size: u32,

    /// 入力として想定する画素フォーマット
    #[serde(default)]
    pub input_pixel_format: PixelFormat,

    /// 書き出し時刻（ISO8601形式）
    pub exported_at: String,
}

impl ModelMetadata {
    /// 新しいメタデータを作成
    pub fn new(
        model_name: impl Into<String>,
        class_labels: Vec<String>,
        model_input_size: u32,
        input_pixel_format: PixelFormat,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            class_labels,
            model_input_size,
            input_pixel_format,
            exported_at: chrono::Local::now().to_rfc3339(),
        }
    }

    /// 推論に使えるかどうかを検証
    pub fn validate(&self) -> Result<()> {
        if self.class_labels.is_empty() {
            anyhow::bail!("クラスラベルが空です");
        }
        for (i, label) in self.class_labels.iter().enumerate() {
            if label.trim().is_empty() {
                anyhow::bail!("クラスラベル {} が空文字です", i);
            }
            if self.class_labels[..i].contains(label) {
                anyhow::bail!("クラスラベルが重複しています: {}", label);
            }
        }
        if self.model_input_size < MIN_MODEL_INPUT_SIZE {
            anyhow::bail!(
                "入力サイズが小さすぎます: {} (最小 {}x{})",
                self.model_input_size,
                MIN_MODEL_INPUT_SIZE,
                MIN_MODEL_INPUT_SIZE
            );
        }
        Ok(())
    }

    /// メタデータをJSON文字列に変換
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize metadata to JSON")
    }

    /// JSON文字列からメタデータを生成
    pub fn from_json_string(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize metadata from JSON")
    }
}
