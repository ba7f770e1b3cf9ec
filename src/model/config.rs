//! アプリケーション設定管理モジュール
//!
//! 計算デバイスやモデル・サンプル画像の場所などをJSON形式で保存・読み込みします。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::pixel::ConversionOptions;

/// 計算デバイスの種類
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DeviceType {
    /// WGPU (GPU) バックエンド
    #[default]
    Wgpu,
    /// NdArray (CPU) バックエンド
    Cpu,
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceType::Wgpu => write!(f, "WGPU (GPU)"),
            DeviceType::Cpu => write!(f, "CPU (NdArray)"),
        }
    }
}

/// モデル設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// 使用するモデルアーカイブ（tar.gz）のパス
    pub model_path: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model_path: "models/rps_classifier.tar.gz".to_string(),
        }
    }
}

/// サンプル画像設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleSettings {
    /// サンプル画像のディレクトリ
    pub directory: String,
}

impl Default for SampleSettings {
    fn default() -> Self {
        Self {
            directory: "assets/samples".to_string(),
        }
    }
}

/// 一括評価レポート設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSettings {
    /// CSVの出力先
    pub output_path: String,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            output_path: "output/sample_report.csv".to_string(),
        }
    }
}

/// アプリケーション設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 計算デバイスの種類
    #[serde(default)]
    pub device_type: DeviceType,
    /// モデル設定
    #[serde(default)]
    pub model: ModelSettings,
    /// 画素バッファ変換の設定
    #[serde(default)]
    pub conversion: ConversionOptions,
    /// サンプル画像設定
    #[serde(default)]
    pub samples: SampleSettings,
    /// レポート設定
    #[serde(default)]
    pub report: ReportSettings,
}

impl AppConfig {
    /// 設定ファイルのデフォルトパス
    pub fn default_path() -> PathBuf {
        PathBuf::from("config.json")
    }

    /// 設定を読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// 指定パスから設定を読み込む、存在しない・壊れている場合はデフォルト設定を返す
    pub fn load_or_default_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if path.exists() {
            match Self::load(path) {
                Ok(config) => {
                    log::info!("設定ファイルを読み込みました: {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!(
                        "設定ファイルの読み込みに失敗しました ({}): {}。デフォルト設定を使用します",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            }
        } else {
            log::info!("設定ファイルが存在しません。デフォルト設定を使用します");
            Self::default()
        }
    }

    /// デフォルトパスから設定を読み込む
    pub fn load_or_default() -> Self {
        Self::load_or_default_from(Self::default_path())
    }

    /// 設定を保存する
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }


    /// 計算デバイスを設定
    pub fn set_device_type(&mut self, device_type: DeviceType) {
        self.device_type = device_type;
    }

    /// モデルパスを設定
    pub fn set_model_path(&mut self, path: String) {
        self.model.model_path = path;
    }

    /// 設定情報を表示用の文字列にする
    pub fn display(&self) -> String {
        [
            "=== アプリケーション設定 ===".to_string(),
            format!("計算デバイス: {}", self.device_type),
            format!("モデルパス: {}", self.model.model_path),
            format!("画素フォーマット: {}", self.conversion.pixel_format),
            format!("行アラインメント: {}", self.conversion.row_alignment),
            format!("サンプル画像: {}", self.samples.directory),
            format!("レポート出力先: {}", self.report.output_path),
            "========================".to_string(),
        ]
        .join("\n")
    }
}
