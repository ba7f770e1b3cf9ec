//! デモ画面の状態
//!
//! サンプル画像を1枚ずつ表示し、「判定」で分類結果を出す。表示そのものはフロントエンド側。

use crate::classifier::{Classifier, Prediction};
use crate::model::AppConfig;
use crate::pixel::{to_pixel_buffer, ConversionOptions};
use crate::report::{evaluate_samples, SampleResult};
use crate::samples::{SampleStore, SAMPLE_IMAGES};

/// ラベル未設定時の表示
pub const PLACEHOLDER_TEXT: &str = "「判定」を押してください";

/// 判定操作の結果
#[derive(Debug, Clone, PartialEq)]
pub enum PredictOutcome {
    /// 分類できた（ラベル更新済み）
    Predicted(Prediction),
    /// サンプル画像が読めない（何もしない）
    ImageUnavailable,
    /// 画素バッファに変換できない（何もしない）
    ConversionUnavailable,
    /// 分類器が読み込まれていない（ラベルは空になる）
    ClassifierUnavailable,
    /// 分類器がエラーを返した（ラベルはそのまま）
    ClassificationFailed(String),
}

pub struct DemoSession {
    current_index: usize,
    class_label: String,
    classifier: Option<Box<dyn Classifier>>,
    conversion: ConversionOptions,
}

impl DemoSession {
    pub fn new(classifier: Option<Box<dyn Classifier>>, conversion: ConversionOptions) -> Self {
        Self {
            current_index: 0,
            class_label: String::new(),
            classifier,
            conversion,
        }
    }

    /// 設定から分類器を読み込んで作成
    ///
    /// 読み込みに失敗しても画面は動かす（判定だけができない）。
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(load_optional_classifier(config), config.conversion)
    }

    pub fn has_classifier(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn sample_count(&self) -> usize {
        SAMPLE_IMAGES.len()
    }

    pub fn current_sample(&self) -> &'static str {
        SAMPLE_IMAGES[self.current_index]
    }

    pub fn class_label(&self) -> &str {
        &self.class_label
    }

    pub fn can_go_previous(&self) -> bool {
        self.current_index != 0
    }

    pub fn can_go_next(&self) -> bool {
        self.current_index < self.sample_count() - 1
    }

    /// 前の画像へ（先頭では何もしない）
    pub fn previous(&mut self) -> bool {
        if !self.can_go_previous() {
            return false;
        }
        self.current_index -= 1;
        true
    }

    /// 次の画像へ（末尾では何もしない）
    pub fn next(&mut self) -> bool {
        if !self.can_go_next() {
            return false;
        }
        self.current_index += 1;
        true
    }

    /// "3 / 15"
    pub fn position_text(&self) -> String {
        format!("{} / {}", self.current_index + 1, self.sample_count())
    }

    pub fn result_text(&self) -> String {
        if self.class_label.is_empty() {
            PLACEHOLDER_TEXT.to_string()
        } else {
            format!("結果: {}", self.class_label)
        }
    }

    /// 現在の画像を判定する
    pub fn predict(&mut self, store: &SampleStore) -> PredictOutcome {
        let name = self.current_sample();
        let image = match store.load(name) {
            Ok(image) => image,
            Err(e) => {
                log::warn!("{:#}", e);
                return PredictOutcome::ImageUnavailable;
            }
        };

        let buffer = match to_pixel_buffer(&image, &self.conversion) {
            Ok(buffer) => buffer,
            Err(e) => {
                log::warn!("{} を変換できません: {}", name, e);
                return PredictOutcome::ConversionUnavailable;
            }
        };

        let Some(classifier) = self.classifier.as_ref() else {
            self.class_label.clear();
            return PredictOutcome::ClassifierUnavailable;
        };

        match classifier.predict(&buffer) {
            Ok(prediction) => {
                log::info!(
                    "{} -> {} ({:.1}%)",
                    name,
                    prediction.label,
                    prediction.confidence * 100.0
                );
                self.class_label = prediction.label.clone();
                PredictOutcome::Predicted(prediction)
            }
            Err(e) => {
                log::error!("推論エラー ({}): {:#}", name, e);
                PredictOutcome::ClassificationFailed(e.to_string())
            }
        }
    }

    /// 全サンプルを一括判定（分類器がなければ None）
    pub fn evaluate_all(&self, store: &SampleStore) -> Option<Vec<SampleResult>> {
        let classifier = self.classifier.as_deref()?;
        Some(evaluate_samples(store, classifier, &self.conversion))
    }
}

#[cfg(feature = "ml")]
fn load_optional_classifier(config: &AppConfig) -> Option<Box<dyn Classifier>> {
    match crate::ml::load_classifier(config) {
        Ok(classifier) => Some(classifier),
        Err(e) => {
            log::error!("分類器を読み込めませんでした: {:#}", e);
            None
        }
    }
}

#[cfg(not(feature = "ml"))]
fn load_optional_classifier(_config: &AppConfig) -> Option<Box<dyn Classifier>> {
    log::warn!("機械学習機能が有効化されていません");
    None
}
