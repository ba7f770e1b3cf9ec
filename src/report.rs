//! 全サンプルの一括判定とCSVレポート

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::classifier::Classifier;
use crate::pixel::{to_pixel_buffer, ConversionOptions};
use crate::samples::{Gesture, SampleStore, SAMPLE_IMAGES};

/// 1サンプル分の結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleResult {
    pub sample: String,
    pub expected: Option<Gesture>,
    pub predicted: Option<String>,
    pub confidence: Option<f32>,
    pub error: Option<String>,
}

impl SampleResult {
    pub fn is_correct(&self) -> bool {
        match (&self.expected, &self.predicted) {
            (Some(expected), Some(predicted)) => Gesture::from_label(predicted) == Some(*expected),
            _ => false,
        }
    }
}

/// すべてのサンプルを変換・判定する
///
/// 個々の失敗は結果行に記録して続行する。
pub fn evaluate_samples(
    store: &SampleStore,
    classifier: &dyn Classifier,
    options: &ConversionOptions,
) -> Vec<SampleResult> {
    SAMPLE_IMAGES
        .iter()
        .map(|&name| {
            let mut result = SampleResult {
                sample: name.to_string(),
                expected: Gesture::from_sample_name(name),
                predicted: None,
                confidence: None,
                error: None,
            };

            let outcome = store
                .load(name)
                .and_then(|image| to_pixel_buffer(&image, options).map_err(anyhow::Error::from))
                .and_then(|buffer| classifier.predict(&buffer));

            match outcome {
                Ok(prediction) => {
                    result.predicted = Some(prediction.label);
                    result.confidence = Some(prediction.confidence);
                }
                Err(e) => {
                    log::warn!("{}: {:#}", name, e);
                    result.error = Some(format!("{:#}", e));
                }
            }
            result
        })
        .collect()
}

/// 予測できたサンプルのうち正解した割合
pub fn accuracy(results: &[SampleResult]) -> Option<f64> {
    let predicted = results.iter().filter(|r| r.predicted.is_some()).count();
    if predicted == 0 {
        return None;
    }
    let correct = results.iter().filter(|r| r.is_correct()).count();
    Some(correct as f64 / predicted as f64)
}

/// CSVに書き出す
pub fn write_report(path: &Path, results: &[SampleResult]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create parent directory: {:?}", parent))?;
        }
    }

    let mut writer = csv::Writer::from_path(path)
        .context(format!("CSV作成エラー: {}", path.display()))?;
    writer.write_record(["sample", "expected", "predicted", "confidence", "correct", "error"])?;

    for result in results {
        writer.write_record([
            result.sample.clone(),
            result.expected.map(|g| g.to_string()).unwrap_or_default(),
            result.predicted.clone().unwrap_or_default(),
            result.confidence.map(|c| format!("{:.4}", c)).unwrap_or_default(),
            (result.is_correct() as u8).to_string(),
            result.error.clone().unwrap_or_default(),
        ])?;
    }

    writer.flush().context("CSVフラッシュエラー")?;
    log::info!("レポートを書き出しました: {} ({}件)", path.display(), results.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Prediction;
    use crate::pixel::PixelBuffer;
    use crate::samples::test_support::unique_temp_dir;
    use image::{Rgb, RgbImage};

    /// 画素の赤成分で手を決める
    struct RedClassifier;

    impl Classifier for RedClassifier {
        fn predict(&self, buffer: &PixelBuffer) -> anyhow::Result<Prediction> {
            let [r, _, _] = buffer.rgb(0, 0).unwrap();
            let label = if r > 128 { "rock" } else { "paper" };
            Ok(Prediction {
                label: label.to_string(),
                confidence: 1.0,
            })
        }
    }

    #[test]
    fn test_evaluate_and_write() {
        let dir = unique_temp_dir("report");
        RgbImage::from_pixel(4, 4, Rgb([255, 0, 0]))
            .save(dir.join("testrock01-00.png"))
            .unwrap();
        RgbImage::from_pixel(4, 4, Rgb([255, 0, 0]))
            .save(dir.join("testpaper01-00.png"))
            .unwrap();

        let store = SampleStore::new(&dir);
        let results = evaluate_samples(&store, &RedClassifier, &ConversionOptions::default());
        assert_eq!(results.len(), 15);

        let rock = results.iter().find(|r| r.sample == "testrock01-00").unwrap();
        assert!(rock.is_correct());
        let paper = results.iter().find(|r| r.sample == "testpaper01-00").unwrap();
        assert_eq!(paper.predicted.as_deref(), Some("rock"));
        assert!(!paper.is_correct());
        assert_eq!(results.iter().filter(|r| r.error.is_some()).count(), 13);
        assert_eq!(accuracy(&results), Some(0.5));

        let path = dir.join("out/report.csv");
        write_report(&path, &results).unwrap();
        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 15);
        let rock_row = rows.iter().find(|r| &r[0] == "testrock01-00").unwrap();
        assert_eq!(&rock_row[1], "rock");
        assert_eq!(&rock_row[4], "1");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_accuracy_without_predictions() {
        assert_eq!(accuracy(&[]), None);
    }
}
