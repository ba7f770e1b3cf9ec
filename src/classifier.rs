//! 分類器のインターフェース
//!
//! 学習済みモデルの中身には依存しない。画素バッファを1枚受け取り、ラベルを返すだけ。

use anyhow::Result;
use serde::Serialize;

use crate::pixel::PixelBuffer;

/// 推論結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// 予測ラベル（例: "rock"）
    pub label: String,
    /// 予測クラスの確率
    pub confidence: f32,
}

/// 画素バッファ → ラベル
pub trait Classifier {
    fn predict(&self, buffer: &PixelBuffer) -> Result<Prediction>;
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn predict(&self, buffer: &PixelBuffer) -> Result<Prediction> {
        (**self).predict(buffer)
    }
}
