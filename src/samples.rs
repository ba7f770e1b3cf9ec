//! 同梱サンプル画像の一覧と読み込み

use anyhow::{Context, Result};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// サンプル画像名（表示順）
pub const SAMPLE_IMAGES: [&str; 15] = [
    "testpaper01-00", "testpaper01-01", "testpaper01-02", "testpaper01-03", "testpaper01-04",
    "testrock01-00", "testrock01-01", "testrock01-02", "testrock01-03", "testrock01-04",
    "testscissors01-00", "testscissors01-01", "testscissors01-02", "testscissors01-03", "testscissors01-04",
];

/// 読み込みを試す拡張子
const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// じゃんけんの手
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gesture {
    Rock,
    Paper,
    Scissors,
}

impl Gesture {
    pub const ALL: [Gesture; 3] = [Gesture::Paper, Gesture::Rock, Gesture::Scissors];

    pub fn as_str(self) -> &'static str {
        match self {
            Gesture::Rock => "rock",
            Gesture::Paper => "paper",
            Gesture::Scissors => "scissors",
        }
    }

    /// "testrock01-00" のようなサンプル名から手を判定
    pub fn from_sample_name(name: &str) -> Option<Self> {
        let stem = name.strip_prefix("test")?;
        Self::ALL
            .into_iter()
            .find(|gesture| stem.starts_with(gesture.as_str()))
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|gesture| gesture.as_str().eq_ignore_ascii_case(label.trim()))
    }
}

impl std::fmt::Display for Gesture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 手ごとのサンプル名（各5枚）
pub fn sample_groups() -> Vec<(Gesture, Vec<&'static str>)> {
    Gesture::ALL
        .into_iter()
        .map(|gesture| {
            let names = SAMPLE_IMAGES
                .iter()
                .copied()
                .filter(|name| Gesture::from_sample_name(name) == Some(gesture))
                .collect();
            (gesture, names)
        })
        .collect()
}

/// サンプル画像の置き場所
#[derive(Debug, Clone)]
pub struct SampleStore {
    root: PathBuf,
}

impl SampleStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 名前から実ファイルを探す
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        IMAGE_EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{}.{}", name, ext)))
            .find(|path| path.is_file())
    }

    /// サンプル画像をデコードして返す
    pub fn load(&self, name: &str) -> Result<DynamicImage> {
        let path = self
            .resolve(name)
            .ok_or_else(|| anyhow::anyhow!("サンプル画像が見つかりません: {} ({})", name, self.root.display()))?;
        let image = image::open(&path)
            .with_context(|| format!("画像の読み込みに失敗しました: {}", path.display()))?;
        log::debug!("サンプル画像を読み込み: {} ({}x{})", path.display(), image.width(), image.height());
        Ok(image)
    }
}
