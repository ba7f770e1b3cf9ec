mod shell;

pub mod classifier;
pub mod demo;
pub mod model;
pub mod pixel;
pub mod report;
pub mod samples;
#[cfg(feature = "ml")]
pub mod ml;

pub use classifier::{Classifier, Prediction};
pub use demo::{DemoSession, PredictOutcome};
pub use pixel::{to_pixel_buffer, ConversionError, ConversionOptions, PixelBuffer, PixelFormat, ToPixelBuffer};

use std::io::{BufRead, Write};
use std::path::PathBuf;

use model::AppConfig;
use samples::SampleStore;

/// 端末版のデモを起動する
///
/// 第1引数で設定ファイルのパスを指定できる（省略時は config.json）。
pub fn run() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load_or_default_from(PathBuf::from(path)),
        None => AppConfig::load_or_default(),
    };
    log::debug!("\n{}", config.display());

    let store = SampleStore::new(&config.samples.directory);
    let mut session = DemoSession::from_config(&config);

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    shell::run_loop(&mut session, &store, &config, stdin.lock(), &mut stdout)
}

/// 入力と出力を差し替えられる形で公開（結合テスト用）
pub fn run_with_io<R: BufRead, W: Write>(
    session: &mut DemoSession,
    store: &SampleStore,
    config: &AppConfig,
    input: R,
    output: &mut W,
) -> anyhow::Result<()> {
    shell::run_loop(session, store, config, input, output)
}
