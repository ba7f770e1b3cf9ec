//! モデルアーカイブと画像変換の確認用ツール
//!
//! ```text
//! model_tool show <archive>
//! model_tool init <archive> [size]
//! model_tool convert <image>
//! ```

use anyhow::{bail, Context, Result};
use rps_demo_lib::ml::export_untrained_model;
use rps_demo_lib::model::{describe_metadata, load_metadata, InferenceConfig, DEFAULT_MODEL_INPUT_SIZE};
use rps_demo_lib::samples::Gesture;
use rps_demo_lib::{ConversionOptions, ToPixelBuffer};
use std::path::PathBuf;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(e) = run(&args) {
        eprintln!("✗ エラー: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: &[String]) -> Result<()> {
    match args {
        [command, path] if command == "show" => show(PathBuf::from(path)),
        [command, path] if command == "init" => init(PathBuf::from(path), DEFAULT_MODEL_INPUT_SIZE),
        [command, path, size] if command == "init" => {
            let size = size
                .parse::<u32>()
                .with_context(|| format!("入力サイズが数値ではありません: {}", size))?;
            init(PathBuf::from(path), size)
        }
        [command, path] if command == "convert" => convert(PathBuf::from(path)),
        _ => {
            print_usage();
            bail!("引数が正しくありません");
        }
    }
}

fn print_usage() {
    println!("使い方:");
    println!("  model_tool show <archive>");
    println!("  model_tool init <archive> [size]");
    println!("  model_tool convert <image>");
}

fn show(path: PathBuf) -> Result<()> {
    let metadata = load_metadata(&path)?;
    println!("{}", describe_metadata(&metadata));

    match InferenceConfig::load_from_model(&path) {
        Ok(config) => println!("✓ 推論設定: {}", config.summary()),
        Err(e) => println!("✗ 推論には使えません: {:#}", e),
    }
    Ok(())
}

fn init(path: PathBuf, size: u32) -> Result<()> {
    let labels = Gesture::ALL.iter().map(|g| g.as_str().to_string()).collect();
    let written = export_untrained_model(&path, labels, size)?;
    println!("✓ 未学習モデルを書き出しました: {}", written.display());
    Ok(())
}

fn convert(path: PathBuf) -> Result<()> {
    let image = image::open(&path).with_context(|| format!("画像を開けません: {:?}", path))?;
    let buffer = image.to_pixel_buffer_with(&ConversionOptions::default())?;

    println!("✓ 変換成功: {}", path.display());
    println!("  サイズ: {}x{}", buffer.width(), buffer.height());
    println!("  形式: {}", buffer.format());
    println!("  行バイト数: {}", buffer.bytes_per_row());
    if let Some([r, g, b]) = buffer.rgb(0, 0) {
        println!("  左上の画素: ({}, {}, {})", r, g, b);
    }
    Ok(())
}
