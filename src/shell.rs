//! 端末上の画面と操作

use anyhow::Result;
use std::io::{BufRead, Write};
use std::path::Path;

use crate::demo::{DemoSession, PredictOutcome};
use crate::model::AppConfig;
use crate::report::{accuracy, write_report};
use crate::samples::SampleStore;

const TITLE: &str = "じゃんけん判定デモ（グー・チョキ・パー）";

#[derive(Debug, Clone, PartialEq, Eq)]
enum ShellCommand {
    Previous,
    Next,
    Predict,
    Evaluate,
    Help,
    Quit,
    Unknown(String),
}

impl ShellCommand {
    fn parse(line: &str) -> Self {
        match line.trim().to_ascii_lowercase().as_str() {
            "p" | "prev" | "previous" => ShellCommand::Previous,
            "n" | "next" => ShellCommand::Next,
            "" | "j" | "predict" => ShellCommand::Predict,
            "e" | "eval" => ShellCommand::Evaluate,
            "h" | "help" | "?" => ShellCommand::Help,
            "q" | "quit" | "exit" => ShellCommand::Quit,
            other => ShellCommand::Unknown(other.to_string()),
        }
    }
}

fn render<W: Write>(session: &DemoSession, output: &mut W) -> Result<()> {
    writeln!(output, "==============================")?;
    writeln!(output, " {}", TITLE)?;
    writeln!(output, "==============================")?;
    writeln!(output, " 現在の画像: {}", session.current_sample())?;
    writeln!(output, " {}", session.result_text())?;

    let previous = if session.can_go_previous() { "[p] 前へ" } else { "    ---" };
    let next = if session.can_go_next() { "[n] 次へ" } else { "---    " };
    writeln!(output, " {}   {}   {}", previous, session.position_text(), next)?;
    Ok(())
}

fn help<W: Write>(output: &mut W) -> Result<()> {
    writeln!(output, " Enter/j: 判定  p: 前へ  n: 次へ  e: 一括評価  q: 終了")?;
    Ok(())
}

fn evaluate<W: Write>(
    session: &DemoSession,
    store: &SampleStore,
    config: &AppConfig,
    output: &mut W,
) -> Result<()> {
    let Some(results) = session.evaluate_all(store) else {
        writeln!(output, " 分類器が読み込まれていません")?;
        return Ok(());
    };

    if let Err(e) = write_report(Path::new(&config.report.output_path), &results) {
        log::error!("レポートの書き出しに失敗しました: {:#}", e);
    }

    let predicted = results.iter().filter(|r| r.predicted.is_some()).count();
    match accuracy(&results) {
        Some(acc) => writeln!(
            output,
            " 一括評価: {}/{} 枚を判定、正解率 {:.1}%",
            predicted,
            results.len(),
            acc * 100.0
        )?,
        None => writeln!(output, " 一括評価: 判定できた画像がありません")?,
    }
    Ok(())
}

pub(crate) fn run_loop<R: BufRead, W: Write>(
    session: &mut DemoSession,
    store: &SampleStore,
    config: &AppConfig,
    input: R,
    output: &mut W,
) -> Result<()> {
    if !session.has_classifier() {
        writeln!(output, " ※ 分類器が読み込まれていないため判定できません")?;
    }
    render(session, output)?;
    help(output)?;

    for line in input.lines() {
        match ShellCommand::parse(&line?) {
            ShellCommand::Previous => {
                session.previous();
            }
            ShellCommand::Next => {
                session.next();
            }
            ShellCommand::Predict => match session.predict(store) {
                PredictOutcome::ImageUnavailable => {
                    writeln!(output, " 画像を読み込めませんでした")?;
                }
                PredictOutcome::ConversionUnavailable => {
                    writeln!(output, " 画像を変換できませんでした")?;
                }
                PredictOutcome::ClassificationFailed(_) => {
                    writeln!(output, " 判定に失敗しました")?;
                }
                PredictOutcome::Predicted(_) | PredictOutcome::ClassifierUnavailable => {}
            },
            ShellCommand::Evaluate => {
                evaluate(session, store, config, output)?;
                continue;
            }
            ShellCommand::Help => {
                help(output)?;
                continue;
            }
            ShellCommand::Quit => break,
            ShellCommand::Unknown(command) => {
                writeln!(output, " 不明なコマンド: {}", command)?;
                help(output)?;
                continue;
            }
        }
        render(session, output)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Classifier, Prediction};
    use crate::pixel::{ConversionOptions, PixelBuffer};
    use crate::samples::test_support::unique_temp_dir;
    use image::{Rgb, RgbImage};

    struct AlwaysPaper;

    impl Classifier for AlwaysPaper {
        fn predict(&self, _buffer: &PixelBuffer) -> anyhow::Result<Prediction> {
            Ok(Prediction {
                label: "paper".to_string(),
                confidence: 0.75,
            })
        }
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(ShellCommand::parse("N"), ShellCommand::Next);
        assert_eq!(ShellCommand::parse(" prev "), ShellCommand::Previous);
        assert_eq!(ShellCommand::parse(""), ShellCommand::Predict);
        assert_eq!(ShellCommand::parse("quit"), ShellCommand::Quit);
        assert_eq!(ShellCommand::parse("dance"), ShellCommand::Unknown("dance".to_string()));
    }

    #[test]
    fn test_blank_line_runs_prediction() {
        let dir = unique_temp_dir("shell_blank");
        RgbImage::from_pixel(4, 4, Rgb([1, 2, 3]))
            .save(dir.join("testpaper01-00.png"))
            .unwrap();
        let store = SampleStore::new(&dir);
        let config = AppConfig::default();

        let mut session = DemoSession::new(Some(Box::new(AlwaysPaper)), ConversionOptions::default());
        let mut output = Vec::new();
        run_loop(&mut session, &store, &config, "\n".as_bytes(), &mut output).unwrap();

        // Enter のみの行は判定として扱う
        assert_eq!(session.class_label(), "paper");
        assert!(String::from_utf8(output).unwrap().contains("結果: paper"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_session_script() {
        let dir = unique_temp_dir("shell");
        RgbImage::from_pixel(5, 5, Rgb([9, 9, 9]))
            .save(dir.join("testpaper01-01.png"))
            .unwrap();
        let store = SampleStore::new(&dir);
        let mut config = AppConfig::default();
        config.report.output_path = dir.join("report.csv").to_string_lossy().to_string();

        let mut session = DemoSession::new(Some(Box::new(AlwaysPaper)), ConversionOptions::default());
        let script = "p\nn\n\ne\nq\nn\n";
        let mut output = Vec::new();
        run_loop(&mut session, &store, &config, script.as_bytes(), &mut output).unwrap();

        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("2 / 15"));
        assert!(text.contains("結果: paper"));
        assert!(text.contains("正解率 100.0%"));
        // q の後の入力は処理されない
        assert_eq!(session.current_index(), 1);
        assert!(dir.join("report.csv").exists());

        std::fs::remove_dir_all(&dir).ok();
    }
}
