use anyhow::Context;
use clap::Parser;
use fai_coc_common::OutputMode;
use fai_coc_rust::{cli, config, export, orchestrator, recognizer};
use cli::{Cli, Commands};
use config::{Config, RunParameters};
use indicatif::{ProgressBar, ProgressStyle};
use orchestrator::{CancelToken, Orchestrator, RunEvent};
use recognizer::{command_available, Engines};
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    match cli.command {
        Commands::Run { root, no_force_ocr, destructive, output, format, filter } => {
            let config = Config::load().context("設定の読み込みに失敗しました")?;
            println!("📑 fai-coc - 照合・ハイライト\n");

            // 1. 外部ツール確認
            println!("[1/3] 外部ツールを確認中...");
            let mut missing = 0;
            for program in [&config.pdftotext_path, &config.pdftoppm_path, &config.tesseract_path] {
                if !command_available(program) {
                    println!("⚠ {} が見つかりません", program);
                    missing += 1;
                }
            }
            if missing == 0 {
                println!("✔ OK\n");
            } else {
                println!("- 該当する処理は失敗として結果に記録されます\n");
            }

            let mode = if destructive { OutputMode::Destructive } else { OutputMode::Safe };
            let params = RunParameters::new(&root)
                .with_force_recognition(!no_force_ocr)
                .with_output_mode(mode);

            let cancel = CancelToken::new();
            {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        eprintln!("\n中断しています（処理中の書き込みは完了まで待ちます）...");
                        cancel.cancel();
                    }
                });
            }

            // 2. 照合・ハイライト
            println!("[2/3] 照合・ハイライト中... (出力モード: {})", mode);
            let (tx, rx) = mpsc::unbounded_channel();
            let progress = tokio::spawn(show_progress(rx));
            let orchestrator = Orchestrator::new(config.clone(), Engines::system(&config)).with_events(tx);
            let report = orchestrator.run(&params, cancel).await?;
            drop(orchestrator);
            progress.await?;
            println!(
                "✔ {}ファイル / {}行を処理 (同時実行 最大{})\n",
                report.state.completed,
                report.results.len(),
                report.peak_active
            );

            // 3. 結果出力
            println!("[3/3] 結果を出力中...");
            let output = output.unwrap_or_else(|| root.join(&config.output_folder_name));
            for path in export::export_results(&report.results, filter, format, &output)? {
                println!("✔ 結果出力: {}", path.display());
            }

            println!("\n{}", report.results.summary());
            if report.state.cancelled {
                println!("\n⚠ 中断されました（未処理の行は結果に含まれません）");
            } else {
                println!("\n✅ 完了");
            }
        }

        Commands::Scan { root } => {
            let config = Config::load().context("設定の読み込みに失敗しました")?;
            println!("🔍 fai-coc - 照合プレビュー\n");

            let orchestrator = Orchestrator::new(config.clone(), Engines::system(&config));
            let plan = orchestrator.plan(&root)?;

            for pair in &plan.tree.pairs {
                match &pair.certificate {
                    Some(folder) => println!("✔ FAI {} → {}", pair.inspection_number, folder.display()),
                    None => println!("⚠ FAI {} → 証明書フォルダなし", pair.inspection_number),
                }
            }
            println!();
            for sheet in &plan.spreadsheets {
                println!("{}", sheet.path.display());
                for candidate in &sheet.candidates {
                    let target = match (&candidate.document, candidate.rule) {
                        (Some(document), Some(rule)) => format!("{} ({})", document.display(), rule),
                        (Some(document), None) => document.display().to_string(),
                        _ => "Document Not Found".to_string(),
                    };
                    println!(
                        "  行{} {} / {} → {}",
                        candidate.record.row_index,
                        candidate.record.primary_id,
                        candidate.record.alternate_id,
                        target
                    );
                }
            }

            println!(
                "\n✔ FAIフォルダ {}件 (証明書あり {}件) / 行 {}件 (PDF照合 {}件)",
                plan.tree.pairs.len(),
                plan.tree.paired_count(),
                plan.job_count(),
                plan.matched_count()
            );
        }

        Commands::Config { show, init } => {
            // 壊れた設定ファイルでも表示・作り直しはできるようにする
            let config = Config::load_or_default();
            if init {
                config.save()?;
                println!("✔ 設定ファイルを作成しました: {}", Config::config_path()?.display());
            }

            if show || !init {
                println!("設定:");
                println!("  認識エンジン: {} ({})", config.tesseract_path, config.ocr_language);
                println!("  ラスタライズ: {} ({} dpi)", config.pdftoppm_path, config.ocr_dpi);
                println!("  テキスト抽出: {}", config.pdftotext_path);
                println!("  テキストなしとみなす文字数: {}未満", config.min_native_chars);
                println!("  出力フォルダ名: {}", config.output_folder_name);
                println!("  テキストレイヤー埋め込み: {}", if config.embed_text_layer { "有効" } else { "無効" });
                println!("  未検出PDFの書き出し: {}", if config.write_unmatched { "有効" } else { "無効" });
                let rules: Vec<&str> = config.match_rules.iter().map(|r| r.as_str()).collect();
                println!("  照合ルール: {}", rules.join(", "));
            }
        }
    }

    Ok(())
}

/// スプレッドシート単位の進捗バー
async fn show_progress(mut events: mpsc::UnboundedReceiver<RunEvent>) {
    let mut bar: Option<ProgressBar> = None;

    while let Some(event) = events.recv().await {
        match event {
            RunEvent::Started { total_files, total_jobs } => {
                let pb = ProgressBar::new(total_files as u64);
                pb.set_style(
                    ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar()),
                );
                pb.set_message(format!("{}行", total_jobs));
                bar = Some(pb);
            }
            RunEvent::FileCompleted { file, completed, .. } => {
                if let Some(pb) = &bar {
                    pb.set_position(completed as u64);
                    pb.set_message(file);
                }
            }
            RunEvent::JobStateChanged { .. } => {}
            RunEvent::Finished { .. } => {
                if let Some(pb) = bar.take() {
                    pb.finish_and_clear();
                }
            }
        }
    }
}
