use clap::{Parser, Subcommand};
use fai_coc_common::ResultFilter;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fai-coc")]
#[command(about = "FAI検査表とMaterial CoC証明書PDFの照合・ハイライトツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 照合からハイライト、結果出力まで一括実行
    Run {
        /// 検査データのルートフォルダ
        #[arg(required = true)]
        root: PathBuf,

        /// テキストのあるページは認識を省略する
        #[arg(long)]
        no_force_ocr: bool,

        /// 元のPDFを上書きする（バックアップなし）
        #[arg(long)]
        destructive: bool,

        /// 結果ファイル（デフォルト: ルート/出力フォルダ/fai_coc_results.<拡張子>）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 結果の形式 (csv/excel/json/all)
        #[arg(short, long, default_value = "csv")]
        format: ExportFormat,

        /// 出力する結果 (all/document-found/document-not-found/identifier-not-found/identifier-found)
        #[arg(long, default_value = "all")]
        filter: ResultFilter,
    },

    /// フォルダ探索と照合だけを行う（PDFには触れない）
    Scan {
        /// 検査データのルートフォルダ
        #[arg(required = true)]
        root: PathBuf,
    },

    /// 設定を表示
    Config {
        /// 設定を表示
        #[arg(long)]
        show: bool,

        /// 既定値で設定ファイルを作成
        #[arg(long)]
        init: bool,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Csv,
    Excel,
    Json,
    All,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv | ExportFormat::All => "csv",
            ExportFormat::Excel => "xlsx",
            ExportFormat::Json => "json",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "excel" | "xlsx" => Ok(ExportFormat::Excel),
            "json" => Ok(ExportFormat::Json),
            "all" => Ok(ExportFormat::All),
            _ => Err(format!("Unknown format: {}. Use csv, excel, json, or all", s)),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Csv => write!(f, "csv"),
            ExportFormat::Excel => write!(f, "excel"),
            ExportFormat::Json => write!(f, "json"),
            ExportFormat::All => write!(f, "all"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_export_format_parse() {
        assert_eq!("CSV".parse::<ExportFormat>(), Ok(ExportFormat::Csv));
        assert_eq!("xlsx".parse::<ExportFormat>(), Ok(ExportFormat::Excel));
        assert_eq!("json".parse::<ExportFormat>(), Ok(ExportFormat::Json));
        assert_eq!("all".parse::<ExportFormat>(), Ok(ExportFormat::All));
        assert!("pdf".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_run_arguments() {
        let cli = Cli::parse_from([
            "fai-coc",
            "run",
            "/data/root",
            "--destructive",
            "--no-force-ocr",
            "-f",
            "json",
            "--filter",
            "identifier-not-found",
        ]);
        match cli.command {
            Commands::Run { root, no_force_ocr, destructive, output, format, filter } => {
                assert_eq!(root, PathBuf::from("/data/root"));
                assert!(no_force_ocr);
                assert!(destructive);
                assert!(output.is_none());
                assert_eq!(format, ExportFormat::Json);
                assert_eq!(filter, ResultFilter::IdentifierNotFound);
            }
            _ => panic!("run subcommand expected"),
        }
    }
}
