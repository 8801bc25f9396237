use std::path::PathBuf;
use thiserror::Error;

/// 実行全体を中断するエラー
///
/// 行・文書単位の失敗はここに含めず、OutcomeRecord.error として結果に残す。
#[derive(Error, Debug)]
pub enum CocError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ルートフォルダが見つかりません: {0}")]
    RootNotFound(String),

    #[error("ルートパスがフォルダではありません: {0}")]
    RootNotDirectory(String),

    #[error("スプレッドシート読み込みエラー: {0}")]
    Spreadsheet(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] fai_coc_common::Error),
}

pub type Result<T> = std::result::Result<T, CocError>;

/// 文書単位のエラー（ジョブはFailedになり、実行は続行）
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("PDFが暗号化されています: {0}")]
    Encrypted(PathBuf),

    #[error("PDFを読み込めません: {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("全ページの文字認識に失敗しました: {0}")]
    RecognitionFailed(PathBuf),

    #[error("PDFの書き出しに失敗しました: {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),
}

/// 外部プログラム（pdftotext / pdftoppm / tesseract）のエラー
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{program} が見つかりません。poppler-utils / tesseract をインストールしてください")]
    NotFound { program: String },

    #[error("{program} が終了コード {code} で失敗しました: {stderr}")]
    Failed {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("出力解析エラー: {0}")]
    Parse(String),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),
}
