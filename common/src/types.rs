//! 照合パイプラインの型定義
//!
//! 各ステージで共有される型:
//! - IdentifierRecord: 検査表（FAIシート）から抽出した1行
//! - MatchCandidate: 行と証明書PDFの対応付け
//! - JobState: 注釈ジョブの状態
//! - OutcomeRecord: 1ジョブの最終結果（追記後は不変）

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// 検査表の1行
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierRecord {
    /// 抽出元のスプレッドシート
    pub spreadsheet: PathBuf,

    /// シート名
    #[serde(default)]
    pub sheet: String,

    /// Excel上の行番号（1始まり）
    pub row_index: u32,

    pub primary_id: String,       // Cablex P/N

    #[serde(default)]
    pub alternate_id: String,     // FAIR Identifier

    pub part_number: String,      // 証明書内で検索する品番

    /// その他の列（エクスポート用にそのまま保持）
    #[serde(default)]
    pub metadata: Vec<(String, String)>,
}

impl IdentifierRecord {
    /// 照合に使える識別子（空は除外）
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        [self.primary_id.as_str(), self.alternate_id.as_str()]
            .into_iter()
            .filter(|s| !s.is_empty())
    }
}

/// ファイル名照合ルール
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchRule {
    /// 主識別子の部分一致
    PrimaryExact,
    /// 副識別子の部分一致
    AlternateExact,
    /// 記号・空白を除去した部分一致（どちらかの識別子）
    Normalized,
    /// 両方の識別子を含む
    BothIdentifiers,
    /// `{主}_{副}_` で始まる
    StrictPrefix,
}

impl MatchRule {
    /// 既定の優先順位
    pub fn default_rules() -> Vec<MatchRule> {
        vec![MatchRule::PrimaryExact, MatchRule::AlternateExact, MatchRule::Normalized]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchRule::PrimaryExact => "primary-exact",
            MatchRule::AlternateExact => "alternate-exact",
            MatchRule::Normalized => "normalized",
            MatchRule::BothIdentifiers => "both-identifiers",
            MatchRule::StrictPrefix => "strict-prefix",
        }
    }
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "primary-exact" | "primary" => Ok(MatchRule::PrimaryExact),
            "alternate-exact" | "alternate" => Ok(MatchRule::AlternateExact),
            "normalized" => Ok(MatchRule::Normalized),
            "both-identifiers" | "both" => Ok(MatchRule::BothIdentifiers),
            "strict-prefix" | "strict" => Ok(MatchRule::StrictPrefix),
            _ => Err(format!("Unknown match rule: {}", s)),
        }
    }
}

/// 行と証明書PDFの対応付け
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchCandidate {
    pub record: IdentifierRecord,
    /// 対応するPDF（見つからなければNone）
    pub document: Option<PathBuf>,
    /// 採用されたルール
    pub rule: Option<MatchRule>,
}

impl MatchCandidate {
    pub fn unmatched(record: IdentifierRecord) -> Self {
        Self { record, document: None, rule: None }
    }

    pub fn is_matched(&self) -> bool {
        self.document.is_some()
    }
}

/// 注釈ジョブの状態
///
/// Pending → Recognizing → Searching → Highlighting → {Done | Failed | Cancelled}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobState {
    Pending,
    Recognizing,
    Searching,
    Highlighting,
    Done,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed | JobState::Cancelled)
    }

    /// ワーカー枠を占有している状態か
    pub fn is_active(&self) -> bool {
        matches!(self, JobState::Recognizing | JobState::Searching | JobState::Highlighting)
    }
}

/// 出力モード
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputMode {
    /// 別フォルダに書き出し（元ファイルは変更しない）
    #[default]
    Safe,
    /// 元ファイルを上書き（バックアップなし）
    Destructive,
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::Safe => write!(f, "safe"),
            OutputMode::Destructive => write!(f, "destructive"),
        }
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "safe" | "separate" => Ok(OutputMode::Safe),
            "destructive" | "in-place" => Ok(OutputMode::Destructive),
            _ => Err(format!("Unknown output mode: {}. Use safe or destructive", s)),
        }
    }
}

/// 結果区分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutcomeStatus {
    DocumentNotFound,
    IdentifierFound,
    IdentifierNotFound,
    Error,
}

impl OutcomeStatus {
    pub fn label(&self) -> &'static str {
        match self {
            OutcomeStatus::DocumentNotFound => "document not found",
            OutcomeStatus::IdentifierFound => "identifier found",
            OutcomeStatus::IdentifierNotFound => "identifier not found",
            OutcomeStatus::Error => "error",
        }
    }
}

/// 1ジョブの最終結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeRecord {
    /// 発見順の通し番号（ジョブ番号）
    #[serde(default)]
    pub sequence: usize,

    pub record: IdentifierRecord,

    /// 照合されたPDF
    #[serde(default)]
    pub document: Option<PathBuf>,

    #[serde(default)]
    pub rule: Option<MatchRule>,

    /// 品番がPDF内で見つかったか
    #[serde(default)]
    pub identifier_found: bool,

    /// ハイライト数
    #[serde(default)]
    pub highlight_count: usize,

    /// 書き出したPDF
    #[serde(default)]
    pub output_document: Option<PathBuf>,

    /// 文字認識に失敗したページ
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_pages: Vec<u32>,

    /// 記録時刻（RFC3339）
    #[serde(default)]
    pub timestamp: String,

    #[serde(default)]
    pub error: Option<String>,
}

impl OutcomeRecord {
    pub fn document_found(&self) -> bool {
        self.document.is_some()
    }

    pub fn status(&self) -> OutcomeStatus {
        if self.document.is_none() {
            OutcomeStatus::DocumentNotFound
        } else if self.error.is_some() {
            OutcomeStatus::Error
        } else if self.identifier_found {
            OutcomeStatus::IdentifierFound
        } else {
            OutcomeStatus::IdentifierNotFound
        }
    }
}
