//! 結果集約モジュール
//!
//! OutcomeRecordを追記専用ログとして保持し、フィルタ表示と
//! フラットなエクスポート行を提供する。
//! 追記はジョブ完了順だが、表示とエクスポートは発見順（sequence）に並べる。

use crate::types::{OutcomeRecord, OutcomeStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 結果フィルタ
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResultFilter {
    #[default]
    All,
    DocumentFound,
    DocumentNotFound,
    /// PDFはあるが品番が見つからない
    IdentifierNotFound,
    IdentifierFound,
}

impl ResultFilter {
    pub fn matches(&self, outcome: &OutcomeRecord) -> bool {
        match self {
            ResultFilter::All => true,
            ResultFilter::DocumentFound => outcome.document_found(),
            ResultFilter::DocumentNotFound => !outcome.document_found(),
            ResultFilter::IdentifierNotFound => {
                outcome.document_found() && !outcome.identifier_found
            }
            ResultFilter::IdentifierFound => outcome.identifier_found,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ResultFilter::All => "All",
            ResultFilter::DocumentFound => "Document Found",
            ResultFilter::DocumentNotFound => "Document Not Found",
            ResultFilter::IdentifierNotFound => "Identifier Not Found",
            ResultFilter::IdentifierFound => "Identifier Found",
        }
    }
}

impl fmt::Display for ResultFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ResultFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(|c| c.to_lowercase())
            .collect();
        match key.as_str() {
            "all" => Ok(ResultFilter::All),
            "documentfound" | "pdffound" => Ok(ResultFilter::DocumentFound),
            "documentnotfound" | "pdfnotfound" => Ok(ResultFilter::DocumentNotFound),
            "identifiernotfound" | "partnumbernotfound" => Ok(ResultFilter::IdentifierNotFound),
            "identifierfound" | "partnumberfound" => Ok(ResultFilter::IdentifierFound),
            _ => Err(format!("Unknown filter: {}", s)),
        }
    }
}

/// 集計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total: usize,
    pub documents_found: usize,
    pub identifiers_found: usize,
    pub errors: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total entries: {} | Documents found: {}/{} | Part numbers highlighted: {}/{}",
            self.total, self.documents_found, self.total, self.identifiers_found, self.documents_found
        )?;
        if self.errors > 0 {
            write!(f, " | Errors: {}", self.errors)?;
        }
        Ok(())
    }
}

/// 追記専用の結果ログ
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultSet {
    records: Vec<OutcomeRecord>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 結果を追記
    pub fn push(&mut self, outcome: OutcomeRecord) {
        self.records.push(outcome);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 追記順の全件
    pub fn records(&self) -> &[OutcomeRecord] {
        &self.records
    }

    /// フィルタ適用（発見順）
    pub fn filtered(&self, filter: ResultFilter) -> impl Iterator<Item = &OutcomeRecord> {
        let mut records: Vec<&OutcomeRecord> =
            self.records.iter().filter(|r| filter.matches(r)).collect();
        records.sort_by_key(|r| r.sequence);
        records.into_iter()
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            total: self.records.len(),
            ..Default::default()
        };
        for record in &self.records {
            if record.document_found() {
                summary.documents_found += 1;
            }
            if record.identifier_found {
                summary.identifiers_found += 1;
            }
            if record.status() == OutcomeStatus::Error {
                summary.errors += 1;
            }
        }
        summary
    }

    /// エクスポート行（発見順）
    pub fn export_rows(&self, filter: ResultFilter) -> Vec<ExportRow> {
        self.filtered(filter).map(ExportRow::from_outcome).collect()
    }
}

/// エクスポート列見出し
pub const EXPORT_HEADERS: [&str; 15] = [
    "Spreadsheet",
    "Row",
    "Primary Identifier",
    "Alternate Identifier",
    "Matched Document",
    "Document Found",
    "Identifier Found",
    "Output Document",
    "Error",
    "Sheet",
    "Part Number",
    "Match Rule",
    "Status",
    "Timestamp",
    "Metadata",
];

/// フラットなエクスポート行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    pub values: [String; 15],
}

impl ExportRow {
    pub fn from_outcome(outcome: &OutcomeRecord) -> Self {
        let record = &outcome.record;
        let path_or_empty = |p: &Option<std::path::PathBuf>| {
            p.as_ref().map(|p| p.display().to_string()).unwrap_or_default()
        };
        let yes_no = |b: bool| if b { "Yes" } else { "No" }.to_string();
        let metadata = record
            .metadata
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("; ");

        Self {
            values: [
                record.spreadsheet.display().to_string(),
                record.row_index.to_string(),
                record.primary_id.clone(),
                record.alternate_id.clone(),
                path_or_empty(&outcome.document),
                yes_no(outcome.document_found()),
                yes_no(outcome.identifier_found),
                path_or_empty(&outcome.output_document),
                outcome.error.clone().unwrap_or_default(),
                record.sheet.clone(),
                record.part_number.clone(),
                outcome.rule.map(|r| r.to_string()).unwrap_or_default(),
                outcome.status().label().to_string(),
                outcome.timestamp.clone(),
                metadata,
            ],
        }
    }
}
