//! 注釈ジョブ
//!
//! 1行分の処理（認識 → 検索 → ハイライト）をワーカー上で同期的に実行する。

use super::cancel::CancelToken;
use super::registry::DocumentRegistry;
use crate::annotator::{AnnotationReport, Annotator};
use crate::error::DocumentError;
use fai_coc_common::{JobState, MatchCandidate, OutcomeRecord};
use std::sync::Arc;

/// 1行に対する注釈ジョブ
#[derive(Debug, Clone)]
pub struct AnnotationJob {
    pub id: usize,
    /// 所属するスプレッドシートの番号
    pub file_index: usize,
    pub candidate: MatchCandidate,
    pub state: JobState,
}

impl AnnotationJob {
    pub fn new(id: usize, file_index: usize, candidate: MatchCandidate) -> Self {
        Self {
            id,
            file_index,
            candidate,
            state: JobState::Pending,
        }
    }
}

/// ワーカーからオーケストレーターへのメッセージ
#[derive(Debug)]
pub enum WorkerMessage {
    State {
        job_id: usize,
        state: JobState,
    },
    Finished {
        job_id: usize,
        state: JobState,
        outcome: Option<OutcomeRecord>,
    },
}

/// ワーカー間で共有する実行環境
pub struct JobContext {
    pub annotator: Arc<Annotator>,
    pub registry: Arc<DocumentRegistry>,
    pub cancel: CancelToken,
}

/// ジョブを実行し、終端状態と結果を返す
///
/// 中断された場合は結果を返さない。`report` には途中の状態遷移を通知する。
pub fn execute(
    candidate: &MatchCandidate,
    ctx: &JobContext,
    report: &dyn Fn(JobState),
) -> (JobState, Option<OutcomeRecord>) {
    if ctx.cancel.is_cancelled() {
        return (JobState::Cancelled, None);
    }

    let Some(source) = candidate.document.as_deref() else {
        return (JobState::Done, Some(outcome(candidate, None, None)));
    };

    // 同じ文書を扱うジョブは順番待ち
    let slot = ctx.registry.slot(source);
    let mut slot = slot.lock().unwrap_or_else(|e| e.into_inner());

    if ctx.cancel.is_cancelled() {
        return (JobState::Cancelled, None);
    }
    report(JobState::Recognizing);
    let input = slot.written.clone().unwrap_or_else(|| source.to_path_buf());
    let prepared = match ctx.annotator.prepare(&input) {
        Ok(prepared) => prepared,
        Err(e) => return failed(candidate, e),
    };
    if !prepared.index.failures.is_empty() {
        tracing::warn!(
            file = %source.display(),
            pages = ?prepared.index.failures.iter().map(|f| f.page).collect::<Vec<_>>(),
            "一部のページを認識できませんでした"
        );
    }

    if ctx.cancel.is_cancelled() {
        return (JobState::Cancelled, None);
    }
    report(JobState::Searching);
    let part_number = candidate.record.part_number.as_str();
    let occurrences = ctx.annotator.search(&prepared, part_number);

    if ctx.cancel.is_cancelled() {
        return (JobState::Cancelled, None);
    }
    // ここから先は書き出し完了まで中断しない
    report(JobState::Highlighting);
    match ctx.annotator.write(source, prepared, &occurrences, part_number, slot.text_layer) {
        Ok(result) => {
            if let Some(output) = &result.output {
                slot.written = Some(output.clone());
            }
            slot.text_layer |= result.text_layer_embedded;
            (JobState::Done, Some(outcome(candidate, Some(&result), None)))
        }
        Err(e) => failed(candidate, e),
    }
}

fn failed(candidate: &MatchCandidate, error: DocumentError) -> (JobState, Option<OutcomeRecord>) {
    tracing::warn!(
        spreadsheet = %candidate.record.spreadsheet.display(),
        row = candidate.record.row_index,
        error = %error,
        "ジョブが失敗しました"
    );
    (JobState::Failed, Some(outcome(candidate, None, Some(error.to_string()))))
}

/// 結果レコードを組み立てる（sequenceはオーケストレーターが追記時に付ける）
pub(crate) fn outcome(
    candidate: &MatchCandidate,
    report: Option<&AnnotationReport>,
    error: Option<String>,
) -> OutcomeRecord {
    OutcomeRecord {
        sequence: 0,
        record: candidate.record.clone(),
        document: candidate.document.clone(),
        rule: candidate.rule,
        identifier_found: report.is_some_and(|r| r.identifier_found),
        highlight_count: report.map_or(0, |r| r.highlight_count),
        output_document: report.and_then(|r| r.output.clone()),
        failed_pages: report.map(|r| r.failed_pages.clone()).unwrap_or_default(),
        timestamp: chrono::Local::now().to_rfc3339(),
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fai_coc_common::IdentifierRecord;
    use std::path::PathBuf;

    fn candidate(document: Option<&str>) -> MatchCandidate {
        MatchCandidate {
            record: IdentifierRecord {
                spreadsheet: PathBuf::from("FAI 1/sheet.xlsx"),
                sheet: "Sheet1".into(),
                row_index: 3,
                primary_id: "CX-1".into(),
                alternate_id: String::new(),
                part_number: "PN-1".into(),
                metadata: Vec::new(),
            },
            document: document.map(PathBuf::from),
            rule: None,
        }
    }

    #[test]
    fn test_outcome_without_report() {
        let record = outcome(&candidate(None), None, None);
        assert!(!record.document_found());
        assert!(!record.identifier_found);
        assert_eq!(record.highlight_count, 0);
        assert!(record.output_document.is_none());
        assert!(chrono::DateTime::parse_from_rfc3339(&record.timestamp).is_ok());
    }

    #[test]
    fn test_outcome_with_report() {
        let report = AnnotationReport {
            identifier_found: true,
            highlight_count: 2,
            output: Some(PathBuf::from("out/highlighted_a.pdf")),
            failed_pages: vec![2],
            ..Default::default()
        };
        let record = outcome(&candidate(Some("coc/a.pdf")), Some(&report), None);
        assert!(record.identifier_found);
        assert_eq!(record.highlight_count, 2);
        assert_eq!(record.output_document, Some(PathBuf::from("out/highlighted_a.pdf")));
        assert_eq!(record.failed_pages, vec![2]);
        assert!(record.error.is_none());
    }
}
