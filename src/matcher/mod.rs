//! 証明書PDF照合モジュール
//!
//! 検査表の1行に対し、証明書フォルダのファイル名から最適なPDFを1つ選ぶ。
//! ルールは設定順に試し、候補が出た最初のルールを採用する。
//! 同じルール内では短いファイル名、次に辞書順を優先する。

use fai_coc_common::normalize::{compact_key, match_key};
use fai_coc_common::{IdentifierRecord, MatchCandidate, MatchRule};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct CandidateMatcher {
    rules: Vec<MatchRule>,
}

impl Default for CandidateMatcher {
    fn default() -> Self {
        Self::new(MatchRule::default_rules())
    }
}

impl CandidateMatcher {
    pub fn new(rules: Vec<MatchRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[MatchRule] {
        &self.rules
    }

    /// 1行分の照合
    ///
    /// 見つからない場合も正常な結果（document = None）として返す。
    pub fn match_record(&self, record: &IdentifierRecord, documents: &[PathBuf]) -> MatchCandidate {
        let pdfs: Vec<&PathBuf> = documents.iter().filter(|p| is_pdf(p)).collect();

        for rule in &self.rules {
            let best = pdfs
                .iter()
                .filter(|p| rule_matches(*rule, record, &file_name(p)))
                .min_by(|a, b| {
                    let (a, b) = (file_name(a), file_name(b));
                    a.chars().count().cmp(&b.chars().count()).then_with(|| a.cmp(&b))
                });

            if let Some(document) = best {
                tracing::debug!(
                    row = record.row_index,
                    rule = %rule,
                    document = %document.display(),
                    "PDFを照合"
                );
                return MatchCandidate {
                    record: record.clone(),
                    document: Some((*document).clone()),
                    rule: Some(*rule),
                };
            }
        }

        MatchCandidate::unmatched(record.clone())
    }
}

/// ルール単体の判定
pub fn rule_matches(rule: MatchRule, record: &IdentifierRecord, file_name: &str) -> bool {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let contains = |id: &str| !id.is_empty() && match_key(&stem).contains(&match_key(id));
    let contains_compact = |id: &str| {
        let key = compact_key(id);
        !key.is_empty() && compact_key(&stem).contains(&key)
    };

    match rule {
        MatchRule::PrimaryExact => contains(&record.primary_id),
        MatchRule::AlternateExact => contains(&record.alternate_id),
        MatchRule::Normalized => record.identifiers().any(contains_compact),
        MatchRule::BothIdentifiers => {
            contains_compact(&record.primary_id) && contains_compact(&record.alternate_id)
        }
        MatchRule::StrictPrefix => {
            !record.primary_id.is_empty()
                && !record.alternate_id.is_empty()
                && match_key(file_name)
                    .starts_with(&match_key(&format!("{}_{}_", record.primary_id, record.alternate_id)))
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case("pdf"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(primary: &str, alternate: &str) -> IdentifierRecord {
        IdentifierRecord {
            spreadsheet: PathBuf::from("FAI 1/sheet.xlsx"),
            sheet: "Sheet1".to_string(),
            row_index: 2,
            primary_id: primary.to_string(),
            alternate_id: alternate.to_string(),
            part_number: "PN-1".to_string(),
            metadata: vec![],
        }
    }

    fn docs(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| PathBuf::from("coc").join(n)).collect()
    }

    fn matched_name(candidate: &MatchCandidate) -> Option<String> {
        candidate.document.as_deref().map(file_name)
    }

    #[test]
    fn test_primary_before_alternate() {
        let matcher = CandidateMatcher::default();
        let documents = docs(&["763360_cert.pdf", "139-3040_cert.pdf"]);
        let candidate = matcher.match_record(&record("139-3040", "763360"), &documents);

        assert_eq!(matched_name(&candidate).as_deref(), Some("139-3040_cert.pdf"));
        assert_eq!(candidate.rule, Some(MatchRule::PrimaryExact));
    }

    #[test]
    fn test_alternate_when_primary_missing() {
        let matcher = CandidateMatcher::default();
        let candidate = matcher.match_record(&record("999", "763360"), &docs(&["CoC 763360.PDF"]));
        assert_eq!(candidate.rule, Some(MatchRule::AlternateExact));
    }

    #[test]
    fn test_normalized_rule() {
        let matcher = CandidateMatcher::default();
        let candidate = matcher.match_record(&record("139-3040", ""), &docs(&["1393040 scan.pdf"]));
        assert_eq!(candidate.rule, Some(MatchRule::Normalized));
    }

    #[test]
    fn test_tie_break_shortest_then_lexicographic() {
        let matcher = CandidateMatcher::default();
        let documents = docs(&["139-3040_long_name.pdf", "b_139-3040.pdf", "a_139-3040.pdf"]);
        let candidate = matcher.match_record(&record("139-3040", ""), &documents);
        assert_eq!(matched_name(&candidate).as_deref(), Some("a_139-3040.pdf"));
    }

    #[test]
    fn test_no_false_positive() {
        let matcher = CandidateMatcher::default();
        let candidate =
            matcher.match_record(&record("139-3040", "763360"), &docs(&["139-3041.pdf", "notes.txt"]));
        assert!(!candidate.is_matched());
        assert_eq!(candidate.rule, None);
    }

    #[test]
    fn test_only_pdf_candidates() {
        let matcher = CandidateMatcher::default();
        let candidate = matcher.match_record(&record("139-3040", ""), &docs(&["139-3040.docx"]));
        assert!(!candidate.is_matched());
    }

    #[test]
    fn test_empty_identifiers_never_match() {
        let matcher = CandidateMatcher::default();
        let candidate = matcher.match_record(&record("", ""), &docs(&["anything.pdf"]));
        assert!(!candidate.is_matched());
    }

    #[test]
    fn test_opt_in_rules() {
        let rec = record("139-3040", "763360");
        assert!(rule_matches(MatchRule::BothIdentifiers, &rec, "139 3040 763360.pdf"));
        assert!(!rule_matches(MatchRule::BothIdentifiers, &rec, "139-3040.pdf"));
        assert!(rule_matches(MatchRule::StrictPrefix, &rec, "139-3040_763360_rev2.pdf"));
        assert!(!rule_matches(MatchRule::StrictPrefix, &rec, "x_139-3040_763360_.pdf"));

        let matcher = CandidateMatcher::new(vec![MatchRule::StrictPrefix]);
        let candidate = matcher.match_record(&rec, &docs(&["139-3040.pdf", "139-3040_763360_a.pdf"]));
        assert_eq!(matched_name(&candidate).as_deref(), Some("139-3040_763360_a.pdf"));
    }
}
