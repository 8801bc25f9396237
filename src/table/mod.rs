//! 検査表読み込みモジュール
//!
//! 体裁の揃っていないFAIシートから識別子の表を探し出して行を取り出す。
//!
//! 1. 各行を見出し候補として採点し、最高点の行を見出しとする
//! 2. 見出し以降の行を読み、空行2連続かフッター文言で打ち切る
//!
//! 必須列が欠けた行は `RowResult::Skipped` として返し、ファイル全体は止めない。

mod cell;

pub use cell::cell_text;

use crate::error::{CocError, Result};
use calamine::{open_workbook_auto, Data, Range, Reader, Sheets};
use fai_coc_common::IdentifierRecord;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// 表の終わりを示す文言
const FOOTER_MARKERS: &[&str] = &[
    "does fair contain",
    "fair verified",
    "fair reviewed",
    "customer approval",
    "comments:",
];

/// 1行の抽出結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowResult {
    Record(IdentifierRecord),
    Skipped { row: u32, reason: String },
}

/// 見出し行の列割り当て
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderRoles {
    pub primary: Option<usize>,    // Cablex P/N
    pub alternate: Option<usize>,  // FAIR Identifier
    pub part_number: Option<usize>,
}

impl HeaderRoles {
    /// 見出し行を解析
    pub fn detect(row: &[String]) -> Self {
        let mut roles = HeaderRoles::default();

        for (col, text) in row.iter().enumerate() {
            let lower = text.to_lowercase();
            if lower.is_empty() {
                continue;
            }
            let words: Vec<&str> = lower
                .split(|c: char| !c.is_alphanumeric() && c != '/')
                .filter(|w| !w.is_empty())
                .collect();

            if roles.primary.is_none()
                && lower.contains("cablex")
                && (lower.contains("p/n") || lower.contains("part") || words.contains(&"pn"))
            {
                roles.primary = Some(col);
            } else if roles.alternate.is_none()
                && lower.contains("fair")
                && (lower.contains("identifier") || words.contains(&"id"))
            {
                roles.alternate = Some(col);
            } else if roles.part_number.is_none()
                && (lower.contains("part number") || lower.contains("part no"))
            {
                roles.part_number = Some(col);
            }
        }

        roles
    }

    pub fn score(&self) -> usize {
        [self.primary, self.alternate, self.part_number]
            .iter()
            .filter(|c| c.is_some())
            .count()
    }

    /// 品番列と識別子列の少なくとも一方が揃っている
    pub fn is_usable(&self) -> bool {
        self.part_number.is_some() && (self.primary.is_some() || self.alternate.is_some())
    }

    fn contains(&self, col: usize) -> bool {
        [self.primary, self.alternate, self.part_number].contains(&Some(col))
    }
}

/// 最も見出しらしい行を探す（同点なら先の行）
pub fn find_header(rows: &[Vec<String>]) -> Option<(usize, HeaderRoles)> {
    let mut best: Option<(usize, HeaderRoles)> = None;

    for (idx, row) in rows.iter().enumerate() {
        let roles = HeaderRoles::detect(row);
        if !roles.is_usable() {
            continue;
        }
        if best.as_ref().map_or(true, |(_, b)| roles.score() > b.score()) {
            best = Some((idx, roles));
        }
    }

    best
}

/// 整形済みのシート内容から行を取り出す
///
/// `first_row` は `rows[0]` のExcel行番号（1始まり）。
pub fn extract_rows(
    spreadsheet: &Path,
    sheet: &str,
    first_row: u32,
    rows: &[Vec<String>],
) -> Vec<RowResult> {
    let Some((header_idx, roles)) = find_header(rows) else {
        tracing::debug!(file = %spreadsheet.display(), sheet, "識別子の表が見つかりません");
        return Vec::new();
    };

    let header = &rows[header_idx];
    let cell = |row: &[String], col: Option<usize>| {
        col.and_then(|c| row.get(c)).cloned().unwrap_or_default()
    };

    let mut results = Vec::new();
    let mut empty_streak = 0;

    for (offset, row) in rows.iter().enumerate().skip(header_idx + 1) {
        let row_index = first_row + offset as u32;
        let row_text = row
            .iter()
            .filter(|c| !c.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");

        if row_text.is_empty() {
            empty_streak += 1;
            if empty_streak >= 2 {
                break;
            }
            continue;
        }
        empty_streak = 0;

        let lowered = row_text.to_lowercase();
        if FOOTER_MARKERS.iter().any(|m| lowered.contains(m)) {
            break;
        }

        // ページ区切りなどで繰り返された見出し
        if HeaderRoles::detect(row).is_usable() {
            continue;
        }

        let primary_id = cell(row, roles.primary);
        let alternate_id = cell(row, roles.alternate);
        let part_number = cell(row, roles.part_number);

        if primary_id.is_empty() && alternate_id.is_empty() {
            results.push(RowResult::Skipped {
                row: row_index,
                reason: "識別子（Cablex P/N / FAIR Identifier）が空です".to_string(),
            });
            continue;
        }
        if part_number.is_empty() {
            results.push(RowResult::Skipped {
                row: row_index,
                reason: "Part Number が空です".to_string(),
            });
            continue;
        }

        let metadata = header
            .iter()
            .enumerate()
            .filter(|(col, name)| !name.is_empty() && !roles.contains(*col))
            .filter_map(|(col, name)| {
                let value = row.get(col)?;
                (!value.is_empty()).then(|| (name.clone(), value.clone()))
            })
            .collect();

        results.push(RowResult::Record(IdentifierRecord {
            spreadsheet: spreadsheet.to_path_buf(),
            sheet: sheet.to_string(),
            row_index,
            primary_id,
            alternate_id,
            part_number,
            metadata,
        }));
    }

    results
}

fn range_to_rows(range: &Range<Data>) -> (u32, Vec<Vec<String>>) {
    let first_row = range.start().map(|(row, _)| row + 1).unwrap_or(1);
    let first_col = range.start().map(|(_, col)| col as usize).unwrap_or(0);

    let rows = range
        .rows()
        .map(|row| {
            // 列番号を絶対位置に揃える
            std::iter::repeat(String::new())
                .take(first_col)
                .chain(row.iter().map(cell_text))
                .collect()
        })
        .collect();

    (first_row, rows)
}

/// スプレッドシート1ファイル分の遅延イテレータ
///
/// シートを1枚ずつ読み込む。再度読み直したい場合は `open_spreadsheet` をやり直す。
pub struct SpreadsheetRows {
    path: PathBuf,
    workbook: Sheets<BufReader<File>>,
    sheet_names: std::vec::IntoIter<String>,
    pending: std::vec::IntoIter<RowResult>,
}

impl Iterator for SpreadsheetRows {
    type Item = RowResult;

    fn next(&mut self) -> Option<RowResult> {
        loop {
            if let Some(result) = self.pending.next() {
                return Some(result);
            }

            let sheet = self.sheet_names.next()?;
            match self.workbook.worksheet_range(&sheet) {
                Ok(range) => {
                    let (first_row, rows) = range_to_rows(&range);
                    self.pending = extract_rows(&self.path, &sheet, first_row, &rows).into_iter();
                }
                Err(e) => {
                    tracing::warn!(file = %self.path.display(), sheet = %sheet, "シート読み込みエラー: {}", e);
                }
            }
        }
    }
}

pub fn open_spreadsheet(path: &Path) -> Result<SpreadsheetRows> {
    let workbook = open_workbook_auto(path)
        .map_err(|e| CocError::Spreadsheet(format!("{}: {}", path.display(), e)))?;
    let sheet_names = workbook.sheet_names().into_iter();

    Ok(SpreadsheetRows {
        path: path.to_path_buf(),
        workbook,
        sheet_names,
        pending: Vec::new().into_iter(),
    })
}

/// 全行を読み込み、スキップした行はログに出す
pub fn read_records(path: &Path) -> Result<Vec<IdentifierRecord>> {
    let mut records = Vec::new();

    for result in open_spreadsheet(path)? {
        match result {
            RowResult::Record(record) => records.push(record),
            RowResult::Skipped { row, reason } => {
                tracing::warn!(file = %path.display(), row, "行をスキップ: {}", reason);
            }
        }
    }

    Ok(records)
}
