//! CSV生成（共通ライブラリ）
//!
//! 結果エクスポート行をRFC 4180形式のテキストに変換する。

use crate::results::{ExportRow, EXPORT_HEADERS};

/// CSVテキストを生成（見出し行つき、改行はCRLF）
pub fn generate_csv(rows: &[ExportRow]) -> String {
    let mut out = String::new();
    push_line(&mut out, EXPORT_HEADERS.iter().copied());
    for row in rows {
        push_line(&mut out, row.values.iter().map(String::as_str));
    }
    out
}

fn push_line<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    let line = fields.map(escape_field).collect::<Vec<_>>().join(",");
    out.push_str(&line);
    out.push_str("\r\n");
}

/// 区切り文字・引用符・改行を含むフィールドを引用符で囲む
fn escape_field(field: &str) -> String {
    if field.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
