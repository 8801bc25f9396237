use calamine::Data;
use fai_coc_common::normalize::clean_text;

/// セル値を文字列化して整形
///
/// 整数値の浮動小数点は小数部を付けない（`763360.0` → `763360`）。
/// エラーセルは空扱い。
pub fn cell_text(cell: &Data) -> String {
    let raw = match cell {
        Data::Empty | Data::Error(_) => return String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => format_float(*f),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    };
    clean_text(&raw)
}

fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
