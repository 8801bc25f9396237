//! Excel生成（共通ライブラリ）
//!
//! 結果エクスポート行を1シートの一覧表としてxlsxバッファに書き出す。

use crate::error::{Error, Result};
use crate::results::{ExportRow, EXPORT_HEADERS};
use rust_xlsxwriter::*;

/// 列幅（文字数）
const COLUMN_WIDTHS: [f64; 15] = [
    40.0, 6.0, 18.0, 18.0, 40.0, 10.0, 10.0, 40.0, 30.0, 14.0, 22.0, 16.0, 20.0, 26.0, 30.0,
];

/// Excelをバッファに生成
///
/// # Arguments
/// * `rows` - エクスポート行（追記順）
/// * `sheet_name` - シート名
pub fn generate_excel_buffer(rows: &[ExportRow], sheet_name: &str) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();

    let header_format = Format::new()
        .set_bold()
        .set_font_color(Color::RGB(0x333333))
        .set_background_color(Color::RGB(0xF5F5F5))
        .set_border(FormatBorder::Hair)
        .set_border_color(Color::RGB(0xAAAAAA));

    let found_format = Format::new().set_background_color(Color::RGB(0xFFF59D));

    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(sheet_name)
        .map_err(|e| Error::Export(format!("シート名設定エラー: {}", e)))?;

    for (col, (header, width)) in EXPORT_HEADERS.iter().zip(COLUMN_WIDTHS).enumerate() {
        let col = col as u16;
        worksheet
            .write_string_with_format(0, col, *header, &header_format)
            .map_err(|e| Error::Export(format!("見出し書き込みエラー: {}", e)))?;
        worksheet
            .set_column_width(col, width)
            .map_err(|e| Error::Export(format!("列幅設定エラー: {}", e)))?;
    }

    for (idx, row) in rows.iter().enumerate() {
        let excel_row = idx as u32 + 1;
        // 「Identifier Found」列がYesの行は黄色で強調
        let highlighted = row.values[6] == "Yes";
        for (col, value) in row.values.iter().enumerate() {
            let col = col as u16;
            let written = if highlighted {
                worksheet.write_string_with_format(excel_row, col, value, &found_format)
            } else {
                worksheet.write_string(excel_row, col, value)
            };
            written.map_err(|e| Error::Export(format!("値書き込みエラー: {}", e)))?;
        }
    }

    let last_row = rows.len() as u32;
    worksheet
        .autofilter(0, 0, last_row, (EXPORT_HEADERS.len() - 1) as u16)
        .map_err(|e| Error::Export(format!("フィルタ設定エラー: {}", e)))?;
    worksheet
        .set_freeze_panes(1, 0)
        .map_err(|e| Error::Export(format!("ウィンドウ枠固定エラー: {}", e)))?;

    workbook
        .save_to_buffer()
        .map_err(|e| Error::Export(format!("Excel保存エラー: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_excel_buffer_is_zip() {
        let mut values: [String; 15] = Default::default();
        values[6] = "Yes".to_string();
        let buffer = generate_excel_buffer(&[ExportRow { values }], "Results").unwrap();
        // xlsxはZIPコンテナ
        assert_eq!(&buffer[..2], b"PK");
    }

    #[test]
    fn test_generate_excel_buffer_rejects_bad_sheet_name() {
        let result = generate_excel_buffer(&[], "bad/name");
        assert!(matches!(result, Err(Error::Export(_))));
    }
}
