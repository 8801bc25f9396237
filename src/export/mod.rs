//! 結果ファイルの書き出し
//!
//! CSV・xlsx・JSON の本体は共通ライブラリで生成し、ここではファイルへの書き込みだけを行う。

use crate::cli::ExportFormat;
use crate::error::Result;
use fai_coc_common::export::{csv_core, excel_core, json_core};
use fai_coc_common::{OutcomeRecord, ResultFilter, ResultSet};
use std::path::{Path, PathBuf};

/// 結果ファイルの既定名（拡張子なし）
pub const RESULTS_FILE_STEM: &str = "fai_coc_results";

const SHEET_NAME: &str = "Results";

/// 出力先から形式に合ったファイルパスを決める
///
/// ディレクトリ（または拡張子なし）ならその中に既定名で、ファイルなら拡張子だけ差し替える。
pub fn output_path_for_format(output: &Path, extension: &str) -> PathBuf {
    if output.is_dir() || output.extension().is_none() {
        output.join(format!("{}.{}", RESULTS_FILE_STEM, extension))
    } else {
        output.with_extension(extension)
    }
}

/// 結果を書き出し、書いたファイルを返す
pub fn export_results(
    results: &ResultSet,
    filter: ResultFilter,
    format: ExportFormat,
    output: &Path,
) -> Result<Vec<PathBuf>> {
    let formats: &[ExportFormat] = match format {
        ExportFormat::All => &[ExportFormat::Csv, ExportFormat::Excel, ExportFormat::Json],
        _ => std::slice::from_ref(&format),
    };

    let mut written = Vec::new();
    for format in formats {
        let path = output_path_for_format(output, format.extension());
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        match format {
            ExportFormat::Csv => write_csv(results, filter, &path)?,
            ExportFormat::Excel => write_excel(results, filter, &path)?,
            ExportFormat::Json => write_json(results, filter, &path)?,
            ExportFormat::All => continue,
        }
        tracing::info!(path = %path.display(), format = %format, "結果を書き出しました");
        written.push(path);
    }
    Ok(written)
}

pub fn write_csv(results: &ResultSet, filter: ResultFilter, path: &Path) -> Result<()> {
    let text = csv_core::generate_csv(&results.export_rows(filter));
    std::fs::write(path, text)?;
    Ok(())
}

pub fn write_excel(results: &ResultSet, filter: ResultFilter, path: &Path) -> Result<()> {
    let buffer = excel_core::generate_excel_buffer(&results.export_rows(filter), SHEET_NAME)?;
    std::fs::write(path, buffer)?;
    Ok(())
}

pub fn write_json(results: &ResultSet, filter: ResultFilter, path: &Path) -> Result<()> {
    let records: Vec<&OutcomeRecord> = results.filtered(filter).collect();
    let json = json_core::generate_json(&records)?;
    std::fs::write(path, json)?;
    Ok(())
}
