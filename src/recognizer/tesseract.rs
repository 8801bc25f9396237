//! tesseract 連携
//!
//! `tesseract <画像> stdout -l <言語> tsv` のTSV出力から単語と位置を取り出す。

use super::types::{Rect, RenderedPage, WordBox};
use super::{run_program, RecognitionEngine};
use crate::error::EngineError;
use std::ffi::OsStr;

/// TSVの単語レベル
const WORD_LEVEL: &str = "5";

pub struct Tesseract {
    program: String,
    language: String,
}

impl Tesseract {
    pub fn new(program: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            language: language.into(),
        }
    }
}

impl RecognitionEngine for Tesseract {
    fn recognize(&self, page: &RenderedPage) -> Result<Vec<WordBox>, EngineError> {
        let stdout = run_program(
            &self.program,
            &[
                page.image.as_os_str(),
                OsStr::new("stdout"),
                OsStr::new("-l"),
                OsStr::new(&self.language),
                OsStr::new("tsv"),
            ],
        )?;
        parse_tsv(&String::from_utf8_lossy(&stdout))
    }
}

/// TSV出力を解析（座標は画像ピクセル）
///
/// 列: level page_num block_num par_num line_num word_num left top width height conf text
pub fn parse_tsv(tsv: &str) -> Result<Vec<WordBox>, EngineError> {
    let mut lines = tsv.lines();
    match lines.next() {
        Some(header) if header.starts_with("level") => {}
        Some(other) => {
            return Err(EngineError::Parse(format!("TSVヘッダーが不正です: {}", other)));
        }
        None => return Ok(Vec::new()),
    }

    let mut words = Vec::new();

    for line in lines {
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 12 || cols[0] != WORD_LEVEL {
            continue;
        }

        let text = cols[11..].join("\t").trim().to_string();
        if text.is_empty() {
            continue;
        }

        let number = |i: usize| {
            cols[i]
                .trim()
                .parse::<f64>()
                .map_err(|e| EngineError::Parse(format!("{}: {}", cols[i], e)))
        };
        let (left, top, width, height) = (number(6)?, number(7)?, number(8)?, number(9)?);
        let confidence = cols[10]
            .trim()
            .parse::<f32>()
            .ok()
            .filter(|c| *c >= 0.0);

        words.push(WordBox {
            text,
            rect: Rect::new(left, top, left + width, top + height),
            confidence,
        });
    }

    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TSV: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t1700\t2200\t-1\t
4\t1\t1\t1\t1\t0\t100\t200\t600\t40\t-1\t
5\t1\t1\t1\t1\t1\t100\t200\t120\t40\t96.5\tPart
5\t1\t1\t1\t1\t2\t230\t200\t300\t40\t91\t560R844H32
5\t1\t1\t1\t1\t3\t540\t200\t10\t40\t95\t
";

    #[test]
    fn test_parse_tsv_words_only() {
        let words = parse_tsv(TSV).unwrap();
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].text, "Part");
        assert_eq!(words[0].confidence, Some(96.5));
        assert_eq!(words[1].rect, Rect::new(230.0, 200.0, 530.0, 240.0));
    }

    #[test]
    fn test_parse_tsv_rejects_garbage() {
        assert!(matches!(parse_tsv("Error opening data file"), Err(EngineError::Parse(_))));
        assert!(parse_tsv("").unwrap().is_empty());
    }

    #[test]
    fn test_negative_confidence_is_none() {
        let tsv = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
5\t1\t1\t1\t1\t1\t1\t2\t3\t4\t-1\tX";
        let words = parse_tsv(tsv).unwrap();
        assert_eq!(words[0].confidence, None);
    }
}
