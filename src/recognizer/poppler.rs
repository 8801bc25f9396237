//! poppler-utils 連携（pdftotext / pdftoppm）

use super::types::{PageWords, Rect, RenderedPage, WordBox};
use super::{run_program, PageRenderer, TextLayerSource};
use crate::error::EngineError;
use std::ffi::OsStr;
use std::path::Path;

/// `pdftotext -bbox` によるテキストレイヤー抽出
pub struct Pdftotext {
    program: String,
}

impl Pdftotext {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }
}

impl TextLayerSource for Pdftotext {
    fn extract_words(&self, pdf: &Path) -> Result<Vec<PageWords>, EngineError> {
        let stdout = run_program(
            &self.program,
            &[OsStr::new("-bbox"), pdf.as_os_str(), OsStr::new("-")],
        )?;
        Ok(parse_bbox_words(&String::from_utf8_lossy(&stdout)))
    }

    fn name(&self) -> &str {
        "pdftotext"
    }
}

/// `pdftotext -bbox` のXHTML出力を解析
///
/// ページは出現順に1から番号を振る。
pub fn parse_bbox_words(xml: &str) -> Vec<PageWords> {
    let mut pages = Vec::new();
    let mut current: Option<PageWords> = None;

    for raw in xml.lines() {
        let line = raw.trim();

        if line.starts_with("<page ") {
            if let Some(page) = current.take() {
                pages.push(page);
            }
            current = Some(PageWords {
                page: pages.len() as u32 + 1,
                width: parse_attr_f64(line, "width").unwrap_or(0.0),
                height: parse_attr_f64(line, "height").unwrap_or(0.0),
                words: Vec::new(),
            });
            continue;
        }

        if line.starts_with("<word ") {
            let Some(page) = current.as_mut() else { continue };
            let (Some(text), Some(rect)) = (parse_word_text(line), parse_word_rect(line)) else {
                continue;
            };
            let text = decode_xml_entities(&text).trim().to_string();
            if !text.is_empty() {
                page.words.push(WordBox { text, rect, confidence: None });
            }
            continue;
        }

        if line.starts_with("</page>") {
            if let Some(page) = current.take() {
                pages.push(page);
            }
        }
    }

    if let Some(page) = current.take() {
        pages.push(page);
    }

    pages
}

fn parse_attr<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!(" {}=\"", name);
    let start = tag.find(&needle)? + needle.len();
    let rest = &tag[start..];
    let end = rest.find('"')?;
    Some(&rest[..end])
}

fn parse_attr_f64(tag: &str, name: &str) -> Option<f64> {
    parse_attr(tag, name)?.parse().ok()
}

fn parse_word_rect(tag: &str) -> Option<Rect> {
    Some(Rect::new(
        parse_attr_f64(tag, "xMin")?,
        parse_attr_f64(tag, "yMin")?,
        parse_attr_f64(tag, "xMax")?,
        parse_attr_f64(tag, "yMax")?,
    ))
}

fn parse_word_text(tag: &str) -> Option<String> {
    let start = tag.find('>')? + 1;
    let end = tag.rfind("</word>")?;
    (start <= end).then(|| tag[start..end].to_string())
}

fn decode_xml_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// `pdftoppm` による1ページのラスタライズ
pub struct Pdftoppm {
    program: String,
}

impl Pdftoppm {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }
}

impl PageRenderer for Pdftoppm {
    fn render_page(
        &self,
        pdf: &Path,
        page: u32,
        dpi: u32,
        workdir: &Path,
    ) -> Result<RenderedPage, EngineError> {
        let prefix = workdir.join(format!("page-{}", page));
        let dpi = dpi.to_string();
        let page_arg = page.to_string();

        run_program(
            &self.program,
            &[
                OsStr::new("-r"),
                OsStr::new(&dpi),
                OsStr::new("-f"),
                OsStr::new(&page_arg),
                OsStr::new("-l"),
                OsStr::new(&page_arg),
                OsStr::new("-png"),
                OsStr::new("-singlefile"),
                pdf.as_os_str(),
                prefix.as_os_str(),
            ],
        )?;

        let image = prefix.with_extension("png");
        let (width, height) = image::image_dimensions(&image)
            .map_err(|e| EngineError::Parse(format!("{}: {}", image.display(), e)))?;

        Ok(RenderedPage { image, width, height })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BBOX_XML: &str = r#"<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml">
<body>
<doc>
  <page width="612.000000" height="792.000000">
    <word xMin="56.800000" yMin="57.100000" xMax="80.200000" yMax="69.100000">Part</word>
    <word xMin="82.000000" yMin="57.100000" xMax="140.500000" yMax="69.100000">KE&amp;104</word>
  </page>
  <page width="595.000000" height="842.000000">
  </page>
</doc>
</body>
</html>"#;

    #[test]
    fn test_parse_bbox_words() {
        let pages = parse_bbox_words(BBOX_XML);
        assert_eq!(pages.len(), 2);

        assert_eq!(pages[0].page, 1);
        assert_eq!(pages[0].width, 612.0);
        assert_eq!(pages[0].words.len(), 2);
        assert_eq!(pages[0].words[1].text, "KE&104");
        assert_eq!(pages[0].words[0].rect, Rect::new(56.8, 57.1, 80.2, 69.1));

        assert_eq!(pages[1].page, 2);
        assert_eq!(pages[1].height, 842.0);
        assert!(pages[1].words.is_empty());
    }

    #[test]
    fn test_parse_attr_requires_exact_name() {
        let tag = r#"<word xMin="1" yMin="2" xMax="3" yMax="4">a</word>"#;
        assert_eq!(parse_attr(tag, "Min"), None);
        assert_eq!(parse_attr(tag, "yMax"), Some("4"));
    }

    #[test]
    fn test_missing_program_is_not_found() {
        let pdftotext = Pdftotext::new("fai-coc-no-such-program");
        let result = pdftotext.extract_words(Path::new("missing.pdf"));
        assert!(matches!(result, Err(EngineError::NotFound { .. })));
    }
}
