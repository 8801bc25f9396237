//! 結合テスト用のフィクスチャと偽エンジン

#![allow(dead_code)]

use fai_coc_rust::annotator::OUTPUT_PREFIX;
use fai_coc_rust::error::EngineError;
use fai_coc_rust::orchestrator::CancelToken;
use fai_coc_rust::recognizer::{
    Engines, PageRenderer, PageWords, RecognitionEngine, Rect, RenderedPage, TextLayerSource,
    WordBox,
};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use rust_xlsxwriter::Workbook;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const PAGE_WIDTH: f64 = 612.0;
pub const PAGE_HEIGHT: f64 = 792.0;

/// 空ページだけのPDFを作成（Letter）
pub fn write_pdf(path: &Path, pages: u32) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for _ in 0..pages {
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {},
        });
        kids.push(page_id.into());
    }

    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => Object::Integer(pages as i64),
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(PAGE_WIDTH as i64),
            Object::Integer(PAGE_HEIGHT as i64),
        ],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    doc.save(path).unwrap();
}

/// 検査表を作成（見出し: Cablex P/N, FAIR Identifier, Part Number, Description）
pub fn write_sheet(path: &Path, rows: &[(&str, &str, &str)]) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "FIRST ARTICLE INSPECTION").unwrap();

    let headers = ["Cablex P/N", "FAIR Identifier", "Part Number", "Description"];
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string(2, col as u16, *header).unwrap();
    }
    for (i, (primary, alternate, part)) in rows.iter().enumerate() {
        let row = 3 + i as u32;
        sheet.write_string(row, 0, *primary).unwrap();
        sheet.write_string(row, 1, *alternate).unwrap();
        sheet.write_string(row, 2, *part).unwrap();
        sheet.write_string(row, 3, "Bracket").unwrap();
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    workbook.save(path).unwrap();
}

/// ルート配下の全ファイル（相対パス、ソート済み）
pub fn list_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().strip_prefix(root).unwrap().to_path_buf())
        .collect();
    files.sort();
    files
}

/// 注釈の種類を数える（ページ順）
pub fn annotation_subtypes(path: &Path) -> Vec<String> {
    let doc = Document::load(path).unwrap();
    let mut subtypes = Vec::new();
    for page_id in doc.get_pages().values() {
        let page = doc.get_dictionary(*page_id).unwrap();
        let Ok(annots) = page.get(b"Annots") else { continue };
        let annots = match annots {
            Object::Reference(id) => doc.get_object(*id).unwrap().as_array().unwrap().clone(),
            other => other.as_array().unwrap().clone(),
        };
        for annot in annots {
            let dict = match annot {
                Object::Reference(id) => doc.get_dictionary(id).unwrap().clone(),
                Object::Dictionary(d) => d,
                _ => continue,
            };
            if let Ok(Object::Name(name)) = dict.get(b"Subtype") {
                subtypes.push(String::from_utf8_lossy(name).to_string());
            }
        }
    }
    subtypes
}

/// ファイル名とページ番号から文書を識別する（書き出し済みファイルは元の名前に戻す）
fn document_key(pdf: &Path) -> String {
    let stem = pdf.file_stem().unwrap().to_string_lossy().to_string();
    stem.trim_start_matches(OUTPUT_PREFIX).to_string()
}

fn layout_words(words: &[String]) -> Vec<WordBox> {
    words
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let x = 72.0 + i as f64 * 120.0;
            WordBox {
                text: text.clone(),
                rect: Rect::new(x, 100.0, x + 100.0, 120.0),
                confidence: Some(95.0),
            }
        })
        .collect()
}

/// ページごとの単語を持つ偽ドキュメント集
#[derive(Debug, Clone, Default)]
pub struct FakeCorpus {
    /// (文書名, ページ) → 単語
    pub words: HashMap<(String, u32), Vec<String>>,
}

impl FakeCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, document: &str, page: u32, words: &[&str]) -> Self {
        self.words.insert(
            (document.to_string(), page),
            words.iter().map(|w| w.to_string()).collect(),
        );
        self
    }
}

/// テキストレイヤー（ネイティブ文字）を返す偽実装
pub struct FakeTextLayer {
    pub corpus: FakeCorpus,
}

impl TextLayerSource for FakeTextLayer {
    fn extract_words(&self, pdf: &Path) -> Result<Vec<PageWords>, EngineError> {
        let key = document_key(pdf);
        let mut pages: Vec<PageWords> = self
            .corpus
            .words
            .iter()
            .filter(|((doc, _), _)| *doc == key)
            .map(|((_, page), words)| PageWords {
                page: *page,
                width: PAGE_WIDTH,
                height: PAGE_HEIGHT,
                words: layout_words(words),
            })
            .collect();
        pages.sort_by_key(|p| p.page);
        Ok(pages)
    }

    fn name(&self) -> &str {
        "fake-text-layer"
    }
}

/// ページ画像の代わりに名前だけ決める偽ラスタライザ
pub struct FakeRenderer;

impl PageRenderer for FakeRenderer {
    fn render_page(
        &self,
        pdf: &Path,
        page: u32,
        _dpi: u32,
        workdir: &Path,
    ) -> Result<RenderedPage, EngineError> {
        Ok(RenderedPage {
            image: workdir.join(format!("{}@{}.png", document_key(pdf), page)),
            width: PAGE_WIDTH as u32,
            height: PAGE_HEIGHT as u32,
        })
    }
}

/// 認識結果を返す偽エンジン（同時実行数と呼び出し回数を記録）
pub struct FakeOcr {
    pub corpus: FakeCorpus,
    pub fail_pages: HashSet<(String, u32)>,
    pub delay: Duration,
    /// 文書ごとの追加の待ち時間
    pub slow: HashMap<String, Duration>,
    /// N回目の呼び出しで中断を要求する
    pub cancel_on_call: Option<(usize, CancelToken)>,
    pub calls: AtomicUsize,
    pub active: AtomicUsize,
    pub peak: AtomicUsize,
    pub seen: Mutex<Vec<(String, u32)>>,
}

impl FakeOcr {
    pub fn new(corpus: FakeCorpus) -> Self {
        Self {
            corpus,
            fail_pages: HashSet::new(),
            delay: Duration::ZERO,
            slow: HashMap::new(),
            cancel_on_call: None,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self, document: &str, page: u32) -> Self {
        self.fail_pages.insert((document.to_string(), page));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn slow_document(mut self, document: &str, delay: Duration) -> Self {
        self.slow.insert(document.to_string(), delay);
        self
    }

    pub fn cancel_on_call(mut self, call: usize, token: CancelToken) -> Self {
        self.cancel_on_call = Some((call, token));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl RecognitionEngine for FakeOcr {
    fn recognize(&self, page: &RenderedPage) -> Result<Vec<WordBox>, EngineError> {
        let name = page.image.file_stem().unwrap().to_string_lossy().to_string();
        let (document, number) = name.rsplit_once('@').unwrap();
        let key = (document.to_string(), number.parse::<u32>().unwrap());

        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);
        self.seen.lock().unwrap().push(key.clone());

        let delay = self.delay + self.slow.get(&key.0).copied().unwrap_or_default();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if let Some((at, token)) = &self.cancel_on_call {
            if call == *at {
                token.cancel();
            }
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.fail_pages.contains(&key) {
            return Err(EngineError::Failed {
                program: "tesseract".into(),
                code: 1,
                stderr: format!("page {} failed", key.1),
            });
        }
        Ok(self
            .corpus
            .words
            .get(&key)
            .map(|w| layout_words(w))
            .unwrap_or_default())
    }
}

/// テキストレイヤーなし、認識だけで単語が得られるエンジン一式
pub fn ocr_engines(ocr: Arc<FakeOcr>) -> Engines {
    Engines {
        text_layer: Arc::new(FakeTextLayer { corpus: FakeCorpus::new() }),
        renderer: Arc::new(FakeRenderer),
        recognizer: ocr,
    }
}

/// ネイティブテキストありのエンジン一式
pub fn native_engines(native: FakeCorpus, ocr: Arc<FakeOcr>) -> Engines {
    Engines {
        text_layer: Arc::new(FakeTextLayer { corpus: native }),
        renderer: Arc::new(FakeRenderer),
        recognizer: ocr,
    }
}
