//! PDF書き換え（lopdf）
//!
//! - ハイライト注釈（黄色・半透明の外観ストリーム付き）
//! - 「Matched Part Number: …」の赤字スタンプ（ページ左上の固定位置）
//! - 認識テキストの不可視レイヤー（描画モード3）
//!
//! 書き出しは一時ファイル経由の置き換えで行い、途中の壊れたファイルを残さない。

use crate::error::DocumentError;
use crate::recognizer::{PageGeometry, PageText, Rect};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};

/// MediaBox が取れない場合（US Letter）
const DEFAULT_PAGE_SIZE: (f64, f64) = (612.0, 792.0);

/// Parent を辿る上限
const MAX_INHERIT_DEPTH: usize = 32;

const HIGHLIGHT_NAME: &str = "fai-coc-highlight";
const STAMP_NAME: &str = "fai-coc-stamp";
const STAMP_FONT: &str = "Helv";
const STAMP_FONT_SIZE: f64 = 12.0;
const STAMP_LEFT: f64 = 50.0;
const STAMP_TOP: f64 = 30.0;
const TEXT_LAYER_FONT: &str = "FaiCocOcr";

pub struct PdfDocument {
    path: PathBuf,
    doc: Document,
    pages: BTreeMap<u32, ObjectId>,
    geometry: Vec<PageGeometry>,
    text_layer_font: Option<ObjectId>,
}

impl PdfDocument {
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let doc = match Document::load(path) {
            Ok(doc) => doc,
            Err(e) => {
                let bytes = std::fs::read(path)?;
                if bytes.windows(8).any(|w| w == b"/Encrypt") {
                    return Err(DocumentError::Encrypted(path.to_path_buf()));
                }
                return Err(unreadable(path, e));
            }
        };

        if doc.trailer.get(b"Encrypt").is_ok() {
            return Err(DocumentError::Encrypted(path.to_path_buf()));
        }

        let pages = doc.get_pages();
        if pages.is_empty() {
            return Err(unreadable(path, "ページがありません"));
        }

        let geometry = pages
            .iter()
            .map(|(&number, &id)| page_geometry(&doc, number, id))
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            doc,
            pages,
            geometry,
            text_layer_font: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn geometry(&self) -> &[PageGeometry] {
        &self.geometry
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// ハイライト注釈を追加（rect は左上原点）
    pub fn add_highlight(&mut self, page: u32, rect: Rect, contents: &str) -> Result<(), DocumentError> {
        let (page_id, geom) = self.page(page)?;
        let [x0, y0, x1, y1] = to_pdf_space(&geom, &rect);

        let appearance = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => reals(&[x0, y0, x1, y1]),
                "Resources" => dictionary! {
                    "ExtGState" => dictionary! {
                        "GS0" => dictionary! {
                            "Type" => "ExtGState",
                            "ca" => real(0.35),
                            "CA" => real(0.35),
                            "BM" => "Multiply",
                        },
                    },
                },
            },
            self.encode(vec![
                Operation::new("gs", vec!["GS0".into()]),
                Operation::new("rg", reals(&[1.0, 1.0, 0.0])),
                Operation::new("re", reals(&[x0, y0, x1 - x0, y1 - y0])),
                Operation::new("f", vec![]),
            ])?,
        );
        let appearance_id = self.doc.add_object(appearance);

        let annot = dictionary! {
            "Type" => "Annot",
            "Subtype" => "Highlight",
            "Rect" => reals(&[x0, y0, x1, y1]),
            "QuadPoints" => reals(&[x0, y1, x1, y1, x0, y0, x1, y0]),
            "C" => reals(&[1.0, 1.0, 0.0]),
            "F" => Object::Integer(4),
            "P" => page_id,
            "NM" => Object::string_literal(format!("{}-{}", HIGHLIGHT_NAME, appearance_id.0)),
            "Contents" => Object::string_literal(contents),
            "AP" => dictionary! { "N" => appearance_id },
        };
        let annot_id = self.doc.add_object(annot);
        self.push_annot(page_id, annot_id)
    }

    /// 照合した品番を赤字で表示
    ///
    /// 同じページに既にスタンプがあれば1行ずつ下にずらす。
    pub fn add_stamp(&mut self, page: u32, identifier: &str) -> Result<(), DocumentError> {
        let (page_id, geom) = self.page(page)?;
        let text = format!("Matched Part Number: {}", identifier);

        let line = self.count_annots(page_id, STAMP_NAME);
        let width = text.chars().count() as f64 * STAMP_FONT_SIZE * 0.6 + 8.0;
        let height = STAMP_FONT_SIZE + 6.0;
        let x0 = geom.origin_x + STAMP_LEFT;
        let top = geom.origin_y + geom.height - STAMP_TOP - line as f64 * height;

        let appearance = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => reals(&[0.0, 0.0, width, height]),
                "Resources" => dictionary! {
                    "Font" => dictionary! { STAMP_FONT => helvetica() },
                },
            },
            self.encode(vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![STAMP_FONT.into(), real(STAMP_FONT_SIZE)]),
                Operation::new("rg", reals(&[1.0, 0.0, 0.0])),
                Operation::new("Td", reals(&[4.0, 5.0])),
                Operation::new("Tj", vec![Object::string_literal(text.as_str())]),
                Operation::new("ET", vec![]),
            ])?,
        );
        let appearance_id = self.doc.add_object(appearance);

        let annot = dictionary! {
            "Type" => "Annot",
            "Subtype" => "FreeText",
            "Rect" => reals(&[x0, top - height, x0 + width, top]),
            "Contents" => Object::string_literal(text.as_str()),
            "DA" => Object::string_literal(format!("/{} {} Tf 1 0 0 rg", STAMP_FONT, STAMP_FONT_SIZE)),
            "F" => Object::Integer(4),
            "Border" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(0)],
            "P" => page_id,
            "NM" => Object::string_literal(format!("{}-{}-{}", STAMP_NAME, page, line)),
            "AP" => dictionary! { "N" => appearance_id },
        };
        let annot_id = self.doc.add_object(annot);
        self.push_annot(page_id, annot_id)
    }

    /// 認識テキストを不可視で重ねる（検索・コピー用）
    pub fn embed_text_layer(&mut self, text: &PageText) -> Result<(), DocumentError> {
        if text.words.is_empty() {
            return Ok(());
        }
        let (page_id, geom) = self.page(text.page)?;

        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tr", vec![Object::Integer(3)]),
        ];
        for word in &text.words {
            let size = (word.rect.height() * 0.8).max(1.0);
            let natural = word.text.chars().count() as f64 * size * 0.5;
            let scale = if natural > 0.0 {
                (word.rect.width() / natural * 100.0).clamp(10.0, 1000.0)
            } else {
                100.0
            };
            let [x, y, _, _] = to_pdf_space(&geom, &word.rect);

            operations.push(Operation::new("Tf", vec![TEXT_LAYER_FONT.into(), real(size)]));
            operations.push(Operation::new("Tz", vec![real(scale)]));
            operations.push(Operation::new(
                "Tm",
                reals(&[1.0, 0.0, 0.0, 1.0, x, y + word.rect.height() * 0.2]),
            ));
            operations.push(Operation::new("Tj", vec![Object::string_literal(word.text.as_str())]));
        }
        operations.push(Operation::new("ET", vec![]));

        let layer = self.encode(operations)?;
        let font_id = self.text_layer_font();
        self.add_font_resource(page_id, TEXT_LAYER_FONT, font_id)?;
        self.append_content(page_id, layer)
    }

    /// 一時ファイルに書いてから置き換える
    pub fn save_atomic(mut self, target: &Path) -> Result<(), DocumentError> {
        let dir = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        self.doc.compress();
        self.doc
            .save_to(&mut temp)
            .map_err(|e| write_error(target, e))?;
        temp.as_file().sync_all()?;
        temp.persist(target).map_err(|e| write_error(target, e.error))?;
        Ok(())
    }

    fn page(&self, page: u32) -> Result<(ObjectId, PageGeometry), DocumentError> {
        let id = self.pages.get(&page).copied();
        let geom = self.geometry.iter().find(|g| g.page == page).copied();
        id.zip(geom)
            .ok_or_else(|| write_error(&self.path, format!("ページ {} がありません", page)))
    }

    fn encode(&self, operations: Vec<Operation>) -> Result<Vec<u8>, DocumentError> {
        Content { operations }
            .encode()
            .map_err(|e| write_error(&self.path, e))
    }

    fn page_dict_mut(&mut self, page_id: ObjectId) -> Result<&mut Dictionary, DocumentError> {
        let path = self.path.clone();
        self.doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| write_error(&path, e))
    }

    fn page_entries(&self, page_id: ObjectId, key: &[u8]) -> Vec<Object> {
        let Ok(page) = self.doc.get_dictionary(page_id) else {
            return Vec::new();
        };
        match page.get(key) {
            Ok(Object::Array(items)) => items.clone(),
            Ok(Object::Reference(id)) => match self.doc.get_object(*id) {
                Ok(Object::Array(items)) => items.clone(),
                Ok(_) => vec![Object::Reference(*id)],
                Err(_) => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    fn push_annot(&mut self, page_id: ObjectId, annot_id: ObjectId) -> Result<(), DocumentError> {
        let mut annots = self.page_entries(page_id, b"Annots");
        annots.push(annot_id.into());
        self.page_dict_mut(page_id)?.set("Annots", annots);
        Ok(())
    }

    /// NM が prefix で始まる注釈の数
    fn count_annots(&self, page_id: ObjectId, prefix: &str) -> usize {
        self.page_entries(page_id, b"Annots")
            .iter()
            .filter_map(|annot| resolve(&self.doc, annot).as_dict().ok())
            .filter(|annot| {
                matches!(annot.get(b"NM"), Ok(Object::String(name, _)) if name.starts_with(prefix.as_bytes()))
            })
            .count()
    }

    /// 元の内容を q/Q で囲み、その後ろに追記
    fn append_content(&mut self, page_id: ObjectId, extra: Vec<u8>) -> Result<(), DocumentError> {
        let existing = self.page_entries(page_id, b"Contents");

        let open = self.doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
        let mut body = b"Q\n".to_vec();
        body.extend(extra);
        let close = self.doc.add_object(Stream::new(dictionary! {}, body));

        let mut contents: Vec<Object> = vec![open.into()];
        contents.extend(existing);
        contents.push(close.into());

        self.page_dict_mut(page_id)?.set("Contents", contents);
        Ok(())
    }

    fn text_layer_font(&mut self) -> ObjectId {
        match self.text_layer_font {
            Some(id) => id,
            None => {
                let id = self.doc.add_object(helvetica());
                self.text_layer_font = Some(id);
                id
            }
        }
    }

    /// ページの Resources/Font にフォントを登録
    ///
    /// 参照や親から継承した Resources はページ直下に複製してから書き換える。
    fn add_font_resource(&mut self, page_id: ObjectId, name: &str, font_id: ObjectId) -> Result<(), DocumentError> {
        let mut resources = inherited(&self.doc, page_id, b"Resources")
            .and_then(|obj| resolve(&self.doc, obj).as_dict().ok())
            .cloned()
            .unwrap_or_else(Dictionary::new);

        let mut fonts = resources
            .get(b"Font")
            .ok()
            .and_then(|obj| resolve(&self.doc, obj).as_dict().ok())
            .cloned()
            .unwrap_or_else(Dictionary::new);

        fonts.set(name, font_id);
        resources.set("Font", fonts);
        self.page_dict_mut(page_id)?.set("Resources", resources);
        Ok(())
    }
}

fn helvetica() -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    }
}

fn real(value: f64) -> Object {
    Object::Real((value as f32).into())
}

fn reals(values: &[f64]) -> Vec<Object> {
    values.iter().map(|v| real(*v)).collect()
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// ページから Parent を辿って継承属性を探す
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut dict = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_INHERIT_DEPTH {
        if let Ok(obj) = dict.get(key) {
            return Some(obj);
        }
        let parent = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
        dict = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn page_geometry(doc: &Document, page: u32, page_id: ObjectId) -> PageGeometry {
    let media_box = inherited(doc, page_id, b"MediaBox")
        .and_then(|obj| resolve(doc, obj).as_array().ok())
        .map(|items| {
            items
                .iter()
                .filter_map(|o| number(resolve(doc, o)))
                .collect::<Vec<_>>()
        })
        .filter(|v| v.len() == 4)
        .map(|v| Rect::new(v[0], v[1], v[2], v[3]))
        .filter(|r| !r.is_empty());

    match media_box {
        Some(r) => PageGeometry {
            page,
            origin_x: r.x0,
            origin_y: r.y0,
            width: r.width(),
            height: r.height(),
        },
        None => PageGeometry {
            page,
            origin_x: 0.0,
            origin_y: 0.0,
            width: DEFAULT_PAGE_SIZE.0,
            height: DEFAULT_PAGE_SIZE.1,
        },
    }
}

/// 左上原点の矩形をPDF座標（左下原点）の [x0, y0, x1, y1] に変換
fn to_pdf_space(geom: &PageGeometry, rect: &Rect) -> [f64; 4] {
    let top = geom.origin_y + geom.height;
    [
        geom.origin_x + rect.x0,
        top - rect.y1,
        geom.origin_x + rect.x1,
        top - rect.y0,
    ]
}

fn unreadable(path: &Path, reason: impl Display) -> DocumentError {
    DocumentError::Unreadable {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn write_error(path: &Path, reason: impl Display) -> DocumentError {
    DocumentError::Write {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}
