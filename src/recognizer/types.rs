//! 文字認識の型定義
//!
//! 座標はすべてページ左上を原点としたPDFポイント単位。
//! PDFへ書き込む際に annotator 側で左下原点へ変換する。

use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    /// 2つの矩形を包む矩形
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// 画像ピクセル座標からページ座標へ
    pub fn scale(&self, sx: f64, sy: f64) -> Rect {
        Rect::new(self.x0 * sx, self.y0 * sy, self.x1 * sx, self.y1 * sy)
    }
}

/// 位置付きの単語
#[derive(Debug, Clone, PartialEq)]
pub struct WordBox {
    pub text: String,
    pub rect: Rect,
    /// 認識エンジンの信頼度（0-100、ネイティブテキストはNone）
    pub confidence: Option<f32>,
}

/// テキストレイヤーから取り出した1ページ分
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageWords {
    pub page: u32,
    pub width: f64,
    pub height: f64,
    pub words: Vec<WordBox>,
}

impl PageWords {
    /// 空白以外の文字数
    pub fn char_count(&self) -> usize {
        self.words
            .iter()
            .map(|w| w.text.chars().filter(|c| !c.is_whitespace()).count())
            .sum()
    }
}

/// ページ寸法（PDF側の情報）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    /// 1始まり
    pub page: u32,
    /// MediaBox の左下原点
    pub origin_x: f64,
    pub origin_y: f64,
    pub width: f64,
    pub height: f64,
}

/// ラスタライズ結果
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    pub image: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// ページのテキスト取得元
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSource {
    Native,
    Recognized,
    /// 認識に失敗し、ネイティブテキストもない
    Unavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    pub page: u32,
    pub source: TextSource,
    pub words: Vec<WordBox>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    pub page: u32,
    pub reason: String,
}

/// 文書1つ分のページ別テキスト索引
///
/// ジョブ内で一度だけ作り、ジョブ終了時に捨てる。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecognitionIndex {
    pub pages: Vec<PageText>,
    pub failures: Vec<PageFailure>,
}

impl RecognitionIndex {
    pub fn page(&self, page: u32) -> Option<&PageText> {
        self.pages.iter().find(|p| p.page == page)
    }

    pub fn word_count(&self) -> usize {
        self.pages.iter().map(|p| p.words.len()).sum()
    }

    /// 認識由来のページ（不可視テキストレイヤーの対象）
    pub fn recognized_pages(&self) -> impl Iterator<Item = &PageText> {
        self.pages.iter().filter(|p| p.source == TextSource::Recognized)
    }
}
