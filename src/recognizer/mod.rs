//! 文字認識フォールバックモジュール
//!
//! ページごとにネイティブテキストの有無を判定し、無い（または強制指定の）
//! ページだけを pdftoppm でラスタライズして tesseract にかける。
//!
//! - 1ページの認識失敗は記録してそのページを「テキストなし」扱いにし、次へ進む
//! - 全滅した場合のみ文書単位のエラー（`DocumentError::RecognitionFailed`）

pub mod poppler;
pub mod tesseract;
pub mod types;

pub use poppler::{Pdftoppm, Pdftotext};
pub use tesseract::Tesseract;
pub use types::{
    PageFailure, PageGeometry, PageText, PageWords, RecognitionIndex, Rect, RenderedPage,
    TextSource, WordBox,
};

use crate::config::Config;
use crate::error::{DocumentError, EngineError};
use std::ffi::OsStr;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

/// PDFのテキストレイヤー取得
pub trait TextLayerSource: Send + Sync {
    /// ページごとの単語と位置（左上原点、pt単位）
    fn extract_words(&self, pdf: &Path) -> Result<Vec<PageWords>, EngineError>;

    /// 診断用の名前
    fn name(&self) -> &str;
}

/// ページのラスタライズ
pub trait PageRenderer: Send + Sync {
    fn render_page(
        &self,
        pdf: &Path,
        page: u32,
        dpi: u32,
        workdir: &Path,
    ) -> Result<RenderedPage, EngineError>;
}

/// 画像の文字認識（座標は画像ピクセル）
pub trait RecognitionEngine: Send + Sync {
    fn recognize(&self, page: &RenderedPage) -> Result<Vec<WordBox>, EngineError>;
}

/// 外部エンジン一式
#[derive(Clone)]
pub struct Engines {
    pub text_layer: Arc<dyn TextLayerSource>,
    pub renderer: Arc<dyn PageRenderer>,
    pub recognizer: Arc<dyn RecognitionEngine>,
}

impl Engines {
    /// 設定に従ったシステムのCLIを使う
    pub fn system(config: &Config) -> Self {
        Self {
            text_layer: Arc::new(Pdftotext::new(&config.pdftotext_path)),
            renderer: Arc::new(Pdftoppm::new(&config.pdftoppm_path)),
            recognizer: Arc::new(Tesseract::new(&config.tesseract_path, &config.ocr_language)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecognitionSettings {
    /// テキストの有無にかかわらず全ページを認識する
    pub force: bool,
    pub dpi: u32,
    pub min_native_chars: usize,
}

impl RecognitionSettings {
    pub fn from_config(config: &Config, force: bool) -> Self {
        Self {
            force,
            dpi: config.ocr_dpi,
            min_native_chars: config.min_native_chars,
        }
    }
}

/// 外部プログラムを実行して標準出力を返す
pub(crate) fn run_program(program: &str, args: &[&OsStr]) -> Result<Vec<u8>, EngineError> {
    let output = Command::new(program).args(args).output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            EngineError::NotFound { program: program.to_string() }
        } else {
            EngineError::Io(e)
        }
    })?;

    if !output.status.success() {
        return Err(EngineError::Failed {
            program: program.to_string(),
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output.stdout)
}

/// プログラムが実行可能か
pub fn command_available(program: &str) -> bool {
    Command::new(program)
        .arg("-v")
        .output()
        .map(|o| o.status.success() || !o.stderr.is_empty())
        .unwrap_or(false)
}

/// 文書全ページの索引を作る
///
/// `geometry` はPDF側のページ一覧（ページ数と寸法の正）。
pub fn build_index(
    pdf: &Path,
    geometry: &[PageGeometry],
    engines: &Engines,
    settings: &RecognitionSettings,
) -> Result<RecognitionIndex, DocumentError> {
    let native = match engines.text_layer.extract_words(pdf) {
        Ok(pages) => pages,
        Err(e) => {
            tracing::warn!(
                file = %pdf.display(),
                backend = engines.text_layer.name(),
                "テキストレイヤーを取得できません: {}",
                e
            );
            Vec::new()
        }
    };

    // ページ画像の置き場（文書ごと、戻る時に削除）
    let workdir = tempfile::tempdir()?;
    let mut index = RecognitionIndex::default();
    let mut required = 0usize;

    for geom in geometry {
        let native_page = native.iter().find(|p| p.page == geom.page);
        let native_words = native_page.map(|p| p.words.clone()).unwrap_or_default();
        let native_chars = native_page.map(PageWords::char_count).unwrap_or(0);

        if !settings.force && native_chars >= settings.min_native_chars {
            index.pages.push(PageText {
                page: geom.page,
                source: TextSource::Native,
                words: native_words,
            });
            continue;
        }

        required += 1;
        match recognize_page(pdf, geom, engines, settings, workdir.path()) {
            Ok(words) => {
                tracing::debug!(file = %pdf.display(), page = geom.page, words = words.len(), "文字認識完了");
                index.pages.push(PageText {
                    page: geom.page,
                    source: TextSource::Recognized,
                    words,
                });
            }
            Err(e) => {
                tracing::warn!(file = %pdf.display(), page = geom.page, "文字認識に失敗: {}", e);
                index.failures.push(PageFailure {
                    page: geom.page,
                    reason: e.to_string(),
                });
                let source = if native_words.is_empty() {
                    TextSource::Unavailable
                } else {
                    TextSource::Native
                };
                index.pages.push(PageText {
                    page: geom.page,
                    source,
                    words: native_words,
                });
            }
        }
    }

    if required > 0 && index.failures.len() == required && index.word_count() == 0 {
        return Err(DocumentError::RecognitionFailed(pdf.to_path_buf()));
    }

    Ok(index)
}

fn recognize_page(
    pdf: &Path,
    geom: &PageGeometry,
    engines: &Engines,
    settings: &RecognitionSettings,
    workdir: &Path,
) -> Result<Vec<WordBox>, EngineError> {
    let rendered = engines
        .renderer
        .render_page(pdf, geom.page, settings.dpi, workdir)?;
    if rendered.width == 0 || rendered.height == 0 {
        return Err(EngineError::Parse(format!(
            "画像サイズが不正です: {}",
            rendered.image.display()
        )));
    }

    let sx = geom.width / rendered.width as f64;
    let sy = geom.height / rendered.height as f64;

    let words = engines
        .recognizer
        .recognize(&rendered)?
        .into_iter()
        .map(|w| WordBox {
            rect: w.rect.scale(sx, sy),
            ..w
        })
        .collect();

    Ok(words)
}
