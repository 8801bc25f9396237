//! 注釈モジュール
//!
//! 文書内の品番位置を探してハイライトし、出力モードに従って書き出す。
//! 処理はジョブの状態（認識 → 検索 → ハイライト）に合わせて3段に分けてあり、
//! 段の間でオーケストレーターが中断要求を確認する。

pub mod output;
pub mod pdf;
pub mod search;

pub use output::{resolver_for, DestructiveOutput, OutputResolver, SafeOutput, OUTPUT_PREFIX};
pub use pdf::PdfDocument;
pub use search::{find_in_words, find_occurrences, Occurrence};

use crate::config::Config;
use crate::error::DocumentError;
use crate::recognizer::{build_index, Engines, RecognitionIndex, RecognitionSettings};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 認識段の結果
pub struct Prepared {
    pub document: PdfDocument,
    pub index: RecognitionIndex,
}

/// ハイライト段の結果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationReport {
    pub identifier_found: bool,
    pub highlight_count: usize,
    /// 書き出したファイル（書き出していなければNone）
    pub output: Option<PathBuf>,
    /// 認識に失敗したページ
    pub failed_pages: Vec<u32>,
    /// 不可視テキストレイヤーを埋め込んだか
    pub text_layer_embedded: bool,
}

pub struct Annotator {
    engines: Engines,
    settings: RecognitionSettings,
    resolver: Arc<dyn OutputResolver>,
    embed_text_layer: bool,
    write_unmatched: bool,
}

impl Annotator {
    pub fn new(
        engines: Engines,
        settings: RecognitionSettings,
        resolver: Arc<dyn OutputResolver>,
        config: &Config,
    ) -> Self {
        Self {
            engines,
            settings,
            resolver,
            embed_text_layer: config.embed_text_layer,
            write_unmatched: config.write_unmatched,
        }
    }

    /// 認識段: 読み込みと索引作成
    ///
    /// `input` は元ファイル、または同じ実行で先に書き出した出力ファイル。
    pub fn prepare(&self, input: &Path) -> Result<Prepared, DocumentError> {
        let document = PdfDocument::load(input)?;
        let index = build_index(input, document.geometry(), &self.engines, &self.settings)?;
        Ok(Prepared { document, index })
    }

    /// 検索段
    pub fn search(&self, prepared: &Prepared, identifier: &str) -> Vec<Occurrence> {
        find_occurrences(&prepared.index, identifier)
    }

    /// ハイライト段: 注釈を付けて書き出す
    ///
    /// 見つからなかった場合は `write_unmatched` の時だけ（テキストレイヤーのみ付けて）書き出す。
    /// `text_layer_done` は同じ文書に既にテキストレイヤーを埋め込み済みかどうか。
    pub fn write(
        &self,
        source: &Path,
        prepared: Prepared,
        occurrences: &[Occurrence],
        identifier: &str,
        text_layer_done: bool,
    ) -> Result<AnnotationReport, DocumentError> {
        let Prepared { mut document, index } = prepared;

        let mut report = AnnotationReport {
            identifier_found: !occurrences.is_empty(),
            highlight_count: occurrences.len(),
            failed_pages: index.failures.iter().map(|f| f.page).collect(),
            ..Default::default()
        };

        if occurrences.is_empty() && !self.write_unmatched {
            return Ok(report);
        }

        for occurrence in occurrences {
            document.add_highlight(occurrence.page, occurrence.rect, identifier)?;
        }

        let mut stamped: Vec<u32> = occurrences.iter().map(|o| o.page).collect();
        stamped.dedup();
        for page in stamped {
            document.add_stamp(page, identifier)?;
        }

        if self.embed_text_layer && !text_layer_done {
            for page in index.recognized_pages() {
                document.embed_text_layer(page)?;
                report.text_layer_embedded = true;
            }
        }

        let target = self.resolver.resolve(source)?;
        document.save_atomic(&target)?;
        tracing::info!(
            file = %source.display(),
            output = %target.display(),
            highlights = report.highlight_count,
            "PDFを書き出しました"
        );

        report.output = Some(target);
        Ok(report)
    }
}
