//! 出力先の決定
//!
//! 実行ごとに1つの OutputResolver を選び、Annotator はモードで分岐しない。

use crate::error::DocumentError;
use fai_coc_common::OutputMode;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 出力ファイル名の接頭辞
pub const OUTPUT_PREFIX: &str = "highlighted_";

pub trait OutputResolver: Send + Sync {
    /// 書き出し先（必要なフォルダは作成する）
    fn resolve(&self, source: &Path) -> Result<PathBuf, DocumentError>;

    fn mode(&self) -> OutputMode;
}

/// 別フォルダへ書き出す
///
/// `<root>/<出力フォルダ>/<rootからの相対パス>/highlighted_<ファイル名>`
pub struct SafeOutput {
    root: PathBuf,
    output_dir: PathBuf,
}

impl SafeOutput {
    pub fn new(root: &Path, output_folder_name: &str) -> Self {
        Self {
            root: root.to_path_buf(),
            output_dir: root.join(output_folder_name),
        }
    }
}

impl OutputResolver for SafeOutput {
    fn resolve(&self, source: &Path) -> Result<PathBuf, DocumentError> {
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| DocumentError::Write {
                path: source.to_path_buf(),
                reason: "ファイル名がありません".to_string(),
            })?;

        let relative = source
            .parent()
            .and_then(|p| p.strip_prefix(&self.root).ok())
            .unwrap_or_else(|| Path::new(""));

        let dir = self.output_dir.join(relative);
        std::fs::create_dir_all(&dir)?;

        Ok(dir.join(format!("{}{}", OUTPUT_PREFIX, file_name)))
    }

    fn mode(&self) -> OutputMode {
        OutputMode::Safe
    }
}

/// 元ファイルを上書き（バックアップなし）
pub struct DestructiveOutput;

impl OutputResolver for DestructiveOutput {
    fn resolve(&self, source: &Path) -> Result<PathBuf, DocumentError> {
        Ok(source.to_path_buf())
    }

    fn mode(&self) -> OutputMode {
        OutputMode::Destructive
    }
}

pub fn resolver_for(mode: OutputMode, root: &Path, output_folder_name: &str) -> Arc<dyn OutputResolver> {
    match mode {
        OutputMode::Safe => Arc::new(SafeOutput::new(root, output_folder_name)),
        OutputMode::Destructive => Arc::new(DestructiveOutput),
    }
}
