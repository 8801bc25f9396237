use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// 文書ごとの書き出し状況
#[derive(Debug, Default)]
pub struct DocumentSlot {
    /// この実行で書き出した最新のファイル
    pub written: Option<PathBuf>,
    /// 不可視テキストレイヤーを埋め込み済み
    pub text_layer: bool,
}

/// 同じPDFに当たった複数の行を順番に処理するための登録簿
///
/// ジョブは自分の文書のスロットを処理の間ずっと保持する。後続のジョブは
/// 先に書き出された出力を読み込むので、ハイライトが1つのファイルに積み重なる。
#[derive(Debug, Default)]
pub struct DocumentRegistry {
    slots: Mutex<HashMap<PathBuf, Arc<Mutex<DocumentSlot>>>>,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&self, source: &Path) -> Arc<Mutex<DocumentSlot>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.entry(source.to_path_buf()).or_default().clone()
    }
}
