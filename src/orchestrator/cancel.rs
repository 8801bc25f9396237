use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 協調的な中断トークン
///
/// 各ジョブに複製して渡し、状態遷移の直前に確認する。
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
