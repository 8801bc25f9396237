//! 実行状態と進捗イベント

use fai_coc_common::{JobState, OutputMode, Summary};
use std::sync::{Arc, Mutex, MutexGuard};

/// 1回の実行の状態
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    /// スプレッドシート数
    pub total: usize,
    /// 全ジョブが終端に達したスプレッドシート数
    pub completed: usize,
    pub current_file: Option<String>,
    pub cancelled: bool,
    pub output_mode: OutputMode,
}

/// RunState の共有ハンドル
///
/// 書き換えるのはオーケストレーターだけ。表示側はスナップショットを読む。
#[derive(Debug, Clone, Default)]
pub struct SharedRunState(Arc<Mutex<RunState>>);

impl SharedRunState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> RunState {
        self.lock().clone()
    }

    pub(crate) fn begin(&self, total: usize, output_mode: OutputMode) {
        *self.lock() = RunState {
            total,
            output_mode,
            ..Default::default()
        };
    }

    pub(crate) fn set_current(&self, file: &str) {
        self.lock().current_file = Some(file.to_string());
    }

    /// 完了数を1つ進める（total を超えない）
    pub(crate) fn complete_file(&self, file: &str) -> (usize, usize) {
        let mut state = self.lock();
        state.completed = (state.completed + 1).min(state.total);
        state.current_file = Some(file.to_string());
        (state.completed, state.total)
    }

    pub(crate) fn mark_cancelled(&self) {
        self.lock().cancelled = true;
    }

    pub fn reset(&self) {
        *self.lock() = RunState::default();
    }
}

/// 表示側へ送る進捗イベント
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Started {
        total_files: usize,
        total_jobs: usize,
    },
    JobStateChanged {
        job_id: usize,
        state: JobState,
    },
    /// スプレッドシート単位の進捗（ファイル名, 完了数, 総数）
    FileCompleted {
        file: String,
        completed: usize,
        total: usize,
    },
    Finished {
        summary: Summary,
        cancelled: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_never_exceeds_total() {
        let state = SharedRunState::new();
        state.begin(2, OutputMode::Safe);
        assert_eq!(state.complete_file("a.xlsx"), (1, 2));
        assert_eq!(state.complete_file("b.xlsx"), (2, 2));
        assert_eq!(state.complete_file("c.xlsx"), (2, 2));
        assert_eq!(state.snapshot().current_file.as_deref(), Some("c.xlsx"));
    }

    #[test]
    fn test_reset_clears_state() {
        let state = SharedRunState::new();
        state.begin(3, OutputMode::Destructive);
        state.mark_cancelled();
        assert!(state.snapshot().cancelled);

        state.reset();
        assert_eq!(state.snapshot(), RunState::default());
    }
}
