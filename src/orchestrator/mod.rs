//! 実行制御モジュール
//!
//! 探索・表抽出・照合を順に行ってジョブを作り、上限付きのワーカー枠で
//! 注釈ジョブを並列に実行する。実行状態と結果ログを書き換えるのはここだけ。

pub mod cancel;
pub mod job;
pub mod registry;
pub mod state;

pub use cancel::CancelToken;
pub use job::{AnnotationJob, JobContext, WorkerMessage};
pub use registry::{DocumentRegistry, DocumentSlot};
pub use state::{RunEvent, RunState, SharedRunState};

use crate::annotator::{resolver_for, Annotator};
use crate::config::{Config, RunParameters, MAX_CONCURRENT_JOBS};
use crate::error::Result;
use crate::matcher::CandidateMatcher;
use crate::recognizer::{Engines, RecognitionSettings};
use crate::scanner::{self, SourceTree};
use crate::table;
use fai_coc_common::{JobState, MatchCandidate, OutcomeRecord, ResultSet};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

/// 1つのスプレッドシートの照合結果
#[derive(Debug, Clone)]
pub struct SpreadsheetPlan {
    pub path: PathBuf,
    pub candidates: Vec<MatchCandidate>,
}

impl SpreadsheetPlan {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// 注釈前までの準備結果
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub tree: SourceTree,
    pub spreadsheets: Vec<SpreadsheetPlan>,
}

impl RunPlan {
    pub fn job_count(&self) -> usize {
        self.spreadsheets.iter().map(|s| s.candidates.len()).sum()
    }

    pub fn matched_count(&self) -> usize {
        self.spreadsheets
            .iter()
            .flat_map(|s| &s.candidates)
            .filter(|c| c.is_matched())
            .count()
    }
}

/// 実行結果
#[derive(Debug, Clone)]
pub struct RunReport {
    pub results: ResultSet,
    pub state: RunState,
    /// ジョブごとの終端状態（発見順）
    pub job_states: Vec<JobState>,
    /// 同時に処理中だったジョブ数の最大値
    pub peak_active: usize,
}

pub struct Orchestrator {
    config: Config,
    engines: Engines,
    max_concurrent: usize,
    state: SharedRunState,
    events: Option<mpsc::UnboundedSender<RunEvent>>,
}

impl Orchestrator {
    pub fn new(config: Config, engines: Engines) -> Self {
        Self {
            config,
            engines,
            max_concurrent: MAX_CONCURRENT_JOBS,
            state: SharedRunState::new(),
            events: None,
        }
    }

    /// ワーカー枠を絞る（1〜8）
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.clamp(1, MAX_CONCURRENT_JOBS);
        self
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<RunEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn run_state(&self) -> SharedRunState {
        self.state.clone()
    }

    pub fn reset(&self) {
        self.state.reset();
    }

    fn emit(&self, event: RunEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    /// 探索・表抽出・照合（文書には触れない）
    pub fn plan(&self, root: &Path) -> Result<RunPlan> {
        let tree = scanner::locate_sources(root, &self.config.output_folder_name)?;
        let matcher = CandidateMatcher::new(self.config.match_rules.clone());
        let mut certificates: HashMap<PathBuf, Vec<PathBuf>> = HashMap::new();
        let mut spreadsheets = Vec::new();

        for pair in &tree.pairs {
            let documents = match &pair.certificate {
                Some(folder) => certificates
                    .entry(folder.clone())
                    .or_insert_with(|| scanner::list_certificates(folder))
                    .clone(),
                None => Vec::new(),
            };

            for path in scanner::list_spreadsheets(&pair.inspection) {
                let records = match table::read_records(&path) {
                    Ok(records) => records,
                    Err(e) => {
                        tracing::warn!(file = %path.display(), error = %e, "スプレッドシートを読めませんでした");
                        Vec::new()
                    }
                };
                let candidates = records
                    .iter()
                    .map(|record| matcher.match_record(record, &documents))
                    .collect();
                spreadsheets.push(SpreadsheetPlan { path, candidates });
            }
        }

        Ok(RunPlan { tree, spreadsheets })
    }

    /// 1回の実行
    ///
    /// ルートが不正な場合だけエラーを返す。文書ごとの失敗は結果ログに記録する。
    pub async fn run(&self, params: &RunParameters, cancel: CancelToken) -> Result<RunReport> {
        let plan = self.plan(&params.root_path)?;
        let total_files = plan.spreadsheets.len();
        let file_names: Vec<String> = plan.spreadsheets.iter().map(SpreadsheetPlan::file_name).collect();

        let mut jobs: Vec<AnnotationJob> = Vec::new();
        for (file_index, sheet) in plan.spreadsheets.into_iter().enumerate() {
            for candidate in sheet.candidates {
                jobs.push(AnnotationJob::new(jobs.len(), file_index, candidate));
            }
        }
        let mut remaining = vec![0usize; total_files];
        for job in &jobs {
            remaining[job.file_index] += 1;
        }

        tracing::info!(
            root = %params.root_path.display(),
            files = total_files,
            jobs = jobs.len(),
            mode = %params.output_mode,
            "実行を開始します"
        );
        self.state.begin(total_files, params.output_mode);
        self.emit(RunEvent::Started {
            total_files,
            total_jobs: jobs.len(),
        });

        let mut run = RunProgress {
            jobs,
            remaining,
            file_names,
            results: ResultSet::new(),
            active: 0,
            peak_active: 0,
        };

        // 行のないスプレッドシートはその場で完了
        for index in 0..total_files {
            if run.remaining[index] == 0 {
                self.complete_file(&run.file_names[index]);
            }
        }

        let settings = RecognitionSettings::from_config(&self.config, params.force_recognition);
        let resolver = resolver_for(params.output_mode, &params.root_path, &self.config.output_folder_name);
        let ctx = Arc::new(JobContext {
            annotator: Arc::new(Annotator::new(self.engines.clone(), settings, resolver, &self.config)),
            registry: Arc::new(DocumentRegistry::new()),
            cancel: cancel.clone(),
        });

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let (tx, mut rx) = mpsc::unbounded_channel::<WorkerMessage>();
        let mut tasks = JoinSet::new();
        let mut next = 0usize;

        // 発見順に枠を取得して投入する
        while next < run.jobs.len() {
            if cancel.is_cancelled() {
                break;
            }
            tokio::select! {
                message = rx.recv() => {
                    if let Some(message) = message {
                        self.handle(&mut run, message);
                    }
                }
                permit = semaphore.clone().acquire_owned() => {
                    let Ok(permit) = permit else { break };
                    if cancel.is_cancelled() {
                        break;
                    }
                    let job = &run.jobs[next];
                    self.state.set_current(&run.file_names[job.file_index]);

                    let job_id = job.id;
                    let candidate = job.candidate.clone();
                    let ctx = ctx.clone();
                    let tx = tx.clone();
                    tasks.spawn(async move {
                        let worker_tx = tx.clone();
                        let fallback = candidate.clone();
                        let result = tokio::task::spawn_blocking(move || {
                            let report = |state| {
                                let _ = worker_tx.send(WorkerMessage::State { job_id, state });
                            };
                            job::execute(&candidate, &ctx, &report)
                        })
                        .await;
                        let (state, outcome) = match result {
                            Ok(finished) => finished,
                            Err(e) => {
                                tracing::error!(job_id, error = %e, "ワーカーが異常終了しました");
                                (JobState::Failed, Some(job::outcome(&fallback, None, Some(e.to_string()))))
                            }
                        };
                        let _ = tx.send(WorkerMessage::Finished { job_id, state, outcome });
                        drop(permit);
                    });
                    next += 1;
                }
            }
        }
        drop(tx);

        // 投入しなかったジョブは中断扱い
        if next < run.jobs.len() {
            self.state.mark_cancelled();
            tracing::info!(skipped = run.jobs.len() - next, "中断要求により残りのジョブを取り消しました");
            for job_id in next..run.jobs.len() {
                self.finish_job(&mut run, job_id, JobState::Cancelled, None);
            }
        }

        while let Some(message) = rx.recv().await {
            self.handle(&mut run, message);
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "ワーカーの終了待ちに失敗しました");
            }
        }

        if cancel.is_cancelled() {
            self.state.mark_cancelled();
        }
        let state = self.state.snapshot();
        let summary = run.results.summary();
        tracing::info!(
            total = summary.total,
            documents_found = summary.documents_found,
            identifiers_found = summary.identifiers_found,
            errors = summary.errors,
            cancelled = state.cancelled,
            peak_active = run.peak_active,
            "実行が終了しました"
        );
        self.emit(RunEvent::Finished {
            summary,
            cancelled: state.cancelled,
        });

        Ok(RunReport {
            results: run.results,
            state,
            job_states: run.jobs.iter().map(|j| j.state).collect(),
            peak_active: run.peak_active,
        })
    }

    fn handle(&self, run: &mut RunProgress, message: WorkerMessage) {
        match message {
            WorkerMessage::State { job_id, state } => {
                let job = &mut run.jobs[job_id];
                if state.is_active() && !job.state.is_active() {
                    run.active += 1;
                    run.peak_active = run.peak_active.max(run.active);
                }
                job.state = state;
                tracing::debug!(job_id, state = ?state, "ジョブ状態");
                self.emit(RunEvent::JobStateChanged { job_id, state });
            }
            WorkerMessage::Finished { job_id, state, outcome } => {
                self.finish_job(run, job_id, state, outcome);
            }
        }
    }

    fn finish_job(
        &self,
        run: &mut RunProgress,
        job_id: usize,
        state: JobState,
        outcome: Option<OutcomeRecord>,
    ) {
        let job = &mut run.jobs[job_id];
        if job.state.is_active() {
            run.active -= 1;
        }
        job.state = state;
        let file_index = job.file_index;

        // 完了順に追記し、発見順はジョブ番号で残す
        if let Some(mut outcome) = outcome {
            outcome.sequence = job_id;
            run.results.push(outcome);
        }
        self.emit(RunEvent::JobStateChanged { job_id, state });

        run.remaining[file_index] -= 1;
        if run.remaining[file_index] == 0 {
            self.complete_file(&run.file_names[file_index]);
        }
    }

    fn complete_file(&self, file: &str) {
        let (completed, total) = self.state.complete_file(file);
        tracing::info!(file, completed, total, "スプレッドシートを処理しました");
        self.emit(RunEvent::FileCompleted {
            file: file.to_string(),
            completed,
            total,
        });
    }
}

/// 実行中の集計（オーケストレーターだけが持つ）
struct RunProgress {
    jobs: Vec<AnnotationJob>,
    remaining: Vec<usize>,
    file_names: Vec<String>,
    results: ResultSet,
    active: usize,
    peak_active: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_max_concurrent_is_clamped() {
        let config = Config::default();
        let engines = Engines::system(&config);
        let orchestrator = Orchestrator::new(config.clone(), engines.clone()).with_max_concurrent(0);
        assert_eq!(orchestrator.max_concurrent, 1);

        let orchestrator = Orchestrator::new(config, engines).with_max_concurrent(64);
        assert_eq!(orchestrator.max_concurrent, MAX_CONCURRENT_JOBS);
    }

    #[tokio::test]
    async fn test_run_rejects_missing_root() {
        let config = Config::default();
        let orchestrator = Orchestrator::new(config.clone(), Engines::system(&config));
        let params = RunParameters::new("/nonexistent/fai-coc-root");

        let result = orchestrator.run(&params, CancelToken::new()).await;
        assert!(result.is_err());
        assert_eq!(orchestrator.run_state().snapshot(), RunState::default());
    }
}
