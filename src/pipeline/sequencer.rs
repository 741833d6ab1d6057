// file: src/pipeline/sequencer.rs
// description: probe then stages, one decision per stage, fail fast
// reference: sequential pipeline orchestration

use crate::error::{PipelineError, Result};
use crate::models::{
    AbortCause, PipelineRun, StageId, StageResolution, StageStatus, StatusBoard,
};
use crate::pipeline::probe::ConnectivityProbe;
use crate::pipeline::prompt::{Decision, DecisionPrompt};
use crate::pipeline::runner::{StageCommand, StageExecutor};
use crate::ui::{ContentUpdate, ContentUpdater, PromptUpdate, PromptUpdater, UiBridge};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Idle,
    Checking,
    Stage(StageId),
    Completed,
    Aborted,
}

impl fmt::Display for SequencerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequencerState::Idle => write!(f, "idle"),
            SequencerState::Checking => write!(f, "checking"),
            SequencerState::Stage(stage) => write!(f, "stage {}", stage.index() + 1),
            SequencerState::Completed => write!(f, "completed"),
            SequencerState::Aborted => write!(f, "aborted"),
        }
    }
}

pub struct StageSequencer {
    executor: Arc<dyn StageExecutor>,
    prompt: Arc<dyn DecisionPrompt>,
    probe: Option<Arc<dyn ConnectivityProbe>>,
    bridge: Arc<UiBridge>,
    commands: [StageCommand; 3],
    active: AtomicBool,
}

/// Clears the active flag when a run ends, however it ends.
struct ActiveRun<'a>(&'a AtomicBool);

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Per-run bookkeeping: the run record plus the board shown to the user.
struct Progress<'a> {
    run: PipelineRun,
    board: StatusBoard,
    state: SequencerState,
    bridge: &'a UiBridge,
}

impl Progress<'_> {
    fn transition(&mut self, next: SequencerState) {
        debug!("Sequencer {} -> {}", self.state, next);
        self.state = next;
    }

    fn mark(&mut self, stage: StageId, status: StageStatus) {
        self.board.set(stage, status);
        self.bridge
            .update_content(ContentUpdate::Board(self.board.clone()));
    }

    fn abort(mut self, cause: AbortCause) -> PipelineRun {
        warn!("Pipeline aborted: {}", cause);
        self.transition(SequencerState::Aborted);
        self.run.abort(cause);
        self.run
    }
}

impl StageSequencer {
    /// `commands` must list generation, processing and assembly in that
    /// order, each with its own execution mode.
    pub fn new(
        executor: Arc<dyn StageExecutor>,
        prompt: Arc<dyn DecisionPrompt>,
        bridge: Arc<UiBridge>,
        commands: [StageCommand; 3],
    ) -> Result<Self> {
        for (command, expected) in commands.iter().zip(StageId::ALL) {
            if command.stage != expected {
                return Err(PipelineError::Config(format!(
                    "stage {} must be {expected}, got {}",
                    expected.index() + 1,
                    command.stage
                )));
            }
            if command.mode != expected.execution_mode() {
                return Err(PipelineError::Config(format!(
                    "{expected} must run in {:?} mode, got {:?}",
                    expected.execution_mode(),
                    command.mode
                )));
            }
        }

        Ok(Self {
            executor,
            prompt,
            probe: None,
            bridge,
            commands,
            active: AtomicBool::new(false),
        })
    }

    pub fn with_probe(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Run with the given updaters installed on the bridge; the previous
    /// mode is back in place when this returns or unwinds.
    ///
    /// A rejected request never touches the bridge.
    pub async fn run_with_ui(
        &self,
        content: ContentUpdater,
        prompt: PromptUpdater,
    ) -> Result<PipelineRun> {
        let _active = self.claim()?;
        let _mode = self.bridge.set_mode(Some(content), Some(prompt));
        Ok(self.run_stages().await)
    }

    /// One full pass: optional probe, then each stage in order.
    ///
    /// Stage and probe failures end up in the returned run, not as `Err`.
    /// The only error is a second run while one is still active.
    pub async fn run(&self) -> Result<PipelineRun> {
        let _active = self.claim()?;
        Ok(self.run_stages().await)
    }

    fn claim(&self) -> Result<ActiveRun<'_>> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Run request rejected: a run is already active");
            return Err(PipelineError::RunInProgress);
        }
        Ok(ActiveRun(&self.active))
    }

    async fn run_stages(&self) -> PipelineRun {
        let mut progress = Progress {
            run: PipelineRun::new(),
            board: StatusBoard::new(),
            state: SequencerState::Idle,
            bridge: &self.bridge,
        };
        info!("Pipeline run {} started", progress.run.id);
        progress
            .bridge
            .update_content(ContentUpdate::Board(progress.board.clone()));

        progress.transition(SequencerState::Checking);
        if let Some(probe) = &self.probe {
            match probe.check().await {
                Ok(reply) => {
                    info!("Connectivity check passed ({})", reply);
                    progress.run.ai_check_result = Some(true);
                }
                Err(e) => {
                    error!("Connectivity check failed: {}", e);
                    progress.run.ai_check_result = Some(false);
                    let detail = match e {
                        PipelineError::ConnectivityCheck(detail) => detail,
                        other => other.to_string(),
                    };
                    return progress.abort(AbortCause::ConnectivityCheck { detail });
                }
            }
        }

        for command in &self.commands {
            let stage = command.stage;
            progress.transition(SequencerState::Stage(stage));

            let question = PromptUpdate {
                stage: Some(stage),
                text: stage.prompt_text(),
            };
            if !self.bridge.update_prompt(question) {
                info!("{}", stage.prompt_text());
            }
            let decision = match self.prompt.decide(stage).await {
                Ok(decision) => decision,
                Err(e) => {
                    warn!("No decision for {}: {}", stage, e);
                    Decision::Abort
                }
            };

            match decision {
                Decision::Abort => {
                    return progress.abort(AbortCause::UserAbort { stage });
                }
                Decision::Skip => {
                    info!("Skipping {}", stage);
                    progress.run.record(stage, StageResolution::Skipped);
                    progress.mark(stage, StageStatus::Skipped);
                }
                Decision::Run => {
                    progress.mark(stage, StageStatus::Running);
                    let outcome = self.executor.execute(command).await;
                    let detail = outcome.summary();
                    let resolution = StageResolution::Ran(outcome);
                    let proceed = resolution.allows_next();
                    progress.mark(stage, resolution.status());
                    progress.run.record(stage, resolution);

                    if !proceed {
                        return progress.abort(AbortCause::StageFailed { stage, detail });
                    }
                }
            }
        }

        progress.transition(SequencerState::Completed);
        info!("Pipeline run {} completed", progress.run.id);
        progress.run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExecutionMode, ProgressSignal, StageOutcome, StageStatus};
    use crate::pipeline::prompt::PresetPrompt;
    use crate::pipeline::runner::ProcessRunner;
    use crate::pipeline::log_sink::FileLogSink;
    use crate::ui::UiMode;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Executor that answers from a table of exit codes and counts calls.
    #[derive(Default)]
    struct ScriptedExecutor {
        exit_codes: HashMap<StageId, i32>,
        calls: Mutex<Vec<StageId>>,
        delay: Option<Duration>,
    }

    impl ScriptedExecutor {
        fn failing(stage: StageId, code: i32) -> Self {
            let mut exit_codes = HashMap::new();
            exit_codes.insert(stage, code);
            Self {
                exit_codes,
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<StageId> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StageExecutor for ScriptedExecutor {
        async fn execute(&self, command: &StageCommand) -> StageOutcome {
            self.calls.lock().unwrap().push(command.stage);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let code = self.exit_codes.get(&command.stage).copied().unwrap_or(0);
            StageOutcome::from_exit(command.stage, code, String::new(), String::new())
        }
    }

    struct FixedProbe {
        ok: bool,
        calls: AtomicUsize,
    }

    impl FixedProbe {
        fn new(ok: bool) -> Self {
            Self {
                ok,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ConnectivityProbe for FixedProbe {
        async fn check(&self) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.ok {
                Ok("Status: OK".to_string())
            } else {
                Err(PipelineError::ConnectivityCheck(
                    "HTTP 503: unavailable".to_string(),
                ))
            }
        }
    }

    fn commands() -> [StageCommand; 3] {
        StageId::ALL.map(|stage| StageCommand {
            stage,
            executable: PathBuf::from("python3"),
            script: PathBuf::from(format!("{stage}.py")),
            args: Vec::new(),
            mode: stage.execution_mode(),
        })
    }

    fn sequencer(
        executor: Arc<ScriptedExecutor>,
        prompt: PresetPrompt,
        bridge: Arc<UiBridge>,
    ) -> StageSequencer {
        StageSequencer::new(executor, Arc::new(prompt), bridge, commands()).unwrap()
    }

    #[test]
    fn test_commands_out_of_order_are_rejected() {
        let mut swapped = commands();
        swapped.swap(0, 2);
        let result = StageSequencer::new(
            Arc::new(ScriptedExecutor::default()),
            Arc::new(PresetPrompt::new(Decision::Run)),
            Arc::new(UiBridge::new()),
            swapped,
        );
        let err = result.err().unwrap();
        assert!(matches!(err, PipelineError::Config(_)));
        assert!(err.to_string().contains("stage 1 must be generation"));
    }

    #[test]
    fn test_wrong_execution_mode_is_rejected() {
        let mut batch_processing = commands();
        batch_processing[1].mode = ExecutionMode::Batch;
        let result = StageSequencer::new(
            Arc::new(ScriptedExecutor::default()),
            Arc::new(PresetPrompt::new(Decision::Run)),
            Arc::new(UiBridge::new()),
            batch_processing,
        );
        assert!(matches!(result, Err(PipelineError::Config(_))));

        let mut streaming_assembly = commands();
        streaming_assembly[2].mode = ExecutionMode::Streaming;
        let result = StageSequencer::new(
            Arc::new(ScriptedExecutor::default()),
            Arc::new(PresetPrompt::new(Decision::Run)),
            Arc::new(UiBridge::new()),
            streaming_assembly,
        );
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[tokio::test]
    async fn test_all_stages_succeed() {
        let executor = Arc::new(ScriptedExecutor::default());
        let seq = sequencer(
            executor.clone(),
            PresetPrompt::new(Decision::Run),
            Arc::new(UiBridge::new()),
        )
        .with_probe(Arc::new(FixedProbe::new(true)));

        let run = seq.run().await.unwrap();

        assert!(run.succeeded());
        assert_eq!(run.ai_check_result, Some(true));
        assert_eq!(executor.calls(), StageId::ALL.to_vec());
        assert_eq!(run.outcomes().len(), 3);
        assert!(!seq.is_running());
    }

    #[tokio::test]
    async fn test_probe_failure_runs_nothing() {
        let executor = Arc::new(ScriptedExecutor::default());
        let probe = Arc::new(FixedProbe::new(false));
        let seq = sequencer(
            executor.clone(),
            PresetPrompt::new(Decision::Run),
            Arc::new(UiBridge::new()),
        )
        .with_probe(probe.clone());

        let run = seq.run().await.unwrap();

        assert!(!run.succeeded());
        assert_eq!(run.ai_check_result, Some(false));
        assert!(executor.calls().is_empty());
        assert!(run.stages.is_empty());
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            run.abort_cause,
            Some(AbortCause::ConnectivityCheck {
                detail: "HTTP 503: unavailable".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_second_stage_failure_stops_pipeline() {
        let executor = Arc::new(ScriptedExecutor::failing(StageId::Processing, 1));
        let seq = sequencer(
            executor.clone(),
            PresetPrompt::new(Decision::Run),
            Arc::new(UiBridge::new()),
        )
        .with_probe(Arc::new(FixedProbe::new(true)));

        let run = seq.run().await.unwrap();

        assert!(!run.succeeded());
        assert_eq!(
            executor.calls(),
            vec![StageId::Generation, StageId::Processing]
        );
        let outcomes = run.outcomes();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].success);
        assert!(!outcomes[1].success);
        assert_eq!(run.resolution(StageId::Assembly), StageResolution::NotRun);
        assert_eq!(
            run.abort_cause,
            Some(AbortCause::StageFailed {
                stage: StageId::Processing,
                detail: "exit code 1".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_skip_moves_on_without_executing() {
        let executor = Arc::new(ScriptedExecutor::default());
        let prompt =
            PresetPrompt::new(Decision::Run).with(StageId::Generation, Decision::Skip);
        let seq = sequencer(executor.clone(), prompt, Arc::new(UiBridge::new()));

        let run = seq.run().await.unwrap();

        assert!(run.succeeded());
        assert_eq!(run.ai_check_result, None);
        assert_eq!(
            executor.calls(),
            vec![StageId::Processing, StageId::Assembly]
        );
        assert_eq!(run.resolution(StageId::Generation), StageResolution::Skipped);
        assert_eq!(run.status_board().get(StageId::Generation), StageStatus::Skipped);
    }

    #[tokio::test]
    async fn test_abort_before_stage_stops_everything_after() {
        let executor = Arc::new(ScriptedExecutor::default());
        let prompt =
            PresetPrompt::new(Decision::Run).with(StageId::Processing, Decision::Abort);
        let seq = sequencer(executor.clone(), prompt, Arc::new(UiBridge::new()));

        let run = seq.run().await.unwrap();

        assert!(!run.succeeded());
        assert_eq!(executor.calls(), vec![StageId::Generation]);
        assert_eq!(
            run.abort_cause,
            Some(AbortCause::UserAbort {
                stage: StageId::Processing
            })
        );
    }

    #[tokio::test]
    async fn test_concurrent_run_is_rejected() {
        let executor = Arc::new(ScriptedExecutor {
            delay: Some(Duration::from_millis(200)),
            ..Default::default()
        });
        let seq = Arc::new(sequencer(
            executor.clone(),
            PresetPrompt::new(Decision::Run),
            Arc::new(UiBridge::new()),
        ));

        let first = {
            let seq = seq.clone();
            tokio::spawn(async move { seq.run().await })
        };
        while !seq.is_running() {
            tokio::task::yield_now().await;
        }

        let second = seq.run().await;
        assert!(matches!(second, Err(PipelineError::RunInProgress)));

        let run = first.await.unwrap().unwrap();
        assert!(run.succeeded());
        assert_eq!(executor.calls().len(), 3);

        // Free again once the first run is over.
        assert!(seq.run().await.is_ok());
    }

    #[tokio::test]
    async fn test_run_with_ui_restores_mode_and_posts_updates() {
        let bridge = Arc::new(UiBridge::new());
        let boards = Arc::new(Mutex::new(Vec::new()));
        let prompts = Arc::new(Mutex::new(Vec::new()));

        let content: ContentUpdater = {
            let boards = boards.clone();
            Arc::new(move |update: ContentUpdate| {
                if let ContentUpdate::Board(board) = update {
                    boards.lock().unwrap().push(board);
                }
            })
        };
        let prompt: PromptUpdater = {
            let prompts = prompts.clone();
            Arc::new(move |update: PromptUpdate| prompts.lock().unwrap().push(update.stage))
        };

        let executor = Arc::new(ScriptedExecutor::failing(StageId::Assembly, 4));
        let seq = sequencer(executor, PresetPrompt::new(Decision::Run), bridge.clone());

        assert_eq!(bridge.mode(), UiMode::Inactive);
        let run = seq.run_with_ui(content, prompt).await.unwrap();
        assert_eq!(bridge.mode(), UiMode::Inactive);
        assert!(!run.succeeded());

        let prompts = prompts.lock().unwrap().clone();
        assert_eq!(
            prompts,
            StageId::ALL.into_iter().map(Some).collect::<Vec<_>>()
        );

        let boards = boards.lock().unwrap();
        let last = boards.last().unwrap();
        assert_eq!(last.get(StageId::Generation), StageStatus::Done);
        assert_eq!(last.get(StageId::Processing), StageStatus::Done);
        assert_eq!(last.get(StageId::Assembly), StageStatus::Failed);
        assert!(boards.iter().any(|b| b.get(StageId::Processing) == StageStatus::Running));
    }

    /// Keeps posting progress until told to stop, so a foreign updater
    /// installed mid-run would be hit.
    struct ChattyExecutor {
        bridge: Arc<UiBridge>,
        stop: AtomicBool,
    }

    #[async_trait]
    impl StageExecutor for ChattyExecutor {
        async fn execute(&self, command: &StageCommand) -> StageOutcome {
            while command.stage == StageId::Generation && !self.stop.load(Ordering::SeqCst) {
                self.bridge.update_content(ContentUpdate::Progress {
                    stage: command.stage,
                    signal: ProgressSignal::message("working"),
                });
                tokio::task::yield_now().await;
            }
            StageOutcome::from_exit(command.stage, 0, String::new(), String::new())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_rejected_run_with_ui_leaves_active_updaters_alone() {
        let bridge = Arc::new(UiBridge::new());
        let executor = Arc::new(ChattyExecutor {
            bridge: bridge.clone(),
            stop: AtomicBool::new(false),
        });
        let seq = Arc::new(
            StageSequencer::new(
                executor.clone(),
                Arc::new(PresetPrompt::new(Decision::Run)),
                bridge.clone(),
                commands(),
            )
            .unwrap(),
        );

        let counter = |hits: Arc<AtomicUsize>| -> ContentUpdater {
            Arc::new(move |update: ContentUpdate| {
                if matches!(update, ContentUpdate::Progress { .. }) {
                    hits.fetch_add(1, Ordering::SeqCst);
                }
            })
        };
        let quiet = || -> PromptUpdater { Arc::new(|_: PromptUpdate| {}) };

        let first_hits = Arc::new(AtomicUsize::new(0));
        let first = {
            let seq = seq.clone();
            let content = counter(first_hits.clone());
            tokio::spawn(async move { seq.run_with_ui(content, quiet()).await })
        };
        while first_hits.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let second_hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..500 {
            let rejected = seq
                .run_with_ui(counter(second_hits.clone()), quiet())
                .await;
            assert!(matches!(rejected, Err(PipelineError::RunInProgress)));
            tokio::task::yield_now().await;
        }
        assert_eq!(bridge.mode(), UiMode::Active);

        executor.stop.store(true, Ordering::SeqCst);
        let run = first.await.unwrap().unwrap();

        assert!(run.succeeded());
        assert_eq!(second_hits.load(Ordering::SeqCst), 0);
        assert!(first_hits.load(Ordering::SeqCst) > 0);
        assert_eq!(bridge.mode(), UiMode::Inactive);
    }

    #[tokio::test]
    async fn test_batch_failure_end_to_end() {
        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("fails.sh");
        std::fs::write(&script, "echo starting\nexit 1\n").unwrap();

        let bridge = Arc::new(UiBridge::new());
        let sink = FileLogSink::new([
            dir.path().join("one.log"),
            dir.path().join("two.log"),
            dir.path().join("three.log"),
        ]);
        let runner = ProcessRunner::new(bridge.clone(), Arc::new(sink));
        let commands = StageId::ALL.map(|stage| StageCommand {
            stage,
            executable: PathBuf::from("sh"),
            script: if stage == StageId::Generation {
                script.clone()
            } else {
                dir.path().join("never-runs.sh")
            },
            args: Vec::new(),
            mode: stage.execution_mode(),
        });
        let seq = StageSequencer::new(
            Arc::new(runner),
            Arc::new(PresetPrompt::new(Decision::Run)),
            bridge,
            commands,
        )
        .unwrap();

        let run = seq.run().await.unwrap();

        assert!(!run.succeeded());
        let outcomes = run.outcomes();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].exit_code, 1);
        assert_eq!(outcomes[0].stdout_tail, "starting");
    }
}
