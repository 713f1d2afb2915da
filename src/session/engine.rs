//! Recognition session engine
//!
//! One tokio task owns all session state and processes events one at a
//! time: commands, countdown ticks, finished capture cycles, cooldown and
//! retry deadlines, cadence ticks. Capture+predict round trips run on
//! spawned tasks and post their result back tagged with the generation
//! they were launched under. Mistake snapshots are captured the same way
//! and tagged with the run they belong to; a completed session waits up to
//! the snapshot timeout for the ones still outstanding.
//!
//! When a countdown expiry and a finished cycle are ready at the same
//! instant the expiry is handled first; the sample then arrives stale.

use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use super::config::{ConfigError, SessionConfig};
use super::plan::TargetPlan;
use super::scheduler::{CaptureScheduler, CycleDecision, InFlight};
use super::state::{Advance, MatchFeedback, Phase, PracticeSession, SessionStats};
use super::timer::{TimeoutTimer, TimerEvent};
use crate::recognition::{
    FrameSource, ImageFrame, PredictionSample, RecognitionError, SignPredictor, StableResult,
};

/// UI hooks. Every method defaults to doing nothing.
pub trait SessionObserver: Send {
    /// A new target became active
    fn on_target(&mut self, _index: usize, _target: &str) {}

    /// Raw classifier output, before smoothing or gating
    fn on_prediction(&mut self, _sample: &PredictionSample) {}

    fn on_stable(&mut self, _result: &StableResult) {}

    fn on_sign_learned(&mut self, _target: &str, _feedback: &MatchFeedback) {}

    fn on_timeout(&mut self, _target: &str) {}

    /// Whole seconds left on the active target
    fn on_tick(&mut self, _remaining_secs: u64) {}

    /// A cycle or readiness probe failed. `persistent` is set once
    /// unreadiness has lasted long enough to show the learner.
    fn on_prediction_error(&mut self, _error: &RecognitionError, _persistent: bool) {}

    fn on_complete(&mut self, _stats: &SessionStats) {}
}

/// Observer that ignores everything
pub struct NullObserver;

impl SessionObserver for NullObserver {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineCommand {
    Stop,
    Pause,
    Resume,
    /// Zero the stats, regenerate targets and start over
    Restart,
}

/// How a run ended
#[derive(Clone, Debug, PartialEq)]
pub enum SessionOutcome {
    Completed(SessionStats),
    Stopped(SessionStats),
}

impl SessionOutcome {
    pub fn stats(&self) -> &SessionStats {
        match self {
            SessionOutcome::Completed(stats) | SessionOutcome::Stopped(stats) => stats,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, SessionOutcome::Completed(_))
    }
}

/// Cloneable sender for engine commands. Sends to an engine that has
/// already finished are dropped.
#[derive(Clone, Debug)]
pub struct EngineCommands {
    tx: mpsc::UnboundedSender<EngineCommand>,
}

impl EngineCommands {
    pub fn send(&self, command: EngineCommand) {
        if self.tx.send(command).is_err() {
            debug!(?command, "engine gone, command dropped");
        }
    }

    pub fn stop(&self) {
        self.send(EngineCommand::Stop);
    }

    pub fn pause(&self) {
        self.send(EngineCommand::Pause);
    }

    pub fn resume(&self) {
        self.send(EngineCommand::Resume);
    }

    pub fn restart(&self) {
        self.send(EngineCommand::Restart);
    }
}

/// A spawned engine
pub struct EngineHandle {
    commands: EngineCommands,
    task: JoinHandle<SessionOutcome>,
}

impl EngineHandle {
    pub fn commands(&self) -> &EngineCommands {
        &self.commands
    }

    pub async fn join(self) -> Result<SessionOutcome, JoinError> {
        self.task.await
    }

    /// Stop the session and wait for the loop to wind down.
    pub async fn dispose(self) -> Result<SessionOutcome, JoinError> {
        self.commands.stop();
        self.join().await
    }
}

/// Result of one spawned task
#[derive(Debug)]
enum CycleEvent {
    Readiness(Result<bool, RecognitionError>),
    Prediction {
        generation: u64,
        retry: bool,
        result: Result<PredictionSample, RecognitionError>,
    },
    /// Frame for a missed target; `None` when the capture failed
    Snapshot {
        run: u64,
        mistake_index: usize,
        frame: Option<ImageFrame>,
    },
}

pub struct RecognitionEngine {
    config: SessionConfig,
    plan: TargetPlan,
    session: PracticeSession,
    scheduler: CaptureScheduler,
    timer: TimeoutTimer,
    source: Arc<dyn FrameSource>,
    predictor: Arc<dyn SignPredictor>,
    observer: Box<dyn SessionObserver>,
    events_tx: mpsc::UnboundedSender<CycleEvent>,
    events_rx: mpsc::UnboundedReceiver<CycleEvent>,
    commands_tx: mpsc::UnboundedSender<EngineCommand>,
    commands_rx: mpsc::UnboundedReceiver<EngineCommand>,
    /// Consecutive failed readiness probes
    failed_probes: u32,
    /// Bumped on every reset so snapshots from an earlier run are dropped
    runs: u64,
    pending_snapshots: usize,
}

impl RecognitionEngine {
    pub fn new(
        config: SessionConfig,
        plan: TargetPlan,
        source: Arc<dyn FrameSource>,
        predictor: Arc<dyn SignPredictor>,
        observer: Box<dyn SessionObserver>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        Ok(RecognitionEngine {
            session: PracticeSession::new(Vec::new(), &config),
            scheduler: CaptureScheduler::new(config.capture_interval),
            timer: TimeoutTimer::new(config.tick),
            config,
            plan,
            source,
            predictor,
            observer,
            events_tx,
            events_rx,
            commands_tx,
            commands_rx,
            failed_probes: 0,
            runs: 0,
            pending_snapshots: 0,
        })
    }

    pub fn commands(&self) -> EngineCommands {
        EngineCommands {
            tx: self.commands_tx.clone(),
        }
    }

    pub fn session(&self) -> &PracticeSession {
        &self.session
    }

    /// Run the engine on its own task.
    pub fn spawn(mut self) -> EngineHandle {
        let commands = self.commands();
        let task = tokio::spawn(async move { self.run().await });
        EngineHandle { commands, task }
    }

    /// Drive one session until it completes or is stopped. Calling it
    /// again starts a fresh session.
    pub async fn run(&mut self) -> SessionOutcome {
        let mut cadence = time::interval(self.scheduler.period());
        cadence.set_missed_tick_behavior(MissedTickBehavior::Delay);

        if let ControlFlow::Break(outcome) = self.reset(Instant::now()) {
            return self.conclude(outcome).await;
        }

        loop {
            let timer_at = self.timer.next_wakeup();
            let cooldown_at = self.scheduler.cooldown_until();
            let retry_at = self.scheduler.retry_at();

            let step = tokio::select! {
                biased;
                command = self.commands_rx.recv() => self.on_command(command),
                _ = wait_until(timer_at) => self.on_timer(),
                Some(event) = self.events_rx.recv() => self.on_cycle_event(event),
                _ = wait_until(cooldown_at) => self.on_cooldown_elapsed(),
                _ = wait_until(retry_at) => {
                    self.on_retry_due();
                    ControlFlow::Continue(())
                }
                _ = cadence.tick() => {
                    self.on_cadence();
                    ControlFlow::Continue(())
                }
            };

            if let ControlFlow::Break(outcome) = step {
                return self.conclude(outcome).await;
            }
        }
    }

    /// Completion waits for outstanding snapshots, bounded by the snapshot
    /// timeout, then reports the final stats.
    async fn conclude(&mut self, outcome: SessionOutcome) -> SessionOutcome {
        if !outcome.is_completed() {
            return outcome;
        }

        if self.pending_snapshots > 0 {
            let bound = self.config.snapshot_timeout;
            if time::timeout(bound, self.drain_snapshots()).await.is_err() {
                debug!(pending = self.pending_snapshots, "completing without snapshots");
            }
        }

        let stats = self.session.stats().clone();
        self.observer.on_complete(&stats);
        SessionOutcome::Completed(stats)
    }

    async fn drain_snapshots(&mut self) {
        while self.pending_snapshots > 0 {
            match self.events_rx.recv().await {
                Some(CycleEvent::Snapshot {
                    run,
                    mistake_index,
                    frame,
                }) => self.on_snapshot(run, mistake_index, frame),
                Some(_) => self.finish_in_flight(),
                None => break,
            }
        }
    }

    /// Fresh targets, zeroed stats. Activation waits for readiness.
    fn reset(&mut self, now: Instant) -> ControlFlow<SessionOutcome> {
        let targets = self.plan.generate(&mut rand::thread_rng());
        info!(?targets, mode = ?self.config.mode, "preparing session");
        self.runs += 1;
        self.pending_snapshots = 0;

        self.session.stop();
        self.session.set_targets(targets);
        self.timer.cancel();
        self.scheduler.stop();
        self.scheduler.resume();
        self.scheduler.start();

        if self.scheduler.is_ready() {
            let advance = self.session.start(now);
            self.apply_advance(advance, now)
        } else {
            ControlFlow::Continue(())
        }
    }

    fn shutdown(&mut self) -> SessionOutcome {
        self.session.stop();
        self.timer.cancel();
        self.scheduler.stop();
        SessionOutcome::Stopped(self.session.stats().clone())
    }

    fn on_command(&mut self, command: Option<EngineCommand>) -> ControlFlow<SessionOutcome> {
        let now = Instant::now();
        match command {
            Some(EngineCommand::Pause) => {
                self.scheduler.pause();
                self.timer.pause(now);
                info!("session paused");
            }
            Some(EngineCommand::Resume) => {
                self.scheduler.resume();
                self.timer.resume(now);
                info!("session resumed");
            }
            Some(EngineCommand::Restart) => return self.reset(now),
            Some(EngineCommand::Stop) | None => return ControlFlow::Break(self.shutdown()),
        }
        ControlFlow::Continue(())
    }

    fn on_timer(&mut self) -> ControlFlow<SessionOutcome> {
        let now = Instant::now();
        match self.timer.poll(now) {
            Some(TimerEvent::Tick { remaining_secs }) => self.observer.on_tick(remaining_secs),
            Some(TimerEvent::Expired { generation }) => {
                if let Some(miss) = self.session.expire(generation) {
                    self.launch_snapshot(miss.mistake_index);
                    self.observer.on_timeout(&miss.target);

                    if let Some(advance) = self.session.advance(now) {
                        return self.apply_advance(advance, now);
                    }
                }
            }
            None => {}
        }
        ControlFlow::Continue(())
    }

    fn on_snapshot(&mut self, run: u64, mistake_index: usize, frame: Option<ImageFrame>) {
        if run != self.runs {
            debug!(run, current = self.runs, "discarding snapshot from an earlier run");
            return;
        }
        self.pending_snapshots = self.pending_snapshots.saturating_sub(1);
        if let Some(frame) = frame {
            self.session.attach_snapshot(mistake_index, frame);
        }
    }

    fn on_cycle_event(&mut self, event: CycleEvent) -> ControlFlow<SessionOutcome> {
        let now = Instant::now();
        match event {
            CycleEvent::Readiness(result) => {
                self.finish_in_flight();
                self.on_readiness(result, now)
            }
            CycleEvent::Prediction {
                generation,
                retry,
                result,
            } => {
                self.finish_in_flight();
                self.on_prediction(generation, retry, result, now);
                ControlFlow::Continue(())
            }
            // snapshots run beside the cycle and never hold the in-flight slot
            CycleEvent::Snapshot {
                run,
                mistake_index,
                frame,
            } => {
                self.on_snapshot(run, mistake_index, frame);
                ControlFlow::Continue(())
            }
        }
    }

    fn finish_in_flight(&mut self) {
        let finished = self.scheduler.finish();
        trace!(?finished, "spawned work finished");
    }

    fn on_readiness(
        &mut self,
        result: Result<bool, RecognitionError>,
        now: Instant,
    ) -> ControlFlow<SessionOutcome> {
        match result {
            Ok(true) => {
                info!(after = self.failed_probes, "recognition model ready");
                self.failed_probes = 0;
                self.scheduler.set_ready(true);
                if self.session.phase() == Phase::Idle {
                    let advance = self.session.start(now);
                    return self.apply_advance(advance, now);
                }
            }
            Ok(false) => self.report_unready(None),
            Err(error) => self.report_unready(Some(error)),
        }
        ControlFlow::Continue(())
    }

    /// Any failed probe counts as unreadiness; the cause is only logged.
    fn report_unready(&mut self, cause: Option<RecognitionError>) {
        self.failed_probes += 1;
        match cause {
            Some(cause) => warn!(%cause, attempt = self.failed_probes, "readiness probe failed"),
            None => debug!(attempt = self.failed_probes, "model still loading"),
        }

        let error = RecognitionError::NotReady {
            attempts: self.failed_probes,
        };
        let persistent = error.is_persistent(self.config.unready_alert_after);
        self.observer.on_prediction_error(&error, persistent);
    }

    fn on_prediction(
        &mut self,
        generation: u64,
        retry: bool,
        result: Result<PredictionSample, RecognitionError>,
        now: Instant,
    ) {
        if generation != self.session.generation() {
            debug!(
                generation,
                current = self.session.generation(),
                "discarding stale cycle result"
            );
            return;
        }

        match result {
            Ok(sample) => {
                self.observer.on_prediction(&sample);
                if let Some(ingest) = self.session.ingest(generation, &sample, now) {
                    self.observer.on_stable(&ingest.stable);
                    if let Some(feedback) = ingest.matched {
                        self.timer.cancel();
                        self.scheduler.begin_cooldown(now + self.config.match_cooldown);
                        self.observer.on_sign_learned(&feedback.target, &feedback);
                    }
                }
            }
            Err(error) => {
                warn!(%error, retry, "recognition cycle failed");
                self.observer.on_prediction_error(&error, false);
                if error.is_retriable() && !retry {
                    self.scheduler.schedule_retry(now + self.config.retry_delay);
                }
            }
        }
    }

    fn on_cooldown_elapsed(&mut self) -> ControlFlow<SessionOutcome> {
        self.scheduler.end_cooldown();
        let now = Instant::now();
        match self.session.advance(now) {
            Some(advance) => self.apply_advance(advance, now),
            None => ControlFlow::Continue(()),
        }
    }

    fn on_retry_due(&mut self) {
        if self
            .scheduler
            .take_retry(Instant::now(), self.session.is_active())
        {
            debug!("retrying after transient fault");
            self.launch_cycle(true);
        }
    }

    fn on_cadence(&mut self) {
        match self
            .scheduler
            .on_tick(Instant::now(), self.session.is_active())
        {
            CycleDecision::Capture => self.launch_cycle(false),
            CycleDecision::ProbeReadiness => self.launch_probe(),
            CycleDecision::Skip(reason) => trace!(?reason, "cadence tick skipped"),
        }
    }

    fn apply_advance(&mut self, advance: Advance, now: Instant) -> ControlFlow<SessionOutcome> {
        match advance {
            Advance::Next {
                index,
                target,
                generation,
            } => {
                self.timer.arm(generation, self.config.item_timeout, now);
                if self.scheduler.is_paused() {
                    self.timer.pause(now);
                }
                self.observer.on_target(index, &target);
                if let Some(secs) = self.timer.remaining_secs(now) {
                    self.observer.on_tick(secs);
                }
                ControlFlow::Continue(())
            }
            Advance::Complete(stats) => {
                self.timer.cancel();
                self.scheduler.stop();
                ControlFlow::Break(SessionOutcome::Completed(stats))
            }
        }
    }

    fn launch_probe(&mut self) {
        self.scheduler.launch(InFlight::Probe);
        let predictor = Arc::clone(&self.predictor);
        let events = self.events_tx.clone();
        let bound = self.config.readiness_timeout;

        tokio::spawn(async move {
            let result = match time::timeout(bound, predictor.ready()).await {
                Ok(result) => result,
                Err(_) => Err(RecognitionError::Transport(format!(
                    "readiness check timed out after {:?}",
                    bound
                ))),
            };
            let _ = events.send(CycleEvent::Readiness(result));
        });
    }

    /// Best effort: a slow or failed capture leaves the mistake without one.
    fn launch_snapshot(&mut self, mistake_index: usize) {
        self.pending_snapshots += 1;
        let run = self.runs;
        let source = Arc::clone(&self.source);
        let events = self.events_tx.clone();
        let bound = self.config.snapshot_timeout;

        tokio::spawn(async move {
            let frame = match time::timeout(bound, source.capture()).await {
                Ok(Ok(frame)) => Some(frame),
                Ok(Err(error)) => {
                    debug!(%error, "snapshot skipped");
                    None
                }
                Err(_) => {
                    debug!("snapshot timed out");
                    None
                }
            };
            let _ = events.send(CycleEvent::Snapshot {
                run,
                mistake_index,
                frame,
            });
        });
    }

    fn launch_cycle(&mut self, retry: bool) {
        let generation = self.session.generation();
        self.scheduler.launch(InFlight::Predict);
        let source = Arc::clone(&self.source);
        let predictor = Arc::clone(&self.predictor);
        let events = self.events_tx.clone();

        tokio::spawn(async move {
            let result = match source.capture().await {
                Ok(frame) => predictor.predict(&frame).await,
                Err(error) => Err(error),
            };
            let _ = events.send(CycleEvent::Prediction {
                generation,
                retry,
                result,
            });
        });
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
