//! Drives one [`PomodoroTimer`] per user on the tokio clock.
//!
//! Each timer is owned by a spawned task that serialises user commands and
//! one-second ticks through a single `select!` loop. Completed phases go to
//! the session collector, which persists them through the store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::repo_types::{NewPomodoroSession, PomodoroCategory};
use super::services::completed_work_today;
use super::timer::{
    CompletedPhase, PomodoroSettings, PomodoroTimer, TimerError, TimerSnapshot, TimerStatus,
};
use crate::error::AppError;
use crate::store::Store;

/// How fast a timer counts, how long a completed phase lingers before
/// advancing, and how long an untouched idle timer stays alive.
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    pub tick: Duration,
    pub advance_delay: Duration,
    pub idle_timeout: Duration,
}

impl Default for Cadence {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            advance_delay: Duration::from_secs(2),
            idle_timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// A completed phase on its way to the store.
#[derive(Debug)]
pub struct RecordedPhase {
    pub user_id: Uuid,
    pub phase: CompletedPhase,
}

pub type SessionSink = mpsc::UnboundedSender<RecordedPhase>;

#[derive(Debug, Clone)]
pub enum Command {
    Start {
        task_name: Option<String>,
        category: Option<PomodoroCategory>,
    },
    Pause,
    Resume,
    Reset,
    UpdateSettings(PomodoroSettings),
    Snapshot,
}

struct Request {
    command: Command,
    reply: oneshot::Sender<Result<TimerSnapshot, TimerError>>,
}

/// The task behind a handle exited before answering.
#[derive(Debug)]
struct Stopped;

#[derive(Clone)]
pub struct TimerHandle {
    tx: mpsc::Sender<Request>,
}

impl TimerHandle {
    pub fn spawn(user_id: Uuid, timer: PomodoroTimer, sink: SessionSink, cadence: Cadence) -> Self {
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(run_timer(user_id, timer, rx, sink, cadence));
        Self { tx }
    }

    pub async fn send(&self, command: Command) -> Result<TimerSnapshot, AppError> {
        let snapshot = self
            .request(command)
            .await
            .map_err(|_| anyhow::anyhow!("pomodoro timer task stopped"))??;
        Ok(snapshot)
    }

    async fn request(&self, command: Command) -> Result<Result<TimerSnapshot, TimerError>, Stopped> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request { command, reply })
            .await
            .map_err(|_| Stopped)?;
        rx.await.map_err(|_| Stopped)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

async fn run_timer(
    user_id: Uuid,
    mut timer: PomodoroTimer,
    mut rx: mpsc::Receiver<Request>,
    sink: SessionSink,
    cadence: Cadence,
) {
    let mut ticker = interval(cadence.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut advance_at: Option<Instant> = None;
    let mut idle_since = Instant::now();

    loop {
        let running = timer.status() == TimerStatus::Running;
        let deadline = advance_at;
        let idle = timer.status() == TimerStatus::Idle && deadline.is_none();

        tokio::select! {
            request = rx.recv() => {
                let Some(Request { command, reply }) = request else {
                    break;
                };
                idle_since = Instant::now();
                let result = apply(&mut timer, command);
                if result.is_ok() && timer.status() == TimerStatus::Running && !running {
                    // A fresh full second before the first decrement.
                    ticker.reset();
                }
                if timer.status() != TimerStatus::Completed {
                    advance_at = None;
                }
                let _ = reply.send(result.map(|()| timer.snapshot()));
            }
            _ = ticker.tick(), if running => {
                if let Some(done) = timer.tick(OffsetDateTime::now_utc()) {
                    info!(%user_id, phase = ?done.phase, minutes = done.duration_minutes, "pomodoro phase completed");
                    if sink.send(RecordedPhase { user_id, phase: done }).is_err() {
                        warn!(%user_id, "session collector is gone; completed phase not recorded");
                    }
                    advance_at = Some(Instant::now() + cadence.advance_delay);
                }
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                advance_at = None;
                idle_since = Instant::now();
                match timer.advance() {
                    Ok(next) => debug!(%user_id, phase = ?next, "pomodoro advanced"),
                    Err(e) => debug!(%user_id, error = %e, "pomodoro advance skipped"),
                }
            }
            _ = sleep_until(idle_since + cadence.idle_timeout), if idle => {
                debug!(%user_id, "pomodoro timer idle, shutting down");
                break;
            }
        }
    }
    debug!(%user_id, "pomodoro timer task finished");
}

fn apply(timer: &mut PomodoroTimer, command: Command) -> Result<(), TimerError> {
    match command {
        Command::Start {
            task_name,
            category,
        } => timer.start(task_name, category),
        Command::Pause => timer.pause(),
        Command::Resume => timer.resume(),
        Command::Reset => {
            timer.reset();
            Ok(())
        }
        Command::UpdateSettings(settings) => {
            timer.update_settings(settings);
            Ok(())
        }
        Command::Snapshot => Ok(()),
    }
}

/// Live timers, one per user, created on first use.
#[derive(Clone)]
pub struct TimerRegistry {
    timers: Arc<Mutex<HashMap<Uuid, TimerHandle>>>,
    sink: SessionSink,
    cadence: Cadence,
}

impl TimerRegistry {
    pub fn new(sink: SessionSink, cadence: Cadence) -> Self {
        Self {
            timers: Arc::new(Mutex::new(HashMap::new())),
            sink,
            cadence,
        }
    }

    /// The user's timer, spawning it from stored settings and today's
    /// completed work sessions when none is live. Handles whose task has
    /// shut down are dropped on the way.
    pub async fn handle_for(&self, store: &dyn Store, user_id: Uuid) -> anyhow::Result<TimerHandle> {
        let mut timers = self.timers.lock().await;
        timers.retain(|_, handle| !handle.is_closed());
        if let Some(handle) = timers.get(&user_id) {
            return Ok(handle.clone());
        }

        let settings = store.load_settings(user_id).await?.unwrap_or_default();
        let done_today = completed_work_today(store, user_id).await?;
        let timer = PomodoroTimer::new(settings.pomodoro, done_today);
        let handle = TimerHandle::spawn(user_id, timer, self.sink.clone(), self.cadence);
        timers.insert(user_id, handle.clone());
        debug!(%user_id, done_today, "pomodoro timer spawned");
        Ok(handle)
    }

    /// Run one command against the user's timer. A task that shut down
    /// between lookup and delivery is replaced once.
    pub async fn dispatch(
        &self,
        store: &dyn Store,
        user_id: Uuid,
        command: Command,
    ) -> Result<TimerSnapshot, AppError> {
        let handle = self.handle_for(store, user_id).await?;
        match handle.request(command.clone()).await {
            Ok(result) => Ok(result?),
            Err(Stopped) => {
                debug!(%user_id, "pomodoro timer stopped mid-request, respawning");
                self.handle_for(store, user_id).await?.send(command).await
            }
        }
    }

    /// Push new settings to a live timer; no-op when the user has none. A
    /// respawned timer reads the stored settings anyway.
    pub async fn update_settings(&self, user_id: Uuid, settings: PomodoroSettings) -> Result<(), AppError> {
        let handle = self
            .timers
            .lock()
            .await
            .get(&user_id)
            .filter(|handle| !handle.is_closed())
            .cloned();
        if let Some(handle) = handle {
            if let Ok(result) = handle.request(Command::UpdateSettings(settings)).await {
                result?;
            }
        }
        Ok(())
    }

    /// Number of timers whose task is still running.
    pub async fn live_count(&self) -> usize {
        self.timers
            .lock()
            .await
            .values()
            .filter(|handle| !handle.is_closed())
            .count()
    }
}

/// Spawns the task that persists completed phases. Runs until every sink
/// clone is dropped.
pub fn spawn_collector(store: Arc<dyn Store>) -> (SessionSink, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<RecordedPhase>();
    let task = tokio::spawn(async move {
        while let Some(RecordedPhase { user_id, phase }) = rx.recv().await {
            match store
                .record_session(user_id, NewPomodoroSession::from(phase))
                .await
            {
                Ok(session) => {
                    info!(%user_id, session_id = %session.id, phase = ?session.phase, "pomodoro session recorded")
                }
                Err(e) => error!(%user_id, error = %e, "failed to record pomodoro session"),
            }
        }
    });
    (tx, task)
}
