use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::collab::{DynVoteSource, FALLBACK_MATCHUP_ID, MatchupDesigns};
use crate::combat::state::CombatState;
use crate::encode::RgbFrame;
use crate::foundation::core::SharedClock;
use crate::foundation::error::{BrawlError, BrawlResult};
use crate::render::RenderConfig;
use crate::store::{DynStore, keys};
use crate::stream::{StreamConfig, StreamTarget};

/// Where a stream reads the fight it shows.
#[async_trait]
pub trait CombatSource: Send + Sync {
    /// Latest state of the active matchup, or `None` when nothing is active yet.
    async fn latest(&self) -> BrawlResult<Option<CombatState>>;
}

/// Reads the active matchup's record straight from the shared store.
pub struct StoreCombatSource {
    store: DynStore,
}

impl StoreCombatSource {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CombatSource for StoreCombatSource {
    async fn latest(&self) -> BrawlResult<Option<CombatState>> {
        let Some(id) = self.store.get(keys::CURRENT_MATCHUP).await? else {
            return Ok(None);
        };
        let Some(raw) = self.store.get(&keys::combat(&id)).await? else {
            return Ok(None);
        };
        // a corrupt record is the coordinator's to repair; show nothing new meanwhile
        match CombatState::from_json(&raw) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                tracing::debug!(matchup_id = %id, error = %e, "unreadable combat record");
                Ok(None)
            }
        }
    }
}

/// Everything a session needs besides its target.
#[derive(Clone)]
pub struct SessionDeps {
    pub stream: StreamConfig,
    pub render: RenderConfig,
    pub source: Arc<dyn CombatSource>,
    /// Fetches generated characters when the matchup changes. `None` keeps the built-in rigs.
    pub designs: Option<DynVoteSource>,
    pub clock: SharedClock,
}

/// Counters for one session.
#[derive(Debug, Default)]
pub struct SessionStats {
    pub frames: AtomicU64,
    pub dropped: AtomicU64,
    pub spawns: AtomicU64,
}

impl SessionStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// A running output target: the frame loop plus the encoder supervisor.
pub struct StreamSession {
    target: StreamTarget,
    stop: watch::Sender<bool>,
    frame_task: JoinHandle<()>,
    supervisor: JoinHandle<()>,
    stats: Arc<SessionStats>,
}

impl StreamSession {
    /// Validate the configuration and spawn both tasks. Must be called inside a tokio runtime.
    pub fn start(target: StreamTarget, deps: SessionDeps) -> BrawlResult<Self> {
        target.validate()?;
        deps.stream.encoder.validate()?;
        let canvas = deps.render.canvas();
        let profile = &deps.stream.encoder;
        if canvas
            .upscale_factor(profile.width, profile.height)
            .is_none()
        {
            return Err(BrawlError::validation(format!(
                "virtual canvas {}x{} does not upscale evenly to {}x{}",
                canvas.width, canvas.height, profile.width, profile.height
            )));
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let (frame_tx, frame_rx) = mpsc::channel(deps.stream.queue_depth.max(1));
        let stats = Arc::new(SessionStats::default());

        let supervisor = tokio::spawn(supervise(
            target.stream_key.clone(),
            deps.stream.clone(),
            frame_rx,
            stop_rx.clone(),
            stats.clone(),
        ));
        let frame_task = tokio::spawn(generate_frames(
            target.stream_key.clone(),
            deps,
            frame_tx,
            stop_rx,
            stats.clone(),
        ));

        tracing::info!(
            stream_key = %target.stream_key,
            screen_id = %target.screen_id,
            "stream started"
        );
        Ok(Self {
            target,
            stop: stop_tx,
            frame_task,
            supervisor,
            stats,
        })
    }

    pub fn target(&self) -> &StreamTarget {
        &self.target
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn is_running(&self) -> bool {
        !*self.stop.borrow() && !self.supervisor.is_finished()
    }

    /// Stop generating frames, close the encoder's input and wait for both tasks.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        for (name, task) in [("frames", self.frame_task), ("encoder", self.supervisor)] {
            if let Err(e) = task.await {
                tracing::error!(
                    stream_key = %self.target.stream_key,
                    task = name,
                    error = %e,
                    "stream task failed"
                );
            }
        }
        tracing::info!(stream_key = %self.target.stream_key, "stream stopped");
    }
}

async fn sleep_or_stop(delay: Duration, stop: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => *stop.borrow(),
        changed = stop.changed() => changed.is_err() || *stop.borrow(),
    }
}

async fn generate_frames(
    stream_key: String,
    deps: SessionDeps,
    frames: mpsc::Sender<Vec<u8>>,
    mut stop: watch::Receiver<bool>,
    stats: Arc<SessionStats>,
) {
    let period = deps.stream.frame_interval();
    // state reads may use a quarter of the frame budget
    let read_budget = period / 4;
    let mut renderer = deps.render.build();
    let profile = &deps.stream.encoder;
    let mut frame = RgbFrame::new(profile.width, profile.height);

    let (design_tx, mut design_rx) = mpsc::channel::<(String, MatchupDesigns)>(4);
    let mut designs_for: Option<String> = None;

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let started = Instant::now();
    let mut last = started;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
        }

        match tokio::time::timeout(read_budget, deps.source.latest()).await {
            Ok(Ok(Some(state))) => {
                if designs_for.as_deref() != Some(state.matchup_id.as_str()) {
                    designs_for = Some(state.matchup_id.clone());
                    request_designs(&deps, &state.matchup_id, design_tx.clone());
                }
                renderer.sync(&state, deps.clock.now_ms());
            }
            Ok(Ok(None)) => {}
            Ok(Err(e)) => tracing::debug!(%stream_key, error = %e, "state read failed"),
            Err(_) => tracing::trace!(%stream_key, "state read over budget, reusing last state"),
        }
        while let Ok((matchup_id, designs)) = design_rx.try_recv() {
            renderer.set_designs(&matchup_id, &designs);
        }

        let now = Instant::now();
        renderer.update(now.duration_since(last).as_secs_f64() * 1000.0);
        last = now;

        let pixels = renderer.render(now.duration_since(started).as_secs_f64() * 1000.0);
        if let Err(e) = frame.fill_from(pixels) {
            tracing::warn!(%stream_key, error = %e, "frame conversion failed");
            continue;
        }
        match frames.try_send(frame.as_bytes().to_vec()) {
            Ok(()) => SessionStats::bump(&stats.frames),
            Err(mpsc::error::TrySendError::Full(_)) => SessionStats::bump(&stats.dropped),
            Err(mpsc::error::TrySendError::Closed(_)) => break,
        }
    }
    tracing::debug!(%stream_key, "frame loop finished");
}

fn request_designs(
    deps: &SessionDeps,
    matchup_id: &str,
    reply: mpsc::Sender<(String, MatchupDesigns)>,
) {
    let Some(source) = deps.designs.clone() else {
        return;
    };
    if matchup_id == FALLBACK_MATCHUP_ID {
        return;
    }
    let matchup_id = matchup_id.to_string();
    tokio::spawn(async move {
        match source.designs(&matchup_id).await {
            Ok(designs) => {
                let _ = reply.send((matchup_id, designs)).await;
            }
            Err(e) => tracing::debug!(%matchup_id, error = %e, "no designs, using built-in rigs"),
        }
    });
}

async fn forward_stderr(stream_key: String, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if !line.is_empty() {
            tracing::warn!(%stream_key, "encoder: {line}");
        }
    }
}

/// Close the encoder's input, ask it to terminate, and kill it once the grace period runs out.
async fn shut_down(stream_key: &str, mut child: Child, grace: Duration) {
    drop(child.stdin.take());
    terminate(stream_key, &child);
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => tracing::debug!(%stream_key, %status, "encoder exited"),
        Ok(Err(e)) => tracing::warn!(%stream_key, error = %e, "waiting for encoder failed"),
        Err(_) => {
            if let Err(e) = child.kill().await {
                tracing::warn!(%stream_key, error = %e, "killing encoder failed");
            }
        }
    }
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn terminate(stream_key: &str, child: &Child) {
    let Some(pid) = child.id().and_then(|id| libc::pid_t::try_from(id).ok()) else {
        return;
    };
    // SAFETY: kill(2) only reads its arguments; the pid belongs to a child we have not reaped.
    if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
        tracing::debug!(%stream_key, pid, "SIGTERM not delivered");
    }
}

#[cfg(not(unix))]
fn terminate(_stream_key: &str, _child: &Child) {}

/// Keep an encoder process alive while the session runs, feeding it queued frames.
async fn supervise(
    stream_key: String,
    cfg: StreamConfig,
    mut frames: mpsc::Receiver<Vec<u8>>,
    mut stop: watch::Receiver<bool>,
    stats: Arc<SessionStats>,
) {
    let profile = &cfg.encoder;
    tracing::debug!(%stream_key, command = %profile.command_line(&stream_key), "encoder command");

    while !*stop.borrow() {
        let mut child = match profile.command(&stream_key).spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(
                    %stream_key,
                    error = %e,
                    program = %profile.program,
                    "encoder spawn failed"
                );
                if sleep_or_stop(cfg.restart_delay(), &mut stop).await {
                    break;
                }
                continue;
            }
        };
        SessionStats::bump(&stats.spawns);
        tracing::info!(%stream_key, pid = child.id(), "encoder running");

        let mut stdin = child.stdin.take();
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(stream_key.clone(), stderr));
        }

        let exited = loop {
            tokio::select! {
                status = child.wait() => break Some(status),
                frame = frames.recv() => match frame {
                    Some(bytes) => {
                        let Some(pipe) = stdin.as_mut() else { continue };
                        // an encoder that stops reading must not pin the supervisor
                        tokio::select! {
                            written = pipe.write_all(&bytes) => {
                                if let Err(e) = written {
                                    // torn pipe while the encoder restarts; next frame retries
                                    tracing::trace!(%stream_key, error = %e, "frame write dropped");
                                }
                            }
                            status = child.wait() => break Some(status),
                            changed = stop.changed() => {
                                if changed.is_err() || *stop.borrow() {
                                    tracing::debug!(%stream_key, "stop requested mid-write");
                                    break None;
                                }
                            }
                        }
                    }
                    None => break None,
                },
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break None;
                    }
                }
            }
        };

        match exited {
            Some(status) => {
                drop(stdin);
                if *stop.borrow() {
                    break;
                }
                match status {
                    Ok(status) => tracing::warn!(
                        %stream_key,
                        %status,
                        delay_ms = cfg.restart_delay_ms,
                        "encoder exited, restarting"
                    ),
                    Err(e) => {
                        tracing::warn!(%stream_key, error = %e, "encoder wait failed, restarting")
                    }
                }
                if sleep_or_stop(cfg.restart_delay(), &mut stop).await {
                    break;
                }
            }
            None => {
                child.stdin = stdin;
                shut_down(&stream_key, child, cfg.stop_grace()).await;
                break;
            }
        }
    }
    tracing::debug!(%stream_key, "encoder supervisor finished");
}
