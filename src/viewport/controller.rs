use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use super::jobs::{self, ControllerDeps, FetchOutcome, JobContext};
use super::{ControllerStats, MapOutputs, Notice};
use crate::config::ViewportConfig;
use crate::error::{AppError, AppResult, ErrorCategory};
use crate::geo::{clamp_to_world, GeoRect};
use crate::logging::log_error;
use crate::models::{ActivityScope, Annotations, CameraChange, Event, TimeWindow, Viewport};

pub(super) enum Message {
    CameraChanged(CameraChange),
    PanTo(GeoRect),
    SetScope(ActivityScope),
    SetTimeWindow(TimeWindow),
    SetEvents(Vec<Event>),
    Stats(oneshot::Sender<ControllerStats>),
    FetchThrottleElapsed,
    DisplayThrottleElapsed,
    FetchFinished(AppResult<FetchOutcome>),
    Recomputed {
        seq: u64,
        result: AppResult<Annotations>,
    },
    ScopeCleared(AppResult<()>),
    RegionsCleared(AppResult<usize>),
}

/// Owner of all viewport and throttle state. Runs on a single task.
pub(super) struct ViewportController {
    ctx: Arc<JobContext>,
    fetch_throttle: Duration,
    display_throttle: Duration,

    viewport: Viewport,
    scope: ActivityScope,
    time_window: TimeWindow,
    events: Arc<Vec<Event>>,

    in_flight: usize,
    fetch_throttled: bool,
    display_throttled: bool,
    next_seq: u64,
    published_seq: u64,
    stats: ControllerStats,

    annotations_tx: watch::Sender<Annotations>,
    viewport_tx: watch::Sender<Viewport>,
    loading_tx: watch::Sender<bool>,
    notice_tx: mpsc::UnboundedSender<Notice>,
    self_tx: mpsc::WeakUnboundedSender<Message>,
}

impl ViewportController {
    pub(super) fn new(
        deps: ControllerDeps,
        config: &ViewportConfig,
        self_tx: mpsc::WeakUnboundedSender<Message>,
    ) -> (Self, MapOutputs) {
        let (annotations_tx, annotations) = watch::channel(Annotations::default());
        let (viewport_tx, viewport) = watch::channel(Viewport::default());
        let (loading_tx, loading) = watch::channel(false);
        let (notice_tx, notices) = mpsc::unbounded_channel();

        let controller = Self {
            ctx: JobContext::new(deps, config),
            fetch_throttle: config.fetch_throttle(),
            display_throttle: config.display_throttle(),
            viewport: Viewport::default(),
            scope: ActivityScope::default(),
            time_window: TimeWindow::default(),
            events: Arc::new(Vec::new()),
            in_flight: 0,
            fetch_throttled: false,
            display_throttled: false,
            next_seq: 1,
            published_seq: 0,
            stats: ControllerStats::default(),
            annotations_tx,
            viewport_tx,
            loading_tx,
            notice_tx,
            self_tx,
        };

        let outputs = MapOutputs {
            annotations,
            viewport,
            loading,
            notices,
        };
        (controller, outputs)
    }

    pub(super) async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Message>) {
        info!("Viewport controller started");
        while let Some(message) = rx.recv().await {
            self.handle(message);
        }
        debug!("Viewport controller stopped");
    }

    fn handle(&mut self, message: Message) {
        match message {
            Message::CameraChanged(change) => self.on_camera_changed(change),
            Message::PanTo(rect) => self.on_pan_to(rect),
            Message::SetScope(scope) => self.on_scope_changed(scope),
            Message::SetTimeWindow(window) => self.on_time_window_changed(window),
            Message::SetEvents(events) => {
                self.events = Arc::new(events);
                self.recompute_now();
            }
            Message::Stats(reply) => {
                let _ = reply.send(self.stats);
            }
            Message::FetchThrottleElapsed => self.fetch_throttled = false,
            Message::DisplayThrottleElapsed => {
                self.display_throttled = false;
                self.recompute_now();
            }
            Message::FetchFinished(result) => self.on_fetch_finished(result),
            Message::Recomputed { seq, result } => self.on_recomputed(seq, result),
            Message::ScopeCleared(result) => {
                if let Err(e) = result {
                    self.report("Failed to clear cache for scope switch", &e);
                }
                self.start_fetch();
                self.recompute_now();
            }
            Message::RegionsCleared(result) => {
                if let Err(e) = result {
                    self.report("Failed to invalidate fetched regions", &e);
                }
                self.start_fetch();
                self.recompute_now();
            }
        }
    }

    fn on_camera_changed(&mut self, change: CameraChange) {
        self.viewport = Viewport {
            visible_rect: change.rect,
            scale: change.scale,
            positioned_by_user: true,
        };
        self.viewport_tx.send_replace(self.viewport);

        if self.in_flight == 0 && !self.fetch_throttled {
            self.start_fetch();
            self.recompute_now();
            self.fetch_throttled = true;
            self.after(self.fetch_throttle, Message::FetchThrottleElapsed);
        }

        if !self.display_throttled {
            self.display_throttled = true;
            self.stats.recomputes_scheduled += 1;
            self.after(self.display_throttle, Message::DisplayThrottleElapsed);
        }
    }

    fn on_pan_to(&mut self, rect: GeoRect) {
        self.viewport = Viewport {
            visible_rect: rect,
            scale: self.viewport.scale,
            positioned_by_user: false,
        };
        self.viewport_tx.send_replace(self.viewport);
        self.start_fetch();
        self.recompute_now();
    }

    fn on_scope_changed(&mut self, scope: ActivityScope) {
        if scope == self.scope {
            return;
        }
        info!("Activity scope changed to {}, clearing cache", scope.as_str());
        self.scope = scope;
        self.ctx.advance_generation();

        let ctx = self.ctx.clone();
        self.spawn_job(async move { Message::ScopeCleared(jobs::clear_all(ctx).await) });
    }

    fn on_time_window_changed(&mut self, window: TimeWindow) {
        if window == self.time_window {
            return;
        }
        debug!("Time window changed to {:?}", window);
        self.time_window = window;
        self.ctx.advance_generation();

        let ctx = self.ctx.clone();
        self.spawn_job(async move { Message::RegionsCleared(jobs::clear_regions(ctx).await) });
    }

    fn start_fetch(&mut self) {
        let rect = clamp_to_world(&self.viewport.visible_rect);
        if rect.is_empty() {
            return;
        }

        let ctx = self.ctx.clone();
        let (scope, window) = (self.scope, self.time_window);
        let generation = self.ctx.generation();
        let spawned = self.spawn_job(async move {
            let result = jobs::fetch_cycle(ctx, rect, scope, window, generation).await;
            Message::FetchFinished(result)
        });
        if spawned {
            self.stats.fetch_attempts += 1;
            self.in_flight += 1;
            self.loading_tx.send_replace(true);
        }
    }

    fn on_fetch_finished(&mut self, result: AppResult<FetchOutcome>) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if self.in_flight == 0 {
            self.loading_tx.send_replace(false);
        }

        match result {
            Ok(FetchOutcome::Skipped) => {
                self.stats.fetch_skips += 1;
                debug!("Viewport already covered, fetch skipped");
            }
            Ok(FetchOutcome::Committed(summary)) => {
                self.stats.fetch_completions += 1;
                if summary.activities_added > 0 {
                    self.recompute_now();
                }
            }
            Ok(FetchOutcome::Discarded) => {
                self.stats.fetch_discards += 1;
                debug!("Fetch finished after a scope or time window switch, result dropped");
            }
            Err(e) => {
                self.stats.fetch_failures += 1;
                self.report("Activity fetch failed", &e);
            }
        }
    }

    fn recompute_now(&mut self) {
        let rect = self.viewport.visible_rect;
        if rect.is_empty() {
            return;
        }

        let seq = self.next_seq;
        let ctx = self.ctx.clone();
        let (window, events) = (self.time_window, self.events.clone());
        let spawned = self.spawn_job(async move {
            let result = jobs::recompute(ctx, rect, window, events).await;
            Message::Recomputed { seq, result }
        });
        if spawned {
            self.next_seq += 1;
            self.stats.recomputes_run += 1;
        }
    }

    fn on_recomputed(&mut self, seq: u64, result: AppResult<Annotations>) {
        match result {
            Ok(annotations) => {
                if seq < self.published_seq {
                    debug!("Dropping annotations #{} superseded by #{}", seq, self.published_seq);
                    return;
                }
                self.published_seq = seq;
                self.stats.publishes += 1;
                debug!(
                    "Publishing {} clusters and {} event clusters",
                    annotations.clusters.len(),
                    annotations.event_clusters.len()
                );
                self.annotations_tx.send_replace(annotations);
            }
            Err(e) => self.report("Annotation recompute failed", &e),
        }
    }

    /// Network failures become a notice for the user; everything else is only logged.
    fn report(&self, context: &str, error: &AppError) {
        if error.category() == ErrorCategory::Network {
            warn!("{}: {}", context, error);
            let _ = self.notice_tx.send(Notice {
                message: error.to_string(),
            });
        } else if error.is_recoverable() {
            warn!("{}: {} (retried on the next camera move)", context, error);
        } else {
            log_error(context, error);
        }
    }

    fn after(&self, delay: Duration, message: Message) {
        let Some(tx) = self.self_tx.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(message);
        });
    }

    /// Returns false once every handle is gone and nothing can receive the result.
    fn spawn_job<F>(&self, job: F) -> bool
    where
        F: Future<Output = Message> + Send + 'static,
    {
        let Some(tx) = self.self_tx.upgrade() else {
            return false;
        };
        tokio::spawn(async move {
            let _ = tx.send(job.await);
        });
        true
    }
}
