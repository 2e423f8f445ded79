//! Viewport controller.
//!
//! Camera events go through two independent throttles: a fetch window that
//! limits how often the coverage decider (and possibly the network) runs, and a
//! display window that schedules one annotation recompute per burst. A single
//! owner task holds the viewport and throttle state. Store I/O, network fetches
//! and clustering run as background jobs and report back through the owner's
//! message channel. Results are published on watch channels, so the most recent
//! publish wins.

mod controller;
mod jobs;

pub use jobs::ControllerDeps;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::config::ViewportConfig;
use crate::error::{AppError, AppResult};
use crate::geo::GeoRect;
use crate::models::{ActivityScope, Annotations, CameraChange, Event, TimeWindow, Viewport};
use controller::{Message, ViewportController};

/// A non-fatal message for the user, e.g. a failed fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerStats {
    pub fetch_attempts: u64,
    pub fetch_skips: u64,
    pub fetch_completions: u64,
    pub fetch_failures: u64,
    /// Fetches whose results were dropped because the scope or time window changed.
    pub fetch_discards: u64,
    /// Display-throttle windows opened.
    pub recomputes_scheduled: u64,
    pub recomputes_run: u64,
    pub publishes: u64,
}

/// What the rendering layer consumes.
pub struct MapOutputs {
    pub annotations: watch::Receiver<Annotations>,
    pub viewport: watch::Receiver<Viewport>,
    pub loading: watch::Receiver<bool>,
    pub notices: mpsc::UnboundedReceiver<Notice>,
}

#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::UnboundedSender<Message>,
}

impl ControllerHandle {
    pub fn camera_changed(&self, change: CameraChange) -> AppResult<()> {
        self.send(Message::CameraChanged(change))
    }

    /// Move the camera programmatically. Fetches and recomputes without waiting for throttles.
    pub fn pan_to(&self, rect: GeoRect) -> AppResult<()> {
        self.send(Message::PanTo(rect))
    }

    /// Switching scope drops every cached activity and region.
    pub fn set_scope(&self, scope: ActivityScope) -> AppResult<()> {
        self.send(Message::SetScope(scope))
    }

    pub fn set_time_window(&self, window: TimeWindow) -> AppResult<()> {
        self.send(Message::SetTimeWindow(window))
    }

    pub fn set_events(&self, events: Vec<Event>) -> AppResult<()> {
        self.send(Message::SetEvents(events))
    }

    pub async fn stats(&self) -> AppResult<ControllerStats> {
        let (reply, rx) = oneshot::channel();
        self.send(Message::Stats(reply))?;
        rx.await.map_err(|_| stopped())
    }

    fn send(&self, message: Message) -> AppResult<()> {
        self.tx.send(message).map_err(|_| stopped())
    }
}

fn stopped() -> AppError {
    AppError::Internal("viewport controller stopped".to_string())
}

/// Start the controller task. It runs until every handle is dropped.
pub fn spawn_controller(
    deps: ControllerDeps,
    config: &ViewportConfig,
) -> (ControllerHandle, MapOutputs, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (controller, outputs) = ViewportController::new(deps, config, tx.downgrade());
    let task = tokio::spawn(controller.run(rx));
    (ControllerHandle { tx }, outputs, task)
}
