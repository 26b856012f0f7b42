//! Periodic backend liveness check.
//!
//! Polls `GET /ui/check` and reports state changes: the first successful
//! check, the backend going away, and the backend coming back (or being
//! redeployed with a different UI version).

use saft_doctor_core::models::UiCheck;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::ApiClient;

/// Shortest polling period; a zero interval would make the ticker panic.
pub const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatEvent {
    /// First successful check
    Alive { ui_version: Option<String> },
    /// A check failed after the backend had been reachable
    Unreachable { error: String },
    /// The backend answered again after failing, or reports a new version
    BackendRestarted { ui_version: Option<String> },
}

#[derive(Debug, Default)]
struct HeartbeatState {
    last_ok: Option<bool>,
    last_version: Option<String>,
}

impl HeartbeatState {
    fn observe(&mut self, outcome: Result<UiCheck, String>) -> Option<HeartbeatEvent> {
        match outcome {
            Ok(check) => {
                let version_changed = matches!(
                    (&self.last_version, &check.ui_version),
                    (Some(old), Some(new)) if old != new
                );
                let event = if self.last_ok == Some(false) || version_changed {
                    Some(HeartbeatEvent::BackendRestarted {
                        ui_version: check.ui_version.clone(),
                    })
                } else if self.last_ok.is_none() {
                    Some(HeartbeatEvent::Alive {
                        ui_version: check.ui_version.clone(),
                    })
                } else {
                    None
                };
                self.last_ok = Some(true);
                if check.ui_version.is_some() {
                    self.last_version = check.ui_version;
                }
                event
            }
            Err(error) => {
                let was_up = self.last_ok != Some(false);
                self.last_ok = Some(false);
                was_up.then_some(HeartbeatEvent::Unreachable { error })
            }
        }
    }
}

/// Handle to a running heartbeat task.
pub struct Heartbeat {
    handle: JoinHandle<()>,
    events: mpsc::Receiver<HeartbeatEvent>,
}

impl Heartbeat {
    /// Start polling every `interval` until `cancel` fires or the handle is dropped.
    /// Intervals below [`MIN_HEARTBEAT_INTERVAL`] are raised to it.
    #[must_use]
    pub fn spawn(client: Arc<ApiClient>, interval: Duration, cancel: CancellationToken) -> Self {
        let interval = interval.max(MIN_HEARTBEAT_INTERVAL);
        let (tx, events) = mpsc::channel(16);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut state = HeartbeatState::default();

            tracing::debug!(
                interval_ms = interval.as_millis() as u64,
                "Heartbeat started"
            );

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let outcome = tokio::select! {
                    () = cancel.cancelled() => break,
                    outcome = client.ui_check() => outcome.map_err(|e| e.to_string()),
                };

                let Some(event) = state.observe(outcome) else {
                    continue;
                };
                match &event {
                    HeartbeatEvent::Unreachable { error } => {
                        tracing::warn!(error = %error, "Backend unreachable");
                    }
                    HeartbeatEvent::BackendRestarted { ui_version } => {
                        tracing::info!(ui_version = ?ui_version, "Backend restarted");
                    }
                    HeartbeatEvent::Alive { ui_version } => {
                        tracing::debug!(ui_version = ?ui_version, "Backend alive");
                    }
                }
                if tx.send(event).await.is_err() {
                    break;
                }
            }

            tracing::debug!("Heartbeat shutting down");
        });

        Self { handle, events }
    }

    /// Next state change; `None` once the task has stopped.
    pub async fn next_event(&mut self) -> Option<HeartbeatEvent> {
        self.events.recv().await
    }

    /// Wait for the task to finish after cancellation.
    pub async fn join(self) {
        drop(self.events);
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "Heartbeat task panicked");
        }
    }
}
