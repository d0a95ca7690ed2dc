//! Run events and notifiers for observability.
//!
//! Events are emitted while a run executes so consumers can observe progress,
//! persist it, or stream it elsewhere.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted during a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
  /// A run has started.
  RunStarted { run_id: String },

  /// A task instance has started.
  TaskStarted {
    run_id: String,
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<String>,
  },

  /// A task instance has succeeded.
  TaskSucceeded {
    run_id: String,
    path: String,
    result: String,
  },

  /// A task instance has failed.
  TaskFailed {
    run_id: String,
    path: String,
    error: String,
  },

  /// The run resolved with its rendered output.
  RunCompleted { run_id: String, output: String },

  /// The run failed.
  RunFailed { run_id: String, error: String },

  /// The run was dropped before it settled.
  RunAbandoned { run_id: String },
}

impl RunEvent {
  pub fn run_id(&self) -> &str {
    match self {
      RunEvent::RunStarted { run_id }
      | RunEvent::TaskStarted { run_id, .. }
      | RunEvent::TaskSucceeded { run_id, .. }
      | RunEvent::TaskFailed { run_id, .. }
      | RunEvent::RunCompleted { run_id, .. }
      | RunEvent::RunFailed { run_id, .. }
      | RunEvent::RunAbandoned { run_id } => run_id,
    }
  }
}

/// Trait for receiving run events.
///
/// The runner calls `notify` for each event, on the thread driving the run.
pub trait RunNotifier {
  fn notify(&self, event: RunEvent);
}

/// A notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl RunNotifier for NoopNotifier {
  fn notify(&self, _event: RunEvent) {}
}

/// A notifier that sends events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // Unbounded so a slow consumer never stalls the run; volume is a handful of
  // events per task.
  sender: mpsc::UnboundedSender<RunEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<RunEvent>) -> Self {
    Self { sender }
  }
}

impl RunNotifier for ChannelNotifier {
  fn notify(&self, event: RunEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
