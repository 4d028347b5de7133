//! Session events for UI observers.

use std::sync::{Mutex, PoisonError};

use async_channel::{Receiver, Sender, TrySendError, unbounded};
use log::warn;

use crate::{CapturePhase, UploadStatus};

/// How prominently a [`Notice`] should be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Informational.
    Info,
    /// Something went wrong.
    Destructive,
}

/// A short user-facing message, typically rendered as a toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Headline.
    pub title: String,
    /// Body text.
    pub description: String,
    /// Display style.
    pub severity: Severity,
}

impl Notice {
    pub(crate) fn info(title: &str, description: impl Into<String>) -> Self {
        Self {
            title: title.to_owned(),
            description: description.into(),
            severity: Severity::Info,
        }
    }

    pub(crate) fn destructive(title: &str, description: impl Into<String>) -> Self {
        Self {
            title: title.to_owned(),
            description: description.into(),
            severity: Severity::Destructive,
        }
    }
}

/// Something observable happened to a capture session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session entered a new phase.
    PhaseChanged(CapturePhase),
    /// The upload of the current image settled.
    UploadFinished(UploadStatus),
    /// A message for the user.
    Notice(Notice),
}

#[derive(Debug, Default)]
pub(crate) struct EventHub {
    subscribers: Mutex<Vec<Sender<SessionEvent>>>,
}

impl EventHub {
    pub(crate) fn subscribe(&self) -> Receiver<SessionEvent> {
        let (sender, receiver) = unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sender);
        receiver
    }

    pub(crate) fn emit(&self, event: &SessionEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|sender| match sender.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Closed(_)) => false,
            Err(err) => {
                warn!("dropping session event: {err}");
                true
            }
        });
    }
}
