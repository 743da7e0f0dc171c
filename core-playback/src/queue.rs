//! # Command Queues
//!
//! - [`PlayQueue`]: pending `play()` resolutions plus the *terminated* queue
//!   for commands invalidated before they could run.
//! - [`RateGate`]: media events held back while the playback rate is zero
//!   during a seek.
//! - [`PlayHandle`]: the caller's side of a `play()` request.
//!
//! Every entry leaves its queue exactly once: through [`PlayQueue::drain_all`]
//! (normal resolution) or [`PlayQueue::drain_to_terminated`] (invalidation),
//! never both.

use crate::config::AutoplayMode;
use crate::events::MediaEvent;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// How a `play()` request settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayResolution {
    /// The engine accepted the play request.
    Started,
    /// The engine rejected the request.
    Rejected(String),
    /// The request was invalidated (middleware termination, reset, dispose)
    /// and settled with no value.
    Terminated,
}

/// Step of a controller-driven autoplay attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoplayStep {
    /// A plain `play()`; [`AutoplayMode::Any`] falls back to a muted attempt
    /// on rejection.
    Plain(AutoplayMode),
    /// A muted `play()`; the previous muted state is restored on failure.
    Muted {
        mode: AutoplayMode,
        previously_muted: bool,
    },
}

impl AutoplayStep {
    pub fn mode(self) -> AutoplayMode {
        match self {
            AutoplayStep::Plain(mode) | AutoplayStep::Muted { mode, .. } => mode,
        }
    }
}

/// Someone waiting on the next play attempt.
pub enum Waiter {
    Handle(oneshot::Sender<PlayResolution>),
    /// Invoked with the resolution as the queue settles, in queue order.
    Callback(Box<dyn FnOnce(PlayResolution)>),
    Autoplay(AutoplayStep),
    /// A `reset()` deferred until the current play request settles.
    Reset,
}

impl fmt::Debug for Waiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Waiter::Handle(_) => f.write_str("Handle"),
            Waiter::Callback(_) => f.write_str("Callback"),
            Waiter::Autoplay(step) => f.debug_tuple("Autoplay").field(step).finish(),
            Waiter::Reset => f.write_str("Reset"),
        }
    }
}

/// Callbacks that only run when pending commands are invalidated.
#[derive(Debug)]
pub enum TerminatedEntry {
    Waiter(Waiter),
    RestoreMuted(bool),
}

#[derive(Debug, Default)]
pub struct PlayQueue {
    waiters: VecDeque<Waiter>,
    terminated: VecDeque<TerminatedEntry>,
}

impl PlayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, waiter: Waiter) {
        self.waiters.push_back(waiter);
    }

    pub fn push_terminated(&mut self, entry: TerminatedEntry) {
        self.terminated.push_back(entry);
    }

    /// Takes every waiter for normal resolution, oldest first. A real play
    /// supersedes any pending termination, so the terminated queue is
    /// discarded.
    pub fn drain_all(&mut self) -> Vec<Waiter> {
        self.terminated.clear();
        self.waiters.drain(..).collect()
    }

    /// Moves every waiter behind the terminated entries and takes them all,
    /// oldest first.
    pub fn drain_to_terminated(&mut self) -> Vec<TerminatedEntry> {
        let waiters = self.waiters.drain(..).map(TerminatedEntry::Waiter);
        self.terminated.extend(waiters);
        self.terminated.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    pub fn terminated_len(&self) -> usize {
        self.terminated.len()
    }
}

// ============================================================================
// Rate Gate
// ============================================================================

/// FIFO of media events deferred while the rate is zero and seeking.
#[derive(Debug, Default)]
pub struct RateGate {
    buffered: VecDeque<MediaEvent>,
}

impl RateGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hold(&mut self, event: MediaEvent) {
        self.buffered.push_back(event);
    }

    /// Releases every held event in arrival order.
    pub fn release(&mut self) -> Vec<MediaEvent> {
        self.buffered.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.buffered.clear();
    }

    pub fn len(&self) -> usize {
        self.buffered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffered.is_empty()
    }
}

// ============================================================================
// Play Handle
// ============================================================================

/// Deferred result of `play()`.
///
/// Poll it with [`try_resolution`](Self::try_resolution) from synchronous
/// code, or `.await` it. A request whose sender is dropped without settling
/// resolves as [`PlayResolution::Terminated`].
#[derive(Debug)]
pub struct PlayHandle {
    receiver: oneshot::Receiver<PlayResolution>,
    resolved: Option<PlayResolution>,
}

impl PlayHandle {
    pub(crate) fn channel() -> (oneshot::Sender<PlayResolution>, Self) {
        let (sender, receiver) = oneshot::channel();
        (
            sender,
            Self {
                receiver,
                resolved: None,
            },
        )
    }

    /// A handle that is already settled.
    pub(crate) fn settled(resolution: PlayResolution) -> Self {
        let (sender, handle) = Self::channel();
        let _ = sender.send(resolution);
        handle
    }

    pub fn try_resolution(&mut self) -> Option<PlayResolution> {
        if self.resolved.is_none() {
            self.resolved = match self.receiver.try_recv() {
                Ok(resolution) => Some(resolution),
                Err(oneshot::error::TryRecvError::Empty) => None,
                Err(oneshot::error::TryRecvError::Closed) => Some(PlayResolution::Terminated),
            };
        }
        self.resolved.clone()
    }

    pub fn is_settled(&mut self) -> bool {
        self.try_resolution().is_some()
    }
}

impl Future for PlayHandle {
    type Output = PlayResolution;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(resolution) = self.resolved.clone() {
            return Poll::Ready(resolution);
        }
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.unwrap_or(PlayResolution::Terminated))
    }
}
