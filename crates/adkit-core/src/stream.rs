//! Cancellable load event streams
//!
//! Vendor SDKs report load progress through listener callbacks. An adapter
//! bridges them into async code with a [`LoadStream`] / [`LoadSender`] pair:
//! the listener pushes events through the sender, the caller consumes the
//! stream.
//!
//! ## Event Flow
//!
//! ```text
//! vendor listener ── LoadSender::loading/success/error ──► LoadStream ──► caller
//!                                                             │
//!                                   cancel() / early drop ────┴──► cleanup (once)
//! ```
//!
//! ## Cancellation
//!
//! - `cancel()` (or a [`LoadCancelHandle`]) runs the cleanup hook exactly
//!   once and ends the stream, whether or not a terminal event was already
//!   yielded
//! - Dropping the stream before it yielded its terminal event counts as a
//!   cancellation
//! - Dropping it after the terminal event does not run the hook: the ad is
//!   on screen and the caller releases it through `AdSdk::cleanup` when the
//!   view goes away

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use tokio::sync::mpsc;
use tokio_stream::Stream;
use tracing::debug;

use crate::model::AdResult;

type CleanupHook = Box<dyn FnOnce() + Send + 'static>;

/// State shared by a stream, its sender and its cancel handles
struct Shared {
    placement_id: String,
    /// Taken when the terminal event is sent or the stream is cancelled
    tx: Mutex<Option<mpsc::UnboundedSender<AdResult>>>,
    /// Taken exactly once: run on cancellation, dropped otherwise
    cleanup: Mutex<Option<CleanupHook>>,
    cancelled: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn cancel(&self) -> bool {
        self.cancelled.store(true, Ordering::SeqCst);

        // Closing the channel wakes a consumer parked in poll_next
        lock(&self.tx).take();

        let hook = lock(&self.cleanup).take();
        match hook {
            Some(hook) => {
                debug!("Load for placement {} cancelled, running cleanup", self.placement_id);
                hook();
                true
            }
            None => false,
        }
    }
}

/// Producer half of a load, held by the vendor listener
///
/// Cheap to clone. After the first terminal event every further send is
/// ignored, so a vendor that fires `loaded` twice cannot produce two
/// terminal events.
#[derive(Clone)]
pub struct LoadSender {
    shared: Arc<Shared>,
}

impl LoadSender {
    /// Placement this load belongs to
    pub fn placement_id(&self) -> &str {
        &self.shared.placement_id
    }

    /// Emit `Loading`
    pub fn loading(&self) -> bool {
        self.send(AdResult::loading(self.placement_id()))
    }

    /// Emit `Success` and close the stream
    pub fn success(&self) -> bool {
        self.send(AdResult::success(self.placement_id()))
    }

    /// Emit `Error` and close the stream
    pub fn error(&self, message: impl Into<String>) -> bool {
        self.send(AdResult::error(self.placement_id(), message))
    }

    /// Emit an arbitrary event
    ///
    /// # Returns
    ///
    /// `true` if the event was queued, `false` if the stream already ended
    /// (terminal event sent, cancelled, or consumer gone)
    pub fn send(&self, result: AdResult) -> bool {
        let mut tx = lock(&self.shared.tx);

        if result.is_terminal() {
            match tx.take() {
                Some(sender) => sender.send(result).is_ok(),
                None => false,
            }
        } else {
            match tx.as_ref() {
                Some(sender) => sender.send(result).is_ok(),
                None => false,
            }
        }
    }

    /// End the load with an `Error` and disarm its cleanup hook
    ///
    /// Used when the load no longer owns its placement's surface, so a later
    /// cancel or drop of the stream must not release it.
    ///
    /// # Returns
    ///
    /// `true` if the `Error` reached a stream that had not ended yet
    pub fn abandon(&self, message: impl Into<String>) -> bool {
        lock(&self.shared.cleanup).take();
        self.error(message)
    }

    /// Whether further events would be dropped
    pub fn is_closed(&self) -> bool {
        lock(&self.shared.tx).as_ref().is_none_or(|sender| sender.is_closed())
    }
}

/// Handle that cancels a load from anywhere
#[derive(Clone)]
pub struct LoadCancelHandle {
    shared: Arc<Shared>,
}

impl LoadCancelHandle {
    /// Cancel the load; see [`LoadStream::cancel`]
    pub fn cancel(&self) -> bool {
        self.shared.cancel()
    }

    /// Whether the load has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::SeqCst)
    }
}

/// Finite stream of [`AdResult`] events for one load
///
/// Returned by [`AdSdk::load_ad`](crate::AdSdk::load_ad).
pub struct LoadStream {
    shared: Arc<Shared>,
    rx: mpsc::UnboundedReceiver<AdResult>,
    terminal_seen: bool,
    done: bool,
}

impl LoadStream {
    /// Create a connected sender/stream pair
    ///
    /// `cleanup` runs at most once, when the load is cancelled.
    pub fn channel<F>(placement_id: impl Into<String>, cleanup: F) -> (LoadSender, LoadStream)
    where
        F: FnOnce() + Send + 'static,
    {
        Self::build(placement_id.into(), Some(Box::new(cleanup)))
    }

    /// A stream that yields one event and ends, with nothing to clean up
    ///
    /// Used for loads that fail before any vendor work happens.
    pub fn immediate(result: AdResult) -> LoadStream {
        let (sender, stream) = Self::build(result.placement_id().to_string(), None);
        sender.send(result);
        lock(&sender.shared.tx).take();
        stream
    }

    fn build(placement_id: String, cleanup: Option<CleanupHook>) -> (LoadSender, LoadStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            placement_id,
            tx: Mutex::new(Some(tx)),
            cleanup: Mutex::new(cleanup),
            cancelled: AtomicBool::new(false),
        });

        let sender = LoadSender {
            shared: Arc::clone(&shared),
        };
        let stream = LoadStream {
            shared,
            rx,
            terminal_seen: false,
            done: false,
        };

        (sender, stream)
    }

    /// Placement this load belongs to
    pub fn placement_id(&self) -> &str {
        &self.shared.placement_id
    }

    /// Cancel the load
    ///
    /// Runs the cleanup hook if it has not run yet and ends the stream.
    ///
    /// # Returns
    ///
    /// `true` if this call ran the cleanup hook
    pub fn cancel(&mut self) -> bool {
        self.done = true;
        self.shared.cancel()
    }

    /// Handle that can cancel this load from another task
    pub fn cancel_handle(&self) -> LoadCancelHandle {
        LoadCancelHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Whether the terminal event has been yielded
    pub fn is_finished(&self) -> bool {
        self.terminal_seen
    }
}

impl Stream for LoadStream {
    type Item = AdResult;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<AdResult>> {
        let this = self.get_mut();

        if this.done || this.shared.cancelled.load(Ordering::SeqCst) {
            this.done = true;
            return Poll::Ready(None);
        }

        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(result)) => {
                if result.is_terminal() {
                    this.terminal_seen = true;
                }
                Poll::Ready(Some(result))
            }
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for LoadStream {
    fn drop(&mut self) {
        if self.terminal_seen {
            // Release the hook so its captures (and any cycle through the
            // vendor listener) are freed without running it
            lock(&self.shared.cleanup).take();
        } else {
            self.shared.cancel();
        }
    }
}
