//! Observer callbacks and the channel adapter.

use tokio::sync::mpsc;

use crate::{HaltEvent, OperationSummary, ProgressSnapshot};

/// Receives engine notifications on the worker thread.
///
/// `on_halted` is called with the halt already posted: the worker blocks
/// after it returns until an answer is delivered through the engine's
/// [`Control`](crate::Control). Answering from inside the callback is
/// allowed.
pub trait Observer<E>: Send + Sync {
    fn on_current_item_changed(&self, _name: &str) {}

    fn on_progress(&self, snapshot: &ProgressSnapshot);

    fn on_halted(&self, event: &HaltEvent<E>);

    /// Called exactly once, after the engine reaches its done state.
    fn on_finished(&self, summary: &OperationSummary);
}

/// One observer callback as a value.
#[derive(Debug, Clone)]
pub enum OperationEvent<E> {
    CurrentItem(String),
    Progress(ProgressSnapshot),
    Halted(HaltEvent<E>),
    Finished(OperationSummary),
}

/// Observer forwarding every callback to an unbounded channel, for callers
/// that drive the engine from an event loop.
#[derive(Debug)]
pub struct ChannelObserver<E> {
    tx: mpsc::UnboundedSender<OperationEvent<E>>,
}

impl<E> ChannelObserver<E> {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OperationEvent<E>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: OperationEvent<E>) {
        // Receiver gone: nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

impl<E: Clone + Send> Observer<E> for ChannelObserver<E> {
    fn on_current_item_changed(&self, name: &str) {
        self.forward(OperationEvent::CurrentItem(name.to_owned()));
    }

    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        self.forward(OperationEvent::Progress(snapshot.clone()));
    }

    fn on_halted(&self, event: &HaltEvent<E>) {
        self.forward(OperationEvent::Halted(event.clone()));
    }

    fn on_finished(&self, summary: &OperationSummary) {
        self.forward(OperationEvent::Finished(summary.clone()));
    }
}
