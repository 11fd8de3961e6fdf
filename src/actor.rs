//! Actors own their state and talk to each other over unbounded channels.
//!
//! Every message carries the sender's tracing span, so work done on behalf of
//! a message shows up under the span that caused it.

pub mod drag_monitor;
pub mod hit_test;
pub mod ingest;
pub mod notification_center;
pub mod reactor;

use tokio::sync::mpsc;
use tracing::Span;

pub struct Sender<Event>(mpsc::UnboundedSender<(Span, Event)>);

pub type Receiver<Event> = mpsc::UnboundedReceiver<(Span, Event)>;

pub fn channel<Event>() -> (Sender<Event>, Receiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Sender(tx), rx)
}

impl<Event> Sender<Event> {
    /// Fire-and-forget. A closed receiver means the actor has shut down, and
    /// there is nobody left to tell.
    pub fn send(&self, event: Event) { _ = self.try_send(event) }

    pub fn try_send(&self, event: Event) -> Result<(), mpsc::error::SendError<(Span, Event)>> {
        self.0.send((Span::current(), event))
    }
}

impl<Event> Clone for Sender<Event> {
    fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<Event> std::fmt::Debug for Sender<Event> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sender").finish_non_exhaustive()
    }
}
