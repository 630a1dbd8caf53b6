//! Transition event fan-out to in-process subscribers.

use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::model::TransitionEvent;

/// Live subscriber channels. Disconnected receivers are dropped on the next publish.
#[derive(Default)]
pub struct Subscribers {
    senders: Mutex<Vec<Sender<TransitionEvent>>>,
}

impl Subscribers {
    pub fn subscribe(&self) -> Receiver<TransitionEvent> {
        let (tx, rx) = mpsc::channel();
        self.senders
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Sends one copy of `event` to every live subscriber.
    pub fn publish(&self, event: &TransitionEvent) {
        let mut senders = self
            .senders
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.senders
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}
