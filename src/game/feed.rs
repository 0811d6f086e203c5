//! Typed event feeds with explicit subscription lifetimes

use tokio::sync::mpsc;

/// Fan-out of events to any number of subscribers.
///
/// Each subscriber owns an unbounded receiver; dropping it unsubscribes, and
/// the sender is pruned on the next publish. Publishing never blocks, so a
/// feed can be driven from synchronous game code.
#[derive(Debug)]
pub struct Feed<T> {
    subscribers: Vec<mpsc::UnboundedSender<T>>,
}

impl<T: Clone> Feed<T> {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn publish(&mut self, item: T) {
        self.subscribers.retain(|tx| tx.send(item.clone()).is_ok());
    }

    /// Drop every subscription; receivers see the feed as closed
    pub fn close(&mut self) {
        self.subscribers.clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl<T: Clone> Default for Feed<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain everything currently buffered in a receiver
pub fn drain<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Vec<T> {
    let mut items = Vec::new();
    while let Ok(item) = rx.try_recv() {
        items.push(item);
    }
    items
}
