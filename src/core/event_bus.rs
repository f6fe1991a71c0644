//! Publish/subscribe registry for chapter events.

use tokio::sync::broadcast;
use tracing::trace;

use crate::domain::{ChapterEvent, ChapterEventKind};

/// Default number of events buffered per subscriber
pub const DEFAULT_CAPACITY: usize = 256;

/// Broadcasts every event to every subscriber.
///
/// A subscriber that falls more than the channel capacity behind sees a
/// `Lagged` error on its receiver and skips the oldest events.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ChapterEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChapterEvent> {
        self.tx.subscribe()
    }

    /// Publish an event, returning how many subscribers will see it
    pub fn publish(&self, chapter_id: &str, kind: ChapterEventKind) -> usize {
        trace!(chapter = %chapter_id, ?kind, "Publishing event");
        self.tx.send(ChapterEvent::new(chapter_id, kind)).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_subscriber_sees_every_event() {
        let bus = EventBus::default();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        assert_eq!(bus.publish("ch1", ChapterEventKind::FetchStarted), 2);
        assert_eq!(bus.publish("ch1", ChapterEventKind::FetchFinished), 2);

        for rx in [&mut first, &mut second] {
            assert_eq!(rx.recv().await.unwrap().kind, ChapterEventKind::FetchStarted);
            assert_eq!(rx.recv().await.unwrap().kind, ChapterEventKind::FetchFinished);
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::default();
        assert_eq!(bus.publish("ch1", ChapterEventKind::SettingsChanged), 0);
    }
}
