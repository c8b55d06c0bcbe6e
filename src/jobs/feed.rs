//! Per-job message log with independent subscriber cursors.

use super::messages::ProgressMessage;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Ordered, append-only log of a job's messages.
///
/// The whole history is kept for the life of the job, so a subscriber that
/// attaches late replays everything from the first message.
#[derive(Default)]
pub struct Feed {
    messages: Mutex<Vec<ProgressMessage>>,
    notify: Notify,
}

impl Feed {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, message: ProgressMessage) {
        self.messages.lock().unwrap().push(message);
        self.notify.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every message published so far.
    pub fn snapshot(&self) -> Vec<ProgressMessage> {
        self.messages.lock().unwrap().clone()
    }

    fn get(&self, index: usize) -> Option<ProgressMessage> {
        self.messages.lock().unwrap().get(index).cloned()
    }

    /// A cursor positioned at the start of the feed.
    pub fn subscribe(self: &Arc<Self>) -> FeedCursor {
        FeedCursor {
            feed: Arc::clone(self),
            position: 0,
            finished: false,
        }
    }
}

/// Reads a [`Feed`] in order, waiting for new messages when caught up.
pub struct FeedCursor {
    feed: Arc<Feed>,
    position: usize,
    finished: bool,
}

impl FeedCursor {
    /// Next message, or `None` once `Done` has been returned.
    pub async fn next(&mut self) -> Option<ProgressMessage> {
        if self.finished {
            return None;
        }
        loop {
            let notified = self.feed.notify.notified();
            tokio::pin!(notified);
            // Register interest before checking, so a push between the check
            // and the await still wakes us.
            notified.as_mut().enable();

            if let Some(message) = self.feed.get(self.position) {
                self.position += 1;
                if message.is_done() {
                    self.finished = true;
                }
                return Some(message);
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn late_subscriber_replays_full_history() {
        let feed = Feed::new();
        feed.push(ProgressMessage::lifecycle("one"));
        feed.push(ProgressMessage::Done);

        let mut cursor = feed.subscribe();
        assert_eq!(cursor.next().await, Some(ProgressMessage::lifecycle("one")));
        assert_eq!(cursor.next().await, Some(ProgressMessage::Done));
        assert_eq!(cursor.next().await, None);
    }

    #[tokio::test]
    async fn cursor_waits_for_new_messages() {
        let feed = Feed::new();
        let mut cursor = feed.subscribe();

        let producer = {
            let feed = feed.clone();
            tokio::spawn(async move {
                for i in 0..5 {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    feed.push(ProgressMessage::lifecycle(format!("m{}", i)));
                }
                feed.push(ProgressMessage::Done);
            })
        };

        let mut received = Vec::new();
        while let Some(msg) = tokio::time::timeout(Duration::from_secs(5), cursor.next())
            .await
            .unwrap()
        {
            received.push(msg);
        }
        producer.await.unwrap();

        assert_eq!(received.len(), 6);
        assert_eq!(received[0], ProgressMessage::lifecycle("m0"));
        assert!(received[5].is_done());
    }

    #[tokio::test]
    async fn concurrent_subscribers_each_see_every_message() {
        let feed = Feed::new();
        let mut a = feed.subscribe();
        let mut b = feed.subscribe();

        feed.push(ProgressMessage::lifecycle("x"));
        feed.push(ProgressMessage::Done);

        for cursor in [&mut a, &mut b] {
            assert_eq!(cursor.next().await, Some(ProgressMessage::lifecycle("x")));
            assert_eq!(cursor.next().await, Some(ProgressMessage::Done));
        }
        assert_eq!(feed.len(), 2);
    }
}
