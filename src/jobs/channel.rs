//! Relay from a blocking worker thread to a job's feed.

use super::feed::Feed;
use super::messages::ProgressMessage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub enum ChannelEvent {
    Progress(ProgressMessage),
    EndOfStream,
}

/// Producer half, owned by the worker thread.
///
/// Sending never blocks. Dropping the sender, including while unwinding from
/// a panic, publishes [`ChannelEvent::EndOfStream`].
pub struct ProgressSender {
    tx: UnboundedSender<ChannelEvent>,
}

impl ProgressSender {
    pub fn send(&self, message: ProgressMessage) {
        // The forwarder only goes away after end-of-stream, nothing to do if
        // it is already gone.
        let _ = self.tx.send(ChannelEvent::Progress(message));
    }
}

impl Drop for ProgressSender {
    fn drop(&mut self) {
        let _ = self.tx.send(ChannelEvent::EndOfStream);
    }
}

pub struct ProgressReceiver {
    rx: UnboundedReceiver<ChannelEvent>,
}

pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProgressSender { tx }, ProgressReceiver { rx })
}

/// Move messages from `receiver` into `feed` until end-of-stream.
///
/// Polls without blocking and sleeps `poll_interval` whenever the channel is
/// empty. Returns how many messages were forwarded.
pub async fn forward(
    mut receiver: ProgressReceiver,
    feed: Arc<Feed>,
    poll_interval: Duration,
) -> usize {
    let mut forwarded = 0;
    loop {
        match receiver.rx.try_recv() {
            Ok(ChannelEvent::Progress(message)) => {
                feed.push(message);
                forwarded += 1;
            }
            Ok(ChannelEvent::EndOfStream) | Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => tokio::time::sleep(poll_interval).await,
        }
    }
    forwarded
}
