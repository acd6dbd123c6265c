use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::models::{CrawlResult, ScanProgress};

/// Where a session publishes its progress and its final result.
///
/// Publishing is fire-and-forget; storage and expiry belong to the sink.
pub trait ProgressSink: Send + Sync {
    fn publish_progress(&self, session: Uuid, progress: &ScanProgress);

    fn publish_result(&self, session: Uuid, result: &CrawlResult);
}

/// Discards everything.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn publish_progress(&self, _session: Uuid, _progress: &ScanProgress) {}

    fn publish_result(&self, _session: Uuid, _result: &CrawlResult) {}
}

/// Forwards progress events to a closure; results are ignored.
pub struct CallbackSink<F>(pub F);

impl<F> ProgressSink for CallbackSink<F>
where
    F: Fn(&ScanProgress) + Send + Sync,
{
    fn publish_progress(&self, _session: Uuid, progress: &ScanProgress) {
        (self.0)(progress)
    }

    fn publish_result(&self, _session: Uuid, _result: &CrawlResult) {}
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Progress(Uuid, ScanProgress),
    Finished(Uuid, Box<CrawlResult>),
}

/// Sends every event down an unbounded channel. A dropped receiver is ignored.
pub struct ChannelSink {
    tx: UnboundedSender<SessionEvent>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<SessionEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelSink {
    fn publish_progress(&self, session: Uuid, progress: &ScanProgress) {
        let _ = self.tx.send(SessionEvent::Progress(session, progress.clone()));
    }

    fn publish_result(&self, session: Uuid, result: &CrawlResult) {
        let _ = self
            .tx
            .send(SessionEvent::Finished(session, Box::new(result.clone())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScanStage;
    use std::sync::Mutex;
    use tokio::sync::mpsc::unbounded_channel;

    #[test]
    fn test_callback_sink_forwards_progress() {
        let seen = Mutex::new(Vec::new());
        let sink = CallbackSink(|p: &ScanProgress| seen.lock().unwrap().push(p.stage));
        sink.publish_progress(Uuid::new_v4(), &ScanProgress::initial());
        drop(sink);
        assert_eq!(seen.into_inner().unwrap(), vec![ScanStage::Initializing]);
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (tx, rx) = unbounded_channel();
        drop(rx);
        let sink = ChannelSink::new(tx);
        sink.publish_progress(Uuid::new_v4(), &ScanProgress::initial());
    }
}
