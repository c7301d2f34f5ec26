// ── Outbound intent sink ──

use tagsync_api::ClientIntent;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Where subscription intents go. Fire-and-forget: delivery to the
/// server is the transport's job, including queueing while offline.
pub trait IntentSink: Send + Sync {
    fn emit(&self, intent: ClientIntent);
}

impl IntentSink for mpsc::UnboundedSender<ClientIntent> {
    fn emit(&self, intent: ClientIntent) {
        if let Err(mpsc::error::SendError(intent)) = self.send(intent) {
            debug!(
                subscriber_id = intent.subscriber_id(),
                "stream task gone, intent dropped"
            );
        }
    }
}

/// Sink for sessions without an update stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl IntentSink for DiscardSink {
    fn emit(&self, intent: ClientIntent) {
        trace!(subscriber_id = intent.subscriber_id(), "no stream, intent discarded");
    }
}
