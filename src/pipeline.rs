//! Photo-processing pipeline — one strictly sequential pass per
//! inbound event.
//!
//! Stage order: await-photo → fetch → acknowledge → transform →
//! deliver. Every stage failure is classified into a customer-safe
//! message and reported through the [`Notifier`]; an acknowledgement
//! failure is the one non-fatal case. An invocation that reaches the
//! fetch stage ends with exactly one delivered photo or exactly one
//! customer-visible error text.

use std::sync::Arc;

use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::{ClassifiedError, CustomerMessage, Fault};
use crate::fetch::ContentFetcher;
use crate::telegram::{Channel, Message};
use crate::transform::TransformationClient;

/// Prompt for events that carry no photo.
const PROMPT_TEXT: &str = "Please, send me a photo";

/// Best-effort acknowledgement once the photo is staged.
const ACK_TEXT: &str = "I got and saved your photo.";

/// Per-invocation identity.
///
/// Scopes every staged and result filename: chat id and event
/// timestamp for traceability, a generated nonce so simultaneous
/// invocations (even with equal timestamps) never share a file.
#[derive(Debug, Clone)]
pub struct InvocationId {
    chat_id: i64,
    timestamp: i64,
    nonce: Uuid,
}

impl InvocationId {
    pub fn new(chat_id: i64, timestamp: i64) -> Self {
        Self {
            chat_id,
            timestamp,
            nonce: Uuid::new_v4(),
        }
    }

    /// Name for the staged input photo.
    pub fn staged_name(&self) -> String {
        format!(
            "photo_{}_{}_{}.jpg",
            self.chat_id,
            self.timestamp,
            self.nonce.simple()
        )
    }

    /// Name for the transformed result image.
    pub fn result_name(&self) -> String {
        format!(
            "cutout_{}_{}_{}.png",
            self.chat_id,
            self.timestamp,
            self.nonce.simple()
        )
    }
}

/// Sends the customer-safe side of a failure back to the conversation.
///
/// The internal cause goes to the log; the user sees only the fixed
/// classified text. A failure of the notice send itself is logged and
/// dropped — it never re-enters classification.
pub struct Notifier {
    channel: Arc<dyn Channel>,
}

impl Notifier {
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self { channel }
    }

    pub async fn notify(&self, chat_id: i64, fault: Fault) {
        let classified = fault.classify();
        error!(chat_id, error = %classified, "Pipeline failure");

        let text = format!("An error occurred:\n{}", classified.customer_text());
        if let Err(send_err) = self.channel.send_text(chat_id, &text).await {
            error!(chat_id, error = %send_err, "Failed to send error notice");
        }
    }
}

/// Orchestrates one pipeline invocation per inbound event.
pub struct PipelineOrchestrator {
    channel: Arc<dyn Channel>,
    fetcher: ContentFetcher,
    transformer: TransformationClient,
    notifier: Notifier,
}

impl PipelineOrchestrator {
    pub fn new(
        channel: Arc<dyn Channel>,
        fetcher: ContentFetcher,
        transformer: TransformationClient,
    ) -> Self {
        let notifier = Notifier::new(Arc::clone(&channel));
        Self {
            channel,
            fetcher,
            transformer,
            notifier,
        }
    }

    /// Handle one inbound message to completion. Never returns an
    /// error — every failure ends as a notified classification.
    pub async fn handle(&self, message: &Message) {
        let chat_id = message.chat.id;

        let Some(photo) = message.best_photo() else {
            // not an error path: just ask for a photo
            if let Err(err) = self.channel.send_text(chat_id, PROMPT_TEXT).await {
                self.notifier.notify(chat_id, Fault::raw(err)).await;
            }
            return;
        };

        if let Err(fault) = self.process(chat_id, message.date, &photo.file_id).await {
            self.notifier.notify(chat_id, fault).await;
        }
    }

    async fn process(&self, chat_id: i64, timestamp: i64, file_id: &str) -> Result<(), Fault> {
        let invocation = InvocationId::new(chat_id, timestamp);

        let file_path = self
            .channel
            .resolve_file_path(file_id)
            .await
            .map_err(|err| Fault::from(CustomerMessage::InternalService.wrap(err)))?;
        debug!(chat_id, file_path = %file_path, "Photo handle resolved");

        let staged = self
            .fetcher
            .fetch(&file_path, &invocation)
            .await
            .map_err(|err| Fault::from(ClassifiedError::from(err)))?;
        debug!(chat_id, path = %staged.path.display(), "Photo staged");

        // best-effort: a failed acknowledgement is reported but does
        // not abort the transformation
        if let Err(err) = self.channel.send_text(chat_id, ACK_TEXT).await {
            self.notifier.notify(chat_id, Fault::raw(err)).await;
        }

        let result = self
            .transformer
            .transform(&staged, &invocation)
            .await
            .map_err(|err| Fault::from(ClassifiedError::from(err)))?;
        debug!(chat_id, path = %result.path.display(), "Background removed");

        self.channel
            .send_photo(chat_id, &result.path)
            .await
            .map_err(|err| Fault::from(CustomerMessage::InternalService.wrap(err)))?;

        info!(chat_id, "Photo processed and delivered");
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────
