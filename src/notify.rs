//! Emergency notification dispatch and confirmation aggregation.
//!
//! A dispatch cycle fans one message out to every recipient as one or more
//! transport-sized parts. Each (recipient, part) unit carries two independent
//! confirmation channels — transmission acknowledgment and delivery
//! acknowledgment — which arrive asynchronously, out of order relative to
//! each other and to other units. The dispatcher aggregates them into
//! batch-level [`BatchEvent`]s on a broadcast channel.
//!
//! Counter storage is shared across cycles: every `dispatch` call resets the
//! counters and starts an independent counting epoch. Cycles are therefore
//! not composable; overlapping batches share the same counters.

use crate::error::{AppResult, SentinelError};
use crate::gateway::MessageGateway;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

// =============================================================================
// Recipients
// =============================================================================

/// Relationship category of an emergency contact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientCategory {
    /// Family member.
    Family,
    /// Friend.
    Friend,
    /// Medical contact.
    Medical,
    /// Anything else.
    Other,
}

/// One emergency contact, supplied by an external store at dispatch time.
/// The dispatcher only reads `phone`; recipients with an empty phone number
/// are skipped without failing the batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Display name (may be empty).
    #[serde(default)]
    pub name: String,
    /// Destination phone number.
    pub phone: String,
    /// Relationship category.
    #[serde(default = "default_category")]
    pub category: RecipientCategory,
}

fn default_category() -> RecipientCategory {
    RecipientCategory::Other
}

// =============================================================================
// Message parts
// =============================================================================

/// Maximum length of a message that fits a single part.
pub const SINGLE_PART_LIMIT: usize = 160;
/// Per-part length once a message needs the concatenated multipart envelope.
pub const MULTIPART_LIMIT: usize = 153;

/// Split a message into transport-sized parts following the native multipart
/// convention: up to 160 characters travel as one part; anything longer is
/// cut into 153-character segments to leave room for the concatenation
/// header.
pub fn split_message(message: &str) -> Vec<String> {
    let chars: Vec<char> = message.chars().collect();
    if chars.len() <= SINGLE_PART_LIMIT {
        return vec![message.to_string()];
    }
    chars
        .chunks(MULTIPART_LIMIT)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

// =============================================================================
// Confirmations
// =============================================================================

/// Transport-reported outcome of a transmission attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// The transport accepted and transmitted the part.
    Accepted,
    /// Unspecified transmission failure.
    GenericFailure,
    /// No network service available.
    NoService,
    /// Radio was switched off.
    RadioOff,
    /// The part could not be encoded into a payload.
    NullPayload,
}

/// Recipient-network-reported outcome for a delivered part.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The recipient network acknowledged receipt.
    Acknowledged,
    /// Delivery was denied or cancelled.
    Canceled,
}

/// One asynchronous confirmation for a single (recipient, part) unit.
#[derive(Clone, Debug)]
pub enum Confirmation {
    /// Transmission acknowledgment.
    Sent {
        /// Destination phone number.
        phone: String,
        /// Zero-based part index.
        part: usize,
        /// Transport result code.
        outcome: SendOutcome,
    },
    /// Delivery acknowledgment.
    Delivered {
        /// Destination phone number.
        phone: String,
        /// Zero-based part index.
        part: usize,
        /// Network result code.
        outcome: DeliveryOutcome,
    },
}

// =============================================================================
// Batch events
// =============================================================================

/// Batch-level event surfaced to observers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchEvent {
    /// Every expected unit has a transmission acknowledgment.
    AllSent {
        /// Expected unit count for the cycle.
        total: u32,
        /// Successfully sent units at emission time.
        sent: u32,
    },
    /// Every expected unit has a delivery acknowledgment.
    AllDelivered {
        /// Expected unit count for the cycle.
        total: u32,
        /// Successfully delivered units at emission time.
        delivered: u32,
    },
    /// A dispatch-level failure (precondition or per-recipient hand-off).
    Error(String),
    /// The cycle was cancelled; further completion events are suppressed.
    Cancelled,
}

/// Handle describing a successfully started dispatch cycle.
#[derive(Clone, Copy, Debug)]
pub struct BatchHandle {
    /// Identifier of this cycle, for log correlation.
    pub id: Uuid,
    /// Expected unit count (`recipients × parts` after filtering).
    pub total: u32,
    /// Number of parts the message was split into.
    pub parts: usize,
    /// UTC timestamp at which the cycle started.
    pub started_at: DateTime<Utc>,
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Shared counter storage, reset at the start of every dispatch cycle.
struct BatchCounters {
    total: AtomicU32,
    sent: AtomicU32,
    delivered: AtomicU32,
    cancelled: AtomicBool,
}

/// Fans a message out to recipients and aggregates confirmations into batch
/// events.
pub struct Dispatcher {
    gateway: Arc<dyn MessageGateway>,
    confirm_tx: mpsc::UnboundedSender<Confirmation>,
    events: broadcast::Sender<BatchEvent>,
    counters: Arc<BatchCounters>,
}

impl Dispatcher {
    /// Create a dispatcher over the given gateway and start its confirmation
    /// aggregation task. Must be called from within a Tokio runtime.
    pub fn new(gateway: Arc<dyn MessageGateway>) -> Self {
        let (confirm_tx, confirm_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(64);
        let counters = Arc::new(BatchCounters {
            total: AtomicU32::new(0),
            sent: AtomicU32::new(0),
            delivered: AtomicU32::new(0),
            cancelled: AtomicBool::new(false),
        });

        tokio::spawn(aggregate_confirmations(
            confirm_rx,
            Arc::clone(&counters),
            events.clone(),
        ));

        Self {
            gateway,
            confirm_tx,
            events,
            counters,
        }
    }

    /// Subscribe to batch events.
    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.events.subscribe()
    }

    /// Start a new dispatch cycle.
    ///
    /// Fails without sending any unit when `recipients` is empty, `message`
    /// is empty, or no recipient survives filtering. Recipients with an empty
    /// phone number are skipped; a per-recipient hand-off rejection excludes
    /// that recipient's units from the expected total and the batch
    /// continues.
    pub async fn dispatch(&self, recipients: &[Recipient], message: &str) -> AppResult<BatchHandle> {
        self.counters.cancelled.store(false, Ordering::SeqCst);

        if recipients.is_empty() {
            warn!("No recipients provided for dispatch");
            self.emit_error("No emergency recipients configured");
            return Err(SentinelError::EmptyRecipients);
        }
        if message.is_empty() {
            warn!("Dispatch requested with an empty message");
            self.emit_error("Emergency message is empty");
            return Err(SentinelError::EmptyMessage);
        }

        // New counting epoch over the shared storage.
        self.counters.sent.store(0, Ordering::SeqCst);
        self.counters.delivered.store(0, Ordering::SeqCst);
        self.counters.total.store(0, Ordering::SeqCst);

        let parts = split_message(message);
        let batch = BatchHandle {
            id: Uuid::new_v4(),
            total: 0,
            parts: parts.len(),
            started_at: Utc::now(),
        };
        let mut expected: u32 = 0;

        for recipient in recipients {
            if recipient.phone.is_empty() {
                warn!("Skipping recipient without phone number");
                continue;
            }
            match self
                .gateway
                .submit(&recipient.phone, &parts, self.confirm_tx.clone())
                .await
            {
                Ok(()) => {
                    expected += parts.len() as u32;
                    self.counters.total.store(expected, Ordering::SeqCst);
                    debug!(
                        batch = %batch.id,
                        phone = %recipient.phone,
                        parts = parts.len(),
                        "Message hand-off accepted"
                    );
                }
                Err(err) => {
                    let rejection = SentinelError::GatewayRejected {
                        phone: recipient.phone.clone(),
                        reason: err.to_string(),
                    };
                    error!(batch = %batch.id, error = %rejection, "Message hand-off rejected");
                    self.emit_error(&rejection.to_string());
                }
            }
        }

        if expected == 0 {
            self.emit_error("No valid messages to send after filtering recipients");
            return Err(SentinelError::NoValidRecipients);
        }

        info!(
            batch = %batch.id,
            total = expected,
            parts = batch.parts,
            "Dispatch cycle started"
        );
        Ok(BatchHandle {
            total: expected,
            ..batch
        })
    }

    /// Cancel the in-flight cycle: suppresses any further batch-completion
    /// events and emits one [`BatchEvent::Cancelled`]. Units already handed
    /// to the transport are not retracted.
    pub fn cancel(&self) {
        self.counters.cancelled.store(true, Ordering::SeqCst);
        info!("Dispatch cycle cancelled");
        let _ = self.events.send(BatchEvent::Cancelled);
    }

    fn emit_error(&self, message: &str) {
        let _ = self.events.send(BatchEvent::Error(message.to_string()));
    }
}

/// Long-lived confirmation consumer shared by all dispatch cycles.
async fn aggregate_confirmations(
    mut confirm_rx: mpsc::UnboundedReceiver<Confirmation>,
    counters: Arc<BatchCounters>,
    events: broadcast::Sender<BatchEvent>,
) {
    while let Some(confirmation) = confirm_rx.recv().await {
        match confirmation {
            Confirmation::Sent {
                phone,
                part,
                outcome,
            } => {
                match outcome {
                    SendOutcome::Accepted => {
                        counters.sent.fetch_add(1, Ordering::SeqCst);
                        debug!(%phone, part, "Part sent");
                        // Check if all parts for all recipients have been
                        // processed.
                        let total = counters.total.load(Ordering::SeqCst);
                        let sent = counters.sent.load(Ordering::SeqCst);
                        let delivered = counters.delivered.load(Ordering::SeqCst);
                        if sent + delivered >= total
                            && !counters.cancelled.load(Ordering::SeqCst)
                        {
                            let _ = events.send(BatchEvent::AllSent { total, sent });
                        }
                    }
                    failure => {
                        warn!(%phone, part, ?failure, "Part transmission failed");
                    }
                }
            }
            Confirmation::Delivered {
                phone,
                part,
                outcome,
            } => {
                match outcome {
                    DeliveryOutcome::Acknowledged => {
                        counters.delivered.fetch_add(1, Ordering::SeqCst);
                        debug!(%phone, part, "Part delivered");
                        // Check if all parts for all recipients have been
                        // processed.
                        let total = counters.total.load(Ordering::SeqCst);
                        let sent = counters.sent.load(Ordering::SeqCst);
                        let delivered = counters.delivered.load(Ordering::SeqCst);
                        if sent + delivered >= total
                            && !counters.cancelled.load(Ordering::SeqCst)
                        {
                            let _ = events.send(BatchEvent::AllDelivered { total, delivered });
                        }
                    }
                    DeliveryOutcome::Canceled => {
                        warn!(%phone, part, "Part delivery denied or cancelled");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_message_is_a_single_part() {
        let message = "a".repeat(SINGLE_PART_LIMIT);
        let parts = split_message(&message);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].len(), SINGLE_PART_LIMIT);
    }

    #[test]
    fn long_message_splits_into_multipart_segments() {
        let message = "b".repeat(SINGLE_PART_LIMIT + 1);
        let parts = split_message(&message);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].len(), MULTIPART_LIMIT);
        assert_eq!(parts[1].len(), SINGLE_PART_LIMIT + 1 - MULTIPART_LIMIT);
    }

    #[test]
    fn split_preserves_content_in_order() {
        let message = "0123456789".repeat(40); // 400 chars
        let parts = split_message(&message);
        assert_eq!(parts.concat(), message);
        assert!(parts.iter().all(|p| p.chars().count() <= MULTIPART_LIMIT));
    }

    #[test]
    fn recipient_deserializes_with_defaults() {
        let recipient: Recipient =
            toml::from_str("phone = \"+15550100\"").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(recipient.phone, "+15550100");
        assert_eq!(recipient.name, "");
        assert_eq!(recipient.category, RecipientCategory::Other);
    }
}
