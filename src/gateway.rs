//! Message gateway abstraction.
//!
//! The notification transport (cellular modem, platform messaging service) is
//! an external collaborator; the dispatcher only needs a hand-off seam. A
//! gateway accepts all parts for one recipient and later pushes per-unit
//! [`Confirmation`]s on the channel it was given — asynchronously, in any
//! order.
//!
//! [`MockGateway`] simulates that contract for tests and the `simulate`
//! binary mode, with configurable hand-off rejection and either automatic or
//! test-driven confirmation delivery.

use crate::notify::{Confirmation, DeliveryOutcome, SendOutcome};
use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use tokio::sync::mpsc;
use tracing::debug;

/// Hand-off seam between the dispatcher and the notification transport.
#[async_trait]
pub trait MessageGateway: Send + Sync {
    /// Hand all `parts` for one recipient to the transport.
    ///
    /// Returning `Err` means the transport refused the hand-off; the
    /// dispatcher excludes this recipient's units from the expected total.
    /// Confirmations for accepted units are pushed on `confirm` later.
    async fn submit(
        &self,
        phone: &str,
        parts: &[String],
        confirm: mpsc::UnboundedSender<Confirmation>,
    ) -> Result<()>;
}

/// How the mock gateway produces confirmations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfirmMode {
    /// Immediately confirm every accepted part as sent and delivered.
    Auto,
    /// Record the confirmation channel; the test drives confirmations via
    /// [`MockGateway::confirm_sent`] / [`MockGateway::confirm_delivered`].
    Manual,
}

/// One recorded hand-off.
pub struct Submission {
    /// Destination phone number.
    pub phone: String,
    /// Message parts as handed off.
    pub parts: Vec<String>,
    confirm: mpsc::UnboundedSender<Confirmation>,
}

/// In-memory gateway for tests and simulation.
pub struct MockGateway {
    mode: ConfirmMode,
    rejects: Mutex<HashSet<String>>,
    submissions: Mutex<Vec<Submission>>,
}

impl MockGateway {
    /// Gateway that auto-confirms every part.
    pub fn auto() -> Self {
        Self::with_mode(ConfirmMode::Auto)
    }

    /// Gateway whose confirmations are driven by the test.
    pub fn manual() -> Self {
        Self::with_mode(ConfirmMode::Manual)
    }

    fn with_mode(mode: ConfirmMode) -> Self {
        Self {
            mode,
            rejects: Mutex::new(HashSet::new()),
            submissions: Mutex::new(Vec::new()),
        }
    }

    /// Make future hand-offs for `phone` fail.
    pub fn reject(&self, phone: &str) {
        self.rejects.lock().insert(phone.to_string());
    }

    /// Number of recorded hand-offs.
    pub fn submission_count(&self) -> usize {
        self.submissions.lock().len()
    }

    /// Snapshot of recorded hand-offs as `(phone, parts)`.
    pub fn submissions(&self) -> Vec<(String, Vec<String>)> {
        self.submissions
            .lock()
            .iter()
            .map(|s| (s.phone.clone(), s.parts.clone()))
            .collect()
    }

    /// Push a sent confirmation for one part of a recorded hand-off.
    pub fn confirm_sent(&self, phone: &str, part: usize, outcome: SendOutcome) {
        self.push(
            phone,
            Confirmation::Sent {
                phone: phone.to_string(),
                part,
                outcome,
            },
        );
    }

    /// Push a delivered confirmation for one part of a recorded hand-off.
    pub fn confirm_delivered(&self, phone: &str, part: usize, outcome: DeliveryOutcome) {
        self.push(
            phone,
            Confirmation::Delivered {
                phone: phone.to_string(),
                part,
                outcome,
            },
        );
    }

    fn push(&self, phone: &str, confirmation: Confirmation) {
        let submissions = self.submissions.lock();
        if let Some(submission) = submissions.iter().rev().find(|s| s.phone == phone) {
            let _ = submission.confirm.send(confirmation);
        }
    }
}

#[async_trait]
impl MessageGateway for MockGateway {
    async fn submit(
        &self,
        phone: &str,
        parts: &[String],
        confirm: mpsc::UnboundedSender<Confirmation>,
    ) -> Result<()> {
        if self.rejects.lock().contains(phone) {
            bail!("transport rejected hand-off for {phone}");
        }

        debug!(%phone, parts = parts.len(), "Mock gateway accepted hand-off");
        self.submissions.lock().push(Submission {
            phone: phone.to_string(),
            parts: parts.to_vec(),
            confirm: confirm.clone(),
        });

        if self.mode == ConfirmMode::Auto {
            for part in 0..parts.len() {
                let _ = confirm.send(Confirmation::Sent {
                    phone: phone.to_string(),
                    part,
                    outcome: SendOutcome::Accepted,
                });
                let _ = confirm.send(Confirmation::Delivered {
                    phone: phone.to_string(),
                    part,
                    outcome: DeliveryOutcome::Acknowledged,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn auto_mode_confirms_every_part_twice() {
        let gateway = MockGateway::auto();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let parts = vec!["one".to_string(), "two".to_string()];

        gateway
            .submit("+15550100", &parts, tx)
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 4); // 2 parts × (sent + delivered)
    }

    #[tokio::test]
    async fn rejected_phone_fails_hand_off() {
        let gateway = MockGateway::auto();
        gateway.reject("+15550100");
        let (tx, _rx) = mpsc::unbounded_channel();

        let result = gateway.submit("+15550100", &["hi".to_string()], tx).await;
        assert!(result.is_err());
        assert_eq!(gateway.submission_count(), 0);
    }

    #[tokio::test]
    async fn manual_mode_records_without_confirming() {
        let gateway = MockGateway::manual();
        let (tx, mut rx) = mpsc::unbounded_channel();

        gateway
            .submit("+15550100", &["hi".to_string()], tx)
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(gateway.submission_count(), 1);
        assert!(rx.try_recv().is_err());

        gateway.confirm_sent("+15550100", 0, SendOutcome::Accepted);
        assert!(matches!(
            rx.try_recv(),
            Ok(Confirmation::Sent { part: 0, .. })
        ));
    }
}
