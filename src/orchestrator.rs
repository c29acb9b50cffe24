//! Coordination of the telemetry-to-notification pipeline.
//!
//! The orchestrator binds the stream to the classifier and the classifier to
//! the guard:
//!
//! ```text
//! bytes → telemetry::decode_fragment → Classifier → AlertGuard → Dispatcher
//! ```
//!
//! A dedicated reader task blocks on transport reads; every complete sample
//! is classified on its own short-lived task so a slow inference call never
//! stalls the reader. Detection results, transport events, batch events and
//! guard transitions all converge on one `select!` coordination loop, which
//! is the only place automatic triggers are decided.
//!
//! The device's explicit distress token and any external test harness reach
//! the same guarded path via [`Orchestrator::trigger_automatic`];
//! [`Orchestrator::trigger_manual`] bypasses the guard unconditionally so a
//! human-initiated alert is never silently swallowed.

use crate::classifier::{Classification, Classifier, PredictionSource};
use crate::error::AppResult;
use crate::guard::{AlertGuard, GuardStatus, TriggerDecision};
use crate::notify::{BatchEvent, Dispatcher};
use crate::providers::{GeoFix, LocationProvider, RecipientSource};
use crate::telemetry;
use crate::transport::{self, DynTransport, TransportEvent};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

/// Event surfaced to observers (UI, logs).
#[derive(Clone, Debug)]
pub enum SentinelEvent {
    /// A decoded sample frame (either field may be absent).
    Frame {
        /// Acceleration magnitude, if present.
        accel: Option<f32>,
        /// Gyroscope magnitude, if present.
        gyro: Option<f32>,
    },
    /// A telemetry field failed to parse.
    DecodeError {
        /// Field name ("accel" or "gyro").
        field: &'static str,
        /// Raw substring that failed parsing.
        raw: String,
    },
    /// A classification result.
    Detection {
        /// Collision probability.
        probability: f32,
        /// Which predictor served the request.
        source: PredictionSource,
    },
    /// The device's explicit distress token was received.
    Distress,
    /// An alert was triggered and dispatch started.
    AlertTriggered {
        /// True for the manual (unguarded) path.
        manual: bool,
    },
    /// An automatic trigger was suppressed by the guard.
    AlertSuppressed,
    /// Guard state transition projection.
    Guard(GuardStatus),
    /// A batch-level dispatch event.
    Batch(BatchEvent),
    /// The telemetry stream was closed by the peer.
    TransportClosed,
    /// The telemetry stream failed; monitoring has stopped.
    TransportError(String),
}

/// Binds decoder, classifier, guard and dispatcher into one pipeline.
pub struct Orchestrator {
    classifier: Arc<Classifier>,
    guard: Arc<AlertGuard>,
    dispatcher: Arc<Dispatcher>,
    recipients: Arc<dyn RecipientSource>,
    location: Arc<dyn LocationProvider>,
    events: broadcast::Sender<SentinelEvent>,
    alert_probability: f32,
}

impl Orchestrator {
    /// Assemble the pipeline. The alert cutoff defaults to
    /// [`crate::classifier::ALERT_PROBABILITY`].
    pub fn new(
        classifier: Arc<Classifier>,
        guard: Arc<AlertGuard>,
        dispatcher: Arc<Dispatcher>,
        recipients: Arc<dyn RecipientSource>,
        location: Arc<dyn LocationProvider>,
    ) -> Self {
        let (events, _) = broadcast::channel(128);
        Self {
            classifier,
            guard,
            dispatcher,
            recipients,
            location,
            events,
            alert_probability: crate::classifier::ALERT_PROBABILITY,
        }
    }

    /// Override the alert probability cutoff.
    pub fn with_alert_probability(mut self, cutoff: f32) -> Self {
        self.alert_probability = cutoff;
        self
    }

    /// Subscribe to pipeline events.
    pub fn subscribe(&self) -> broadcast::Receiver<SentinelEvent> {
        self.events.subscribe()
    }

    /// Shared guard, for external harnesses that need its state projection.
    pub fn guard(&self) -> Arc<AlertGuard> {
        Arc::clone(&self.guard)
    }

    /// Run the monitoring loop over an already-open transport.
    ///
    /// Returns `Ok` when the peer closes the stream and
    /// [`SentinelError::TransportRead`](crate::error::SentinelError) when a
    /// read fails; both are surfaced to observers as disconnect events
    /// first. Failures local to one sample, one unit, or one inference call
    /// never abort this loop.
    pub async fn run(&self, transport: DynTransport) -> AppResult<()> {
        let mut reader = transport::spawn_reader(transport);
        let (detect_tx, mut detect_rx) = mpsc::channel::<Classification>(32);
        let mut batch_rx = self.dispatcher.subscribe();
        let mut guard_rx = self.guard.subscribe();

        info!(
            model_active = self.classifier.is_model_active(),
            "Monitoring started"
        );

        let result = loop {
            tokio::select! {
                event = reader.events.recv() => match event {
                    Some(TransportEvent::Data(chunk)) => {
                        self.handle_chunk(&chunk, &detect_tx).await;
                    }
                    Some(TransportEvent::Closed) | None => {
                        self.emit(SentinelEvent::TransportClosed);
                        break Ok(());
                    }
                    Some(TransportEvent::Error(err)) => {
                        self.emit(SentinelEvent::TransportError(err.to_string()));
                        break Err(crate::error::SentinelError::TransportRead(err));
                    }
                },
                Some(classification) = detect_rx.recv() => {
                    self.emit(SentinelEvent::Detection {
                        probability: classification.probability,
                        source: classification.source,
                    });
                    if classification.probability >= self.alert_probability {
                        info!(
                            probability = classification.probability,
                            source = ?classification.source,
                            "Likely accident detected"
                        );
                        self.trigger_automatic().await;
                    }
                },
                batch = batch_rx.recv() => {
                    if let Ok(event) = batch {
                        // A hard dispatch failure or a user cancellation
                        // re-arms the guard so a later alert can go out.
                        if matches!(event, BatchEvent::Error(_) | BatchEvent::Cancelled) {
                            self.guard.reset();
                        }
                        self.emit(SentinelEvent::Batch(event));
                    }
                },
                changed = guard_rx.changed() => {
                    if changed.is_ok() {
                        let status = *guard_rx.borrow_and_update();
                        self.emit(SentinelEvent::Guard(status));
                    }
                },
            }
        };

        reader.stop();
        info!("Monitoring stopped");
        result
    }

    /// Decode one chunk and route its consequences.
    async fn handle_chunk(&self, chunk: &str, detect_tx: &mpsc::Sender<Classification>) {
        let decoded = telemetry::decode_fragment(chunk);

        for err in &decoded.errors {
            warn!(error = %err, "Telemetry field skipped");
            if let crate::error::SentinelError::DecodeField { field, raw } = err {
                self.emit(SentinelEvent::DecodeError {
                    field: *field,
                    raw: raw.clone(),
                });
            }
        }

        if decoded.distress {
            info!("Distress signal received from device");
            self.emit(SentinelEvent::Distress);
            self.trigger_automatic().await;
        }

        if !decoded.frame.is_empty() {
            self.emit(SentinelEvent::Frame {
                accel: decoded.frame.accel,
                gyro: decoded.frame.gyro,
            });
        }

        if let (Some(accel), Some(gyro)) = (decoded.frame.accel, decoded.frame.gyro) {
            let classifier = Arc::clone(&self.classifier);
            let tx = detect_tx.clone();
            // Classification runs off the coordination loop; inference may
            // block for an arbitrary time.
            tokio::task::spawn_blocking(move || {
                let classification = classifier.predict(accel, gyro);
                let _ = tx.blocking_send(classification);
            });
        }
    }

    /// Guarded trigger used by all automatic sources (stream classification,
    /// distress token, external test harnesses).
    pub async fn trigger_automatic(&self) {
        match self.guard.try_trigger() {
            TriggerDecision::Fired => {
                self.emit(SentinelEvent::AlertTriggered { manual: false });
                self.send_alert().await;
            }
            TriggerDecision::Suppressed => {
                debug!("Automatic trigger suppressed; alert already sent");
                self.emit(SentinelEvent::AlertSuppressed);
            }
        }
    }

    /// Unguarded trigger for the human-initiated path. Never reads or
    /// mutates guard state.
    pub async fn trigger_manual(&self) {
        info!("Manual alert requested; bypassing guard");
        self.emit(SentinelEvent::AlertTriggered { manual: true });
        self.send_alert().await;
    }

    async fn send_alert(&self) {
        let recipients = self.recipients.recipients();
        let message = emergency_message(self.location.last_known());
        match self.dispatcher.dispatch(&recipients, &message).await {
            Ok(batch) => {
                info!(batch = %batch.id, total = batch.total, "Emergency dispatch started");
            }
            Err(err) => {
                // The dispatcher has already emitted the batch error event;
                // the coordination loop re-arms the guard from it.
                error!(error = %err, "Emergency dispatch failed");
            }
        }
    }

    fn emit(&self, event: SentinelEvent) {
        let _ = self.events.send(event);
    }
}

/// Compose the outgoing emergency message with the location embedded as an
/// opaque maps link.
pub fn emergency_message(fix: GeoFix) -> String {
    format!(
        "ACCIDENT DETECTED!\n\nEmergency assistance needed.\n\nLocation: https://maps.google.com/?q={},{}",
        fix.latitude, fix.longitude
    )
}
