//! External collaborator seams: recipient store and location source.
//!
//! Contact persistence and geographic-fix acquisition live outside the core.
//! These traits are the read-only views the orchestrator consumes at dispatch
//! time; the static implementations serve configuration-driven deployments
//! and tests.

use crate::notify::Recipient;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// A geographic fix embedded as opaque text in the outgoing message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoFix {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

/// Supplies the last known geographic fix. The default of `0, 0` stands in
/// when no fix was ever acquired.
pub trait LocationProvider: Send + Sync {
    /// Most recent fix, or the empty default.
    fn last_known(&self) -> GeoFix;
}

/// Location provider holding an updatable fix.
#[derive(Default)]
pub struct StaticLocation {
    fix: Mutex<GeoFix>,
}

impl StaticLocation {
    /// Provider starting at the given fix.
    pub fn new(fix: GeoFix) -> Self {
        Self {
            fix: Mutex::new(fix),
        }
    }

    /// Replace the stored fix (e.g. from an external position feed).
    pub fn update(&self, fix: GeoFix) {
        *self.fix.lock() = fix;
    }
}

impl LocationProvider for StaticLocation {
    fn last_known(&self) -> GeoFix {
        *self.fix.lock()
    }
}

/// Supplies the ordered recipient sequence at dispatch time. The core never
/// mutates it.
pub trait RecipientSource: Send + Sync {
    /// Current recipient list, in dispatch order.
    fn recipients(&self) -> Vec<Recipient>;
}

/// Fixed recipient list (typically loaded from configuration).
pub struct StaticRecipients {
    recipients: Vec<Recipient>,
}

impl StaticRecipients {
    /// Source over a fixed list.
    pub fn new(recipients: Vec<Recipient>) -> Self {
        Self { recipients }
    }
}

impl RecipientSource for StaticRecipients {
    fn recipients(&self) -> Vec<Recipient> {
        self.recipients.clone()
    }
}
