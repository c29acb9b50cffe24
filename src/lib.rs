//! # Crash Sentinel Core Library
//!
//! This crate is the core of an accident-detection and emergency-notification
//! system. It ingests a continuous telemetry stream from a remote
//! motion-sensing device over a serial transport, classifies each sample pair
//! as a probable collision using either a trained numeric model or a
//! deterministic threshold rule, and — once a collision is judged likely —
//! runs a guarded, one-shot notification workflow that fans a multi-part
//! message out to a list of recipients and tracks asynchronous delivery
//! confirmation per message part.
//!
//! The visual interface, contact persistence, transport pairing, position
//! acquisition and model training all live outside this crate; it consumes an
//! already-open byte stream and read-only collaborator seams.
//!
//! ## Crate Structure
//!
//! - **`telemetry`**: Pure per-chunk decoder turning raw stream fragments
//!   into `(accel, gyro)` sample pairs and the explicit distress token.
//! - **`classifier`**: The two-variant predictor (learned model / threshold
//!   rule) behind one `predict` contract with guaranteed fallback.
//! - **`model`**: ONNX inference session wrapper behind the `ml_onnx`
//!   feature.
//! - **`guard`**: The single-send debounce state machine with its cooldown
//!   reset timer.
//! - **`notify`**: The notification dispatcher — message chunking, recipient
//!   fan-out, and aggregation of the two asynchronous confirmation streams
//!   into batch events.
//! - **`gateway`**: The hand-off seam to the notification transport, with a
//!   mock implementation for tests and simulation.
//! - **`transport`**: The inbound byte-stream abstraction and its long-lived
//!   reader task.
//! - **`orchestrator`**: The coordination loop binding decoder, classifier,
//!   guard and dispatcher; exposes the automatic and manual trigger entry
//!   points and the observer event stream.
//! - **`providers`**: Read-only collaborator seams for recipients and
//!   location.
//! - **`config`**: Figment-based configuration loading and validation.
//! - **`logging`**: Tracing subscriber setup.
//! - **`error`**: The central `SentinelError` type.
//! - **`sim`**: Synthetic telemetry source for development without hardware.

pub mod classifier;
pub mod config;
pub mod error;
pub mod gateway;
pub mod guard;
pub mod logging;
pub mod model;
pub mod notify;
pub mod orchestrator;
pub mod providers;
pub mod sim;
pub mod telemetry;
pub mod transport;
