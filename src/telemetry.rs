//! Telemetry stream decoding.
//!
//! The motion-sensing unit emits ASCII fragments over the serial link on an
//! unbounded schedule, e.g. `ACCEL:23.91 GYRO:0.42`. Fragments arrive as raw
//! byte chunks and may carry one field, both fields, or neither. Decoding is a
//! pure per-chunk scan: no state is held across calls, so a marker split
//! across two reads is dropped rather than reassembled.
//!
//! A fragment may also carry the device's explicit distress token
//! (`ACCIDENT_DETECTED`), which bypasses numeric classification entirely.

use crate::error::SentinelError;

/// Marker preceding the acceleration magnitude (m/s²).
pub const ACCEL_MARKER: &str = "ACCEL:";
/// Marker preceding the gyroscope magnitude (rad/s).
pub const GYRO_MARKER: &str = "GYRO:";
/// Explicit distress signal emitted by the device's own onboard detection.
pub const DISTRESS_TOKEN: &str = "ACCIDENT_DETECTED";

/// One decoded `(accel, gyro)` pair. Either field may be absent when the
/// fragment did not contain the corresponding marker or its value was
/// malformed.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SensorFrame {
    /// Acceleration magnitude in m/s², if present in the fragment.
    pub accel: Option<f32>,
    /// Gyroscope magnitude in rad/s, if present in the fragment.
    pub gyro: Option<f32>,
}

impl SensorFrame {
    /// True when both fields decoded, i.e. the frame warrants classification.
    pub fn is_complete(&self) -> bool {
        self.accel.is_some() && self.gyro.is_some()
    }

    /// True when neither field decoded.
    pub fn is_empty(&self) -> bool {
        self.accel.is_none() && self.gyro.is_none()
    }
}

/// Result of decoding one raw fragment.
#[derive(Debug, Default)]
pub struct FrameDecode {
    /// The decoded sample fields.
    pub frame: SensorFrame,
    /// Whether the fragment carried the explicit distress token.
    pub distress: bool,
    /// Per-field failures encountered while decoding. Never aborts the chunk.
    pub errors: Vec<SentinelError>,
}

/// Decode one telemetry fragment.
///
/// Scans for [`ACCEL_MARKER`] and [`GYRO_MARKER`]; for each marker present,
/// the value substring runs from the byte after the marker up to the next
/// whitespace character or end of input, and is parsed as `f32`. A missing
/// marker leaves the field unset without error; a malformed value leaves the
/// field unset and records a [`SentinelError::DecodeField`].
pub fn decode_fragment(text: &str) -> FrameDecode {
    let mut decode = FrameDecode {
        distress: text.contains(DISTRESS_TOKEN),
        ..FrameDecode::default()
    };

    match extract_field(text, ACCEL_MARKER, "accel") {
        Ok(value) => decode.frame.accel = value,
        Err(err) => decode.errors.push(err),
    }
    match extract_field(text, GYRO_MARKER, "gyro") {
        Ok(value) => decode.frame.gyro = value,
        Err(err) => decode.errors.push(err),
    }

    decode
}

/// Extract and parse the value following `marker`, if the marker is present.
fn extract_field(
    text: &str,
    marker: &str,
    field: &'static str,
) -> Result<Option<f32>, SentinelError> {
    let Some(start) = text.find(marker) else {
        return Ok(None);
    };
    let rest = &text[start + marker.len()..];
    let end = rest
        .find(|c: char| c.is_ascii_whitespace())
        .unwrap_or(rest.len());
    let raw = &rest[..end];

    raw.parse::<f32>()
        .map(Some)
        .map_err(|_| SentinelError::DecodeField {
            field,
            raw: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_both_fields() {
        let decode = decode_fragment("ACCEL:23.91 GYRO:0.42\n");
        assert_eq!(decode.frame.accel, Some(23.91));
        assert_eq!(decode.frame.gyro, Some(0.42));
        assert!(decode.frame.is_complete());
        assert!(decode.errors.is_empty());
        assert!(!decode.distress);
    }

    #[test]
    fn missing_marker_leaves_field_unset_without_error() {
        let decode = decode_fragment("ACCEL:9.81");
        assert_eq!(decode.frame.accel, Some(9.81));
        assert_eq!(decode.frame.gyro, None);
        assert!(!decode.frame.is_complete());
        assert!(decode.errors.is_empty());
    }

    #[test]
    fn value_terminates_at_whitespace() {
        let decode = decode_fragment("GYRO:1.5\tACCEL:2.0 trailing");
        assert_eq!(decode.frame.gyro, Some(1.5));
        assert_eq!(decode.frame.accel, Some(2.0));
    }

    #[test]
    fn malformed_value_is_reported_but_does_not_abort_chunk() {
        let decode = decode_fragment("ACCEL:2x.1 GYRO:0.3");
        assert_eq!(decode.frame.accel, None);
        assert_eq!(decode.frame.gyro, Some(0.3));
        assert_eq!(decode.errors.len(), 1);
        match &decode.errors[0] {
            SentinelError::DecodeField { field, raw } => {
                assert_eq!(*field, "accel");
                assert_eq!(raw, "2x.1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn marker_with_no_value_is_malformed() {
        let decode = decode_fragment("ACCEL:");
        assert_eq!(decode.frame.accel, None);
        assert_eq!(decode.errors.len(), 1);
    }

    #[test]
    fn split_marker_across_reads_is_dropped() {
        // No reassembly: each half decodes to nothing useful on its own.
        let first = decode_fragment("ACC");
        let second = decode_fragment("EL:25.0");
        assert!(first.frame.is_empty());
        assert!(second.frame.is_empty());
        assert!(first.errors.is_empty());
    }

    #[test]
    fn distress_token_is_detected_alongside_fields() {
        let decode = decode_fragment("ACCIDENT_DETECTED ACCEL:31.0 GYRO:7.2");
        assert!(decode.distress);
        assert!(decode.frame.is_complete());
    }

    #[test]
    fn empty_fragment_decodes_to_nothing() {
        let decode = decode_fragment("");
        assert!(decode.frame.is_empty());
        assert!(decode.errors.is_empty());
        assert!(!decode.distress);
    }
}
