//! Simulated telemetry source.
//!
//! Generates the device's ASCII wire format into an in-memory duplex stream
//! so the full pipeline can run without hardware. Baseline frames carry
//! ordinary driving magnitudes; the scenario decides whether and when an
//! impact burst or the explicit distress token appears.

use crate::transport::DynTransport;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tracing::debug;

/// What the simulated device does after its baseline frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scenario {
    /// Baseline telemetry only; never crosses a threshold.
    Quiet,
    /// Emit an impact burst after the given number of baseline frames.
    Impact {
        /// Baseline frames before the burst.
        after_frames: u32,
    },
    /// Emit the explicit distress token after the given number of frames.
    Distress {
        /// Baseline frames before the token.
        after_frames: u32,
    },
}

/// Simulated device parameters.
#[derive(Clone, Copy, Debug)]
pub struct Simulation {
    /// Scenario to play.
    pub scenario: Scenario,
    /// Total frames to emit before closing the stream.
    pub frames: u32,
    /// Delay between frames.
    pub interval: Duration,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            scenario: Scenario::Impact { after_frames: 10 },
            frames: 25,
            interval: Duration::from_millis(200),
        }
    }
}

/// Spawn a writer task playing the simulation and return the read side as a
/// telemetry transport. The stream closes after the last frame.
pub fn simulated_transport(simulation: Simulation) -> DynTransport {
    use tokio::io::AsyncWriteExt;

    let (device, mut host) = tokio::io::duplex(1024);

    tokio::spawn(async move {
        let mut rng = StdRng::from_entropy();
        for frame in 0..simulation.frames {
            let line = match simulation.scenario {
                Scenario::Impact { after_frames } if frame == after_frames => {
                    debug!(frame, "Simulating impact burst");
                    format!(
                        "ACCEL:{:.2} GYRO:{:.2}\n",
                        rng.gen_range(35.0..60.0f32),
                        rng.gen_range(6.0..12.0f32)
                    )
                }
                Scenario::Distress { after_frames } if frame == after_frames => {
                    debug!(frame, "Simulating distress token");
                    "ACCIDENT_DETECTED\n".to_string()
                }
                _ => format!(
                    "ACCEL:{:.2} GYRO:{:.2}\n",
                    rng.gen_range(7.0..12.0f32),
                    rng.gen_range(0.05..1.2f32)
                ),
            };
            if host.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            tokio::time::sleep(simulation.interval).await;
        }
        // Dropping the writer closes the stream for the reader.
    });

    Box::new(device)
}
