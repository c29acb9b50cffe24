//! Telemetry transport abstraction and reader task.
//!
//! The core consumes an already-open byte stream; establishing or pairing the
//! link is external. Any type implementing `AsyncRead + Unpin + Send` can act
//! as the transport:
//!
//! - `tokio_serial::SerialStream` (real hardware, `transport_serial` feature)
//! - `tokio::io::DuplexStream` (tests and simulation)
//!
//! [`spawn_reader`] runs the long-lived read loop: it blocks on transport
//! reads, forwards decoded-text chunks over a channel, and terminates only on
//! a read error, end of stream, or the cooperative stop signal (observed
//! after the in-flight read returns).

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, trace};

/// Trait alias for the inbound telemetry byte stream.
pub trait TransportIO: AsyncRead + Unpin + Send {}

impl<T: AsyncRead + Unpin + Send> TransportIO for T {}

/// Type-erased boxed transport.
pub type DynTransport = Box<dyn TransportIO>;

/// Read buffer size for one transport read.
const READ_BUF_SIZE: usize = 512;

/// Event emitted by the reader task.
#[derive(Debug)]
pub enum TransportEvent {
    /// One chunk of telemetry text (lossy UTF-8 decoded).
    Data(String),
    /// The peer closed the stream.
    Closed,
    /// A read failed; the reader loop has terminated.
    Error(std::io::Error),
}

/// Handle over a running reader task.
pub struct ReaderHandle {
    /// Stream of transport events, ending when the reader terminates.
    pub events: mpsc::Receiver<TransportEvent>,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReaderHandle {
    /// Signal the reader to stop. Cooperative: the loop exits after its
    /// current blocking read returns.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Abort the reader task outright.
    pub fn abort(&self) {
        self.task.abort();
    }
}

/// Open the configured serial port as a telemetry transport.
#[cfg(feature = "transport_serial")]
pub fn open_serial(port: &str, baud_rate: u32) -> anyhow::Result<DynTransport> {
    use anyhow::Context;
    use tokio_serial::SerialPortBuilderExt;

    let stream = tokio_serial::new(port, baud_rate)
        .open_native_async()
        .with_context(|| format!("Failed to open telemetry serial port {port}"))?;
    Ok(Box::new(stream))
}

/// Stub returning an error when serial support was not compiled in.
#[cfg(not(feature = "transport_serial"))]
pub fn open_serial(_port: &str, _baud_rate: u32) -> anyhow::Result<DynTransport> {
    Err(crate::error::SentinelError::FeatureNotEnabled("transport_serial").into())
}

/// Spawn the long-lived reader task over a transport.
pub fn spawn_reader(mut transport: DynTransport) -> ReaderHandle {
    let (event_tx, events) = mpsc::channel(32);
    let (stop_tx, mut stop_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut buf = [0u8; READ_BUF_SIZE];
        loop {
            tokio::select! {
                result = stop_rx.changed() => {
                    if result.is_err() || *stop_rx.borrow() {
                        info!("Telemetry reader stopped");
                        break;
                    }
                }
                read = transport.read(&mut buf) => match read {
                    Ok(0) => {
                        info!("Telemetry stream closed by peer");
                        let _ = event_tx.send(TransportEvent::Closed).await;
                        break;
                    }
                    Ok(n) => {
                        let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                        trace!(bytes = n, "Telemetry chunk received");
                        if event_tx.send(TransportEvent::Data(chunk)).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        error!(error = %err, "Telemetry read failed, stopping reader");
                        let _ = event_tx.send(TransportEvent::Error(err)).await;
                        break;
                    }
                }
            }
        }
    });

    ReaderHandle {
        events,
        stop_tx,
        task,
    }
}
