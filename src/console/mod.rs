//! # Console Module
//!
//! The AT console of the tracker: `+EVT:` notifications out, AT command lines
//! in.
//!
//! This module handles:
//! - A non-blocking [`Console`] sink usable from any task or timer callback
//! - A writer task that drains the sink into stdout or a serial port
//! - A reader task that turns console input into command lines
//! - Opening the serial console port
//! - The AT command set (see [`at`])

pub mod at;
pub mod port_trait;

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::error::{Result, TrackerError};
use port_trait::{ConsolePortIO, StdoutPort, TokioSerialPort};

/// Depth of the console input queue
const INPUT_QUEUE_DEPTH: usize = 16;

/// Sink for console output
///
/// Implementations must not block: notifications are emitted from the
/// scheduler, the acquisition task and timer callbacks.
pub trait Console: Send + Sync {
    /// Print one line
    fn print(&self, line: &str);

    /// Print a `+EVT:` notification
    fn event(&self, text: &str) {
        self.print(&format!("+EVT:{}", text));
    }
}

/// Console that queues lines for a writer task
#[derive(Debug, Clone)]
pub struct ChannelConsole {
    tx: mpsc::UnboundedSender<String>,
}

impl Console for ChannelConsole {
    fn print(&self, line: &str) {
        if self.tx.send(line.to_string()).is_err() {
            debug!("Console writer gone, dropped: {}", line);
        }
    }
}

/// Start a console writer task on `port`
///
/// Returns the sink and the writer task handle. The task ends when every
/// sink clone has been dropped.
pub fn spawn_writer<P>(port: P) -> (Arc<ChannelConsole>, JoinHandle<()>)
where
    P: ConsolePortIO + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(run_writer(port, rx));
    (Arc::new(ChannelConsole { tx }), handle)
}

async fn run_writer<P: ConsolePortIO>(mut port: P, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = rx.recv().await {
        let mut data = line.into_bytes();
        data.extend_from_slice(b"\r\n");

        if let Err(e) = port.write_all(&data).await {
            warn!("Failed to write console line: {}", e);
            continue;
        }
        if let Err(e) = port.flush().await {
            warn!("Failed to flush console port: {}", e);
        }
    }
}

/// Start a task that splits `reader` into trimmed, non-empty lines
pub fn spawn_line_reader<R>(reader: R) -> mpsc::Receiver<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(INPUT_QUEUE_DEPTH);
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    debug!("Console input closed");
                    break;
                }
                Err(e) => {
                    warn!("Console read error: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

/// Console on the process stdin / stdout
pub fn open_stdio() -> (Arc<ChannelConsole>, mpsc::Receiver<String>) {
    let (console, _writer) = spawn_writer(StdoutPort::new());
    let lines = spawn_line_reader(tokio::io::stdin());
    (console, lines)
}

/// Console on a serial port (8N1, no flow control)
///
/// # Errors
///
/// Returns `ConsolePortNotFound` if the port cannot be opened.
pub fn open_serial(
    path: &str,
    baud_rate: u32,
) -> Result<(Arc<ChannelConsole>, mpsc::Receiver<String>)> {
    let port = tokio_serial::new(path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| TrackerError::ConsolePortNotFound(format!("{}: {}", path, e)))?;

    info!("AT console opened on {} at {} baud", path, baud_rate);

    let (read_half, write_half) = tokio::io::split(port);
    let (console, _writer) = spawn_writer(TokioSerialPort::new(write_half));
    let lines = spawn_line_reader(read_half);
    Ok((console, lines))
}
