//! Trait abstraction for console port output to enable testing

use async_trait::async_trait;
use std::io;
use tokio::io::AsyncWriteExt;

/// Trait for console port I/O operations
#[async_trait]
pub trait ConsolePortIO: Send {
    /// Write all data to the port
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush the output buffer
    async fn flush(&mut self) -> io::Result<()>;
}

/// Write half of a serial console port
pub struct TokioSerialPort {
    port: tokio::io::WriteHalf<tokio_serial::SerialStream>,
}

impl TokioSerialPort {
    pub fn new(port: tokio::io::WriteHalf<tokio_serial::SerialStream>) -> Self {
        Self { port }
    }
}

#[async_trait]
impl ConsolePortIO for TokioSerialPort {
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.port.flush().await
    }
}

/// Process stdout as a console port
pub struct StdoutPort {
    out: tokio::io::Stdout,
}

impl StdoutPort {
    pub fn new() -> Self {
        Self { out: tokio::io::stdout() }
    }
}

impl Default for StdoutPort {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConsolePortIO for StdoutPort {
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.out.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.out.flush().await
    }
}
