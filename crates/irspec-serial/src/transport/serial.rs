//! Serial port link using tokio-serial

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};

use super::{LinkOpener, SerialLink, TransportError};
use crate::config::SerialSettings;

/// Opens real serial ports (8N1, no flow control)
pub struct SerialPortOpener;

#[async_trait]
impl LinkOpener for SerialPortOpener {
    async fn open(&self, settings: &SerialSettings) -> Result<Box<dyn SerialLink>, TransportError> {
        let port = tokio_serial::new(&settings.port, settings.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(settings.timeout)
            .open_native_async()
            .map_err(|e| {
                TransportError::ConnectionFailed(format!("{}: {}", settings.port, e))
            })?;

        tracing::debug!(port = %settings.port, baud = settings.baud_rate, "Serial port opened");

        Ok(Box::new(SerialPortLink {
            port: BufReader::new(port),
            name: settings.port.clone(),
        }))
    }
}

/// An open serial port with a line reader
pub struct SerialPortLink {
    port: BufReader<SerialStream>,
    name: String,
}

#[async_trait]
impl SerialLink for SerialPortLink {
    async fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        let framed = format!("{}\n", line);
        let stream = self.port.get_mut();
        stream
            .write_all(framed.as_bytes())
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        stream
            .flush()
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn read_line(&mut self, timeout: Duration) -> Result<String, TransportError> {
        let mut line = String::new();
        match tokio::time::timeout(timeout, self.port.read_line(&mut line)).await {
            Err(_) => Err(TransportError::Timeout(format!(
                "no reply from {} within {:?}",
                self.name, timeout
            ))),
            Ok(Err(e)) => Err(TransportError::ReceiveFailed(e.to_string())),
            Ok(Ok(0)) => Err(TransportError::ConnectionClosed),
            Ok(Ok(_)) => Ok(line.trim().to_string()),
        }
    }

    async fn clear_input(&mut self) -> Result<(), TransportError> {
        let buffered = self.port.buffer().len();
        if buffered > 0 {
            tracing::debug!(port = %self.name, bytes = buffered, "Discarding buffered input");
            self.port.consume(buffered);
        }
        self.port
            .get_ref()
            .clear(ClearBuffer::Input)
            .map_err(|e| TransportError::ReceiveFailed(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.port
            .get_mut()
            .flush()
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        tracing::debug!(port = %self.name, "Serial port closed");
        Ok(())
    }

    fn endpoint(&self) -> &str {
        &self.name
    }
}
