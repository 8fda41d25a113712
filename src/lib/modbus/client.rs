use log::{debug, warn};

use super::codec::{
    build_request, crc_matches, parse_read_response, parse_write_response, FunctionCode,
    RegisterValues, ResponseKind,
};
use super::{ModbusError, Result};
use crate::config::ModbusConfig;
use crate::transport::{accumulate, ByteTransport, FrameLength, TransportError};

/// One Modbus session with the drive.
///
/// Holds the transport exclusively; every exchange borrows the client
/// mutably, so at most one request is ever in flight on the wire.
pub struct RegisterClient<T> {
    transport: Option<T>,
    config: ModbusConfig,
}

impl<T: ByteTransport> RegisterClient<T> {
    pub fn new(transport: T, config: ModbusConfig) -> Self {
        Self {
            transport: Some(transport),
            config,
        }
    }

    pub fn disconnected(config: ModbusConfig) -> Self {
        Self {
            transport: None,
            config,
        }
    }

    pub fn config(&self) -> &ModbusConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Replaces the transport. The previous one is dropped first.
    pub fn connect(&mut self, transport: T) {
        self.transport = None;
        self.transport = Some(transport);
    }

    /// Hands the transport back to the caller; later requests fail with
    /// [`TransportError::Unavailable`].
    pub fn disconnect(&mut self) -> Option<T> {
        self.transport.take()
    }

    pub fn transport(&self) -> Option<&T> {
        self.transport.as_ref()
    }

    async fn exchange(&mut self, request: &[u8], kind: ResponseKind) -> Result<Vec<u8>> {
        let read_timeout = self.config.read_timeout;
        let transport = self
            .transport
            .as_mut()
            .ok_or(TransportError::Unavailable)?;

        debug!("send {:02x?}", request);
        transport.send(request).await?;

        let response = accumulate(transport, &kind, read_timeout).await?;
        debug!("recv {:02x?}", response);

        let frame_len = kind.needed(&response).min(response.len());
        if !crc_matches(&response[..frame_len]) {
            warn!("bad crc on response {:02x?}", &response[..frame_len]);
        }

        Ok(response)
    }

    pub async fn read_registers(&mut self, register: u16, count: u16) -> Result<RegisterValues> {
        let request = build_request(
            self.config.slave_address,
            FunctionCode::ReadHoldingRegisters,
            register,
            count,
        );
        let response = self.exchange(&request, ResponseKind::Read).await?;
        parse_read_response(&response)
    }

    pub async fn read_register(&mut self, register: u16) -> Result<u16> {
        match self.read_registers(register, 1).await? {
            RegisterValues::Single(value) => Ok(value),
            RegisterValues::Multiple(values) => values.first().copied().ok_or(
                ModbusError::Incomplete {
                    received: 0,
                    expected: 2,
                },
            ),
        }
    }

    /// Writes one register and checks the echo.
    ///
    /// A response with a function code other than `0x06` is reported as
    /// [`ModbusError::WriteAcknowledgeFailure`].
    pub async fn write_register(&mut self, register: u16, value: u16) -> Result<()> {
        let request = build_request(
            self.config.slave_address,
            FunctionCode::WriteSingleRegister,
            register,
            value,
        );
        let response = self.exchange(&request, ResponseKind::Write).await?;

        if parse_write_response(&response)? {
            debug!("write 0x{:02x} = {} acknowledged", register, value);
            Ok(())
        } else {
            Err(ModbusError::WriteAcknowledgeFailure { register })
        }
    }
}
