//! Modbus-RTU access to the gold motor drive.
//!
//! The drive sits at a single slave address on a 19200 8N1 serial line and
//! exposes 26 holding registers. Requests are always eight bytes: read one
//! register (`0x03`) or write one register (`0x06`).

mod client;
mod codec;
pub mod regs;
mod sequence;
mod simulator;

use thiserror::Error;

use crate::transport::TransportError;

pub use client::RegisterClient;
pub use codec::{
    build_exception_response, build_read_command, build_read_response, build_request,
    build_write_command, build_write_echo, crc16_modbus, crc_matches, crc_wire_bytes,
    parse_read_response, parse_write_response, ExceptionCode, FunctionCode, RegisterValues,
    ResponseKind, DEFAULT_SLAVE_ADDRESS, EXCEPTION_FLAG, EXCEPTION_RESPONSE_LEN,
    READ_RESPONSE_MIN_LEN, REQUEST_LEN, WRITE_RESPONSE_LEN,
};
pub use sequence::{
    apply_settings, read_all, AdvancedSettings, MotorSettings, Phase, ReadbackRow,
    RegisterWrite, WriteRecord, WriteReport,
};
pub use simulator::SimulatedDrive;

#[derive(Error, Debug)]
pub enum ModbusError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("modbus exception code {code}")]
    Exception { code: u8 },
    #[error("incomplete frame: got {received} of {expected} bytes")]
    Incomplete { received: usize, expected: usize },
    #[error("unexpected function code 0x{0:02x}")]
    UnexpectedFunction(u8),
    #[error("write to register 0x{register:02x} not acknowledged")]
    WriteAcknowledgeFailure { register: u16 },
}

impl ModbusError {
    /// The standard meaning of a device-reported exception, if known.
    pub fn exception_code(&self) -> Option<ExceptionCode> {
        match self {
            ModbusError::Exception { code } => ExceptionCode::from_code(*code),
            _ => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, ModbusError::Transport(TransportError::Unavailable))
    }
}

pub type Result<T> = std::result::Result<T, ModbusError>;
