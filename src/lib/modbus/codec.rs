use core::cmp;
use core::fmt::{self, Display};

use crc::{Crc, CRC_16_MODBUS};
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

use super::{ModbusError, Result};
use crate::transport::FrameLength;

pub const DEFAULT_SLAVE_ADDRESS: u8 = 0x01;

pub const REQUEST_LEN: usize = 8;
pub const READ_RESPONSE_MIN_LEN: usize = 7;
pub const WRITE_RESPONSE_LEN: usize = 8;
pub const EXCEPTION_RESPONSE_LEN: usize = 5;

pub const EXCEPTION_FLAG: u8 = 0x80;

const MODBUS_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum FunctionCode {
    ReadHoldingRegisters = 0x03,
    WriteSingleRegister = 0x06,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum ExceptionCode {
    IllegalFunction = 0x01,
    IllegalDataAddress = 0x02,
    IllegalDataValue = 0x03,
    ServerDeviceFailure = 0x04,
    Acknowledge = 0x05,
    ServerDeviceBusy = 0x06,
    MemoryParityError = 0x08,
    GatewayPathUnavailable = 0x0A,
    GatewayTargetFailedToRespond = 0x0B,
}

impl ExceptionCode {
    pub fn from_code(code: u8) -> Option<Self> {
        Self::from_u8(code)
    }
}

impl Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExceptionCode::IllegalFunction => "illegal function".fmt(f),
            ExceptionCode::IllegalDataAddress => "illegal data address".fmt(f),
            ExceptionCode::IllegalDataValue => "illegal data value".fmt(f),
            ExceptionCode::ServerDeviceFailure => "server device failure".fmt(f),
            ExceptionCode::Acknowledge => "acknowledge".fmt(f),
            ExceptionCode::ServerDeviceBusy => "server device busy".fmt(f),
            ExceptionCode::MemoryParityError => "memory parity error".fmt(f),
            ExceptionCode::GatewayPathUnavailable => "gateway path unavailable".fmt(f),
            ExceptionCode::GatewayTargetFailedToRespond => {
                "gateway target failed to respond".fmt(f)
            }
        }
    }
}

/// CRC-16/MODBUS: reflected polynomial 0xA001, initial value 0xFFFF.
///
/// This is the plain checksum value. Frames carry it low byte first, see
/// [`crc_wire_bytes`].
pub fn crc16_modbus(bytes: &[u8]) -> u16 {
    MODBUS_CRC.checksum(bytes)
}

/// The two CRC bytes as they go on the wire: the result is byte-swapped and
/// then stored big-endian, so the low byte leads.
pub fn crc_wire_bytes(crc: u16) -> [u8; 2] {
    crc.swap_bytes().to_be_bytes()
}

/// Checks the trailing two CRC bytes of a complete frame.
pub fn crc_matches(frame: &[u8]) -> bool {
    if frame.len() < 3 {
        return false;
    }
    let (body, tail) = frame.split_at(frame.len() - 2);
    crc_wire_bytes(crc16_modbus(body)) == tail
}

fn append_crc(frame: &mut Vec<u8>) {
    let crc = crc16_modbus(frame);
    frame.extend_from_slice(&crc_wire_bytes(crc));
}

pub fn build_request(slave: u8, function: FunctionCode, register: u16, value: u16) -> [u8; REQUEST_LEN] {
    let mut frame = [0u8; REQUEST_LEN];

    frame[0] = slave;
    frame[1] = function as u8;
    frame[2..4].copy_from_slice(&register.to_be_bytes());
    frame[4..6].copy_from_slice(&value.to_be_bytes());

    let crc = crc16_modbus(&frame[0..6]);
    frame[6..8].copy_from_slice(&crc_wire_bytes(crc));
    frame
}

/// Read one holding register from the default slave.
pub fn build_read_command(register: u16) -> [u8; REQUEST_LEN] {
    build_request(
        DEFAULT_SLAVE_ADDRESS,
        FunctionCode::ReadHoldingRegisters,
        register,
        1,
    )
}

pub fn build_write_command(register: u16, value: u16) -> [u8; REQUEST_LEN] {
    build_request(
        DEFAULT_SLAVE_ADDRESS,
        FunctionCode::WriteSingleRegister,
        register,
        value,
    )
}

pub fn build_read_response(slave: u8, values: &[u16]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(5 + 2 * values.len());
    frame.push(slave);
    frame.push(FunctionCode::ReadHoldingRegisters as u8);
    frame.push((values.len() * 2) as u8);
    for value in values {
        frame.extend_from_slice(&value.to_be_bytes());
    }
    append_crc(&mut frame);
    frame
}

/// A successful single-register write is acknowledged by echoing the request.
pub fn build_write_echo(slave: u8, register: u16, value: u16) -> [u8; WRITE_RESPONSE_LEN] {
    build_request(slave, FunctionCode::WriteSingleRegister, register, value)
}

pub fn build_exception_response(slave: u8, function: u8, code: u8) -> Vec<u8> {
    let mut frame = vec![slave, function | EXCEPTION_FLAG, code];
    append_crc(&mut frame);
    frame
}

/// Decoded payload of a read response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterValues {
    Single(u16),
    Multiple(Vec<u16>),
}

impl RegisterValues {
    pub fn single(&self) -> Option<u16> {
        match self {
            RegisterValues::Single(value) => Some(*value),
            RegisterValues::Multiple(_) => None,
        }
    }

    pub fn to_vec(&self) -> Vec<u16> {
        match self {
            RegisterValues::Single(value) => vec![*value],
            RegisterValues::Multiple(values) => values.clone(),
        }
    }
}

fn check_exception(bytes: &[u8], expected: usize) -> Result<u8> {
    if bytes.len() < 3 {
        return Err(ModbusError::Incomplete {
            received: bytes.len(),
            expected,
        });
    }
    let function = bytes[1];
    if function & EXCEPTION_FLAG != 0 {
        return Err(ModbusError::Exception { code: bytes[2] });
    }
    if bytes.len() < expected {
        return Err(ModbusError::Incomplete {
            received: bytes.len(),
            expected,
        });
    }
    Ok(function)
}

/// Decodes `[slave][0x03][byte count][data...][crc]`.
///
/// One register decodes to [`RegisterValues::Single`], anything else to
/// [`RegisterValues::Multiple`].
pub fn parse_read_response(bytes: &[u8]) -> Result<RegisterValues> {
    let function = check_exception(bytes, READ_RESPONSE_MIN_LEN)?;
    if function != FunctionCode::ReadHoldingRegisters as u8 {
        return Err(ModbusError::UnexpectedFunction(function));
    }

    let count = usize::from(bytes[2]) / 2;
    let end = 3 + 2 * count;
    if bytes.len() < end + 2 {
        return Err(ModbusError::Incomplete {
            received: bytes.len(),
            expected: end + 2,
        });
    }

    let mut values: Vec<u16> = bytes[3..end]
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();

    Ok(if values.len() == 1 {
        RegisterValues::Single(values.remove(0))
    } else {
        RegisterValues::Multiple(values)
    })
}

/// `true` when the drive echoed a single-register write, `false` for any
/// other function code.
pub fn parse_write_response(bytes: &[u8]) -> Result<bool> {
    let function = check_exception(bytes, WRITE_RESPONSE_LEN)?;
    Ok(function == FunctionCode::WriteSingleRegister as u8)
}

/// Which response the accumulator is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Read,
    Write,
}

impl ResponseKind {
    pub const fn min_len(self) -> usize {
        match self {
            ResponseKind::Read => READ_RESPONSE_MIN_LEN,
            ResponseKind::Write => WRITE_RESPONSE_LEN,
        }
    }
}

impl FrameLength for ResponseKind {
    fn needed(&self, received: &[u8]) -> usize {
        if received.len() >= 2 && received[1] & EXCEPTION_FLAG != 0 {
            return EXCEPTION_RESPONSE_LEN;
        }
        match self {
            ResponseKind::Read => match received {
                [_, function, count, ..] if *function == FunctionCode::ReadHoldingRegisters as u8 => {
                    cmp::max(READ_RESPONSE_MIN_LEN, 5 + usize::from(*count))
                }
                _ => READ_RESPONSE_MIN_LEN,
            },
            ResponseKind::Write => WRITE_RESPONSE_LEN,
        }
    }
}
