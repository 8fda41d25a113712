//! Line command protocol of the OSSM BLE controller.
//!
//! Commands are short ASCII strings (`verb:param:value`) written to one
//! characteristic; state, pattern and wifi information is read back as JSON.

mod command;
mod gatt;
mod payload;
mod session;

use std::io;

use thiserror::Error;

pub use command::{
    encode_set_command, encode_stream_command, encode_stream_position, encode_wifi_command,
    Command, Mode, Parameter, MAX_PERCENT, MAX_STREAM_DURATION_MS, MAX_STREAM_POSITION,
};
pub use gatt::{Characteristic, CharacteristicTransport, SERVICE_UUID};
pub use payload::{
    decode_pattern_list, decode_state_report, decode_wifi_status, default_patterns,
    try_decode_pattern_list, CommandReply, ControlState, DeviceState, PatternEntry, WifiStatus,
    DEFAULT_PATTERNS,
};
pub use session::{BleSession, Direction, LogEntry};

#[derive(Error, Debug)]
pub enum BleError {
    #[error("no connection to device")]
    Unavailable,
    #[error("characteristic {0} not available")]
    MissingCharacteristic(Characteristic),
    #[error("cannot decode payload: {0}")]
    Decode(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("timed out waiting for device")]
    TimedOut,
    #[error("device rejected request: {0}")]
    Rejected(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, BleError>;
