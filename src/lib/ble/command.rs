use core::fmt::{self, Display};
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;

use super::gatt::Characteristic;
use super::{BleError, Result};

pub const MAX_STREAM_POSITION: u8 = 100;
pub const MAX_PERCENT: u8 = 100;
pub const MAX_STREAM_DURATION_MS: u16 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    SimplePenetration,
    StrokeEngine,
    Streaming,
    Menu,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::SimplePenetration => "simplePenetration",
            Mode::StrokeEngine => "strokeEngine",
            Mode::Streaming => "streaming",
            Mode::Menu => "menu",
        }
    }
}

impl FromStr for Mode {
    type Err = BleError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "simplePenetration" => Ok(Mode::SimplePenetration),
            "strokeEngine" => Ok(Mode::StrokeEngine),
            "streaming" => Ok(Mode::Streaming),
            "menu" => Ok(Mode::Menu),
            _ => Err(BleError::InvalidArgument(format!("unknown mode '{}'", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    Speed,
    Stroke,
    Depth,
    Sensation,
    Buffer,
    Pattern,
}

impl Parameter {
    /// Upper bound the firmware accepts, for the percentage controls.
    pub fn max_value(self) -> Option<u32> {
        match self {
            Parameter::Speed | Parameter::Stroke | Parameter::Depth | Parameter::Sensation => {
                Some(u32::from(MAX_PERCENT))
            }
            Parameter::Buffer | Parameter::Pattern => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Parameter::Speed => "speed",
            Parameter::Stroke => "stroke",
            Parameter::Depth => "depth",
            Parameter::Sensation => "sensation",
            Parameter::Buffer => "buffer",
            Parameter::Pattern => "pattern",
        }
    }
}

impl FromStr for Parameter {
    type Err = BleError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "speed" => Ok(Parameter::Speed),
            "stroke" => Ok(Parameter::Stroke),
            "depth" => Ok(Parameter::Depth),
            "sensation" => Ok(Parameter::Sensation),
            "buffer" => Ok(Parameter::Buffer),
            "pattern" => Ok(Parameter::Pattern),
            _ => Err(BleError::InvalidArgument(format!(
                "unknown parameter '{}'",
                s
            ))),
        }
    }
}

/// A command accepted by the OSSM firmware.
///
/// `Display` yields the exact string written to the characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Go(Mode),
    Set(Parameter, u32),
    Wifi { ssid: String, password: String },
    Stream { position: u8, duration_ms: u16 },
}

impl Command {
    /// Stream target with both arguments clamped to the firmware range.
    pub fn stream(position: i64, duration_ms: i64) -> Self {
        Command::Stream {
            position: position.clamp(0, i64::from(MAX_STREAM_POSITION)) as u8,
            duration_ms: duration_ms.clamp(0, i64::from(MAX_STREAM_DURATION_MS)) as u16,
        }
    }

    /// Stream target from fractional inputs (funscript positions, time
    /// deltas); rounds to the nearest integer before clamping. NaN maps to
    /// zero.
    pub fn stream_rounded(position: f64, duration_ms: f64) -> Self {
        let round = |v: f64| if v.is_nan() { 0 } else { v.round() as i64 };
        Command::stream(round(position), round(duration_ms))
    }

    /// Wifi credentials. The firmware splits at the first `|`, so the ssid
    /// must not contain one; the password may.
    pub fn wifi(ssid: &str, password: &str) -> Result<Self> {
        if ssid.is_empty() || password.is_empty() {
            return Err(BleError::InvalidArgument(
                "ssid and password must not be empty".to_string(),
            ));
        }
        if ssid.contains('|') {
            return Err(BleError::InvalidArgument(format!(
                "ssid '{}' contains the '|' separator",
                ssid
            )));
        }
        if ssid.contains('\n') || password.contains('\n') {
            return Err(BleError::InvalidArgument(
                "credentials must be a single line".to_string(),
            ));
        }
        Ok(Command::Wifi {
            ssid: ssid.to_string(),
            password: password.to_string(),
        })
    }

    /// The command with every value pulled into the range the firmware
    /// accepts. This is what goes on the wire.
    pub fn normalized(&self) -> Self {
        match self {
            Command::Stream {
                position,
                duration_ms,
            } => Command::stream(i64::from(*position), i64::from(*duration_ms)),
            Command::Set(parameter, value) => Command::Set(
                *parameter,
                parameter.max_value().map_or(*value, |max| (*value).min(max)),
            ),
            other => other.clone(),
        }
    }

    /// Characteristic the command has to be written to.
    pub fn characteristic(&self) -> Characteristic {
        match self {
            Command::Wifi { .. } => Characteristic::WifiConfig,
            _ => Characteristic::Command,
        }
    }

    /// Wire string with the wifi password masked, for logs.
    pub fn redacted(&self) -> String {
        match self {
            Command::Wifi { ssid, .. } => format!("set:wifi:{}|***", ssid),
            other => other.to_string(),
        }
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Go(mode) => write!(f, "go:{}", mode.as_str()),
            Command::Set(parameter, value) => write!(f, "set:{}:{}", parameter.as_str(), value),
            Command::Wifi { ssid, password } => write!(f, "set:wifi:{}|{}", ssid, password),
            Command::Stream {
                position,
                duration_ms,
            } => write!(f, "stream:{}:{}", position, duration_ms),
        }
    }
}

impl FromStr for Command {
    type Err = BleError;

    /// Accepts exactly the strings the firmware command handler accepts.
    fn from_str(s: &str) -> Result<Self> {
        lazy_static! {
            static ref RE: Regex = Regex::new(
                r"^(?:go:(simplePenetration|strokeEngine|streaming|menu)|set:(speed|stroke|depth|sensation|buffer|pattern):(\d+)|set:wifi:([^|]+)\|(.+)|stream:(\d+):(\d+))$"
            )
            .unwrap();
        }
        let invalid = || BleError::InvalidArgument(format!("invalid command '{}'", s));
        let number = |digits: &str| digits.parse::<u32>().map_err(|_| invalid());

        let cap = RE.captures(s).ok_or_else(invalid)?;
        if let Some(mode) = cap.get(1) {
            Ok(Command::Go(mode.as_str().parse()?))
        } else if let Some(parameter) = cap.get(2) {
            Ok(Command::Set(parameter.as_str().parse()?, number(&cap[3])?).normalized())
        } else if let Some(ssid) = cap.get(4) {
            Ok(Command::Wifi {
                ssid: ssid.as_str().to_string(),
                password: cap[5].to_string(),
            })
        } else {
            Ok(Command::stream(
                i64::from(number(&cap[6])?),
                i64::from(number(&cap[7])?),
            ))
        }
    }
}

/// `set:<parameter>:<value>` for an arbitrary parameter name.
pub fn encode_set_command(parameter: &str, value: i64) -> Result<String> {
    if parameter.is_empty() || parameter.contains(':') {
        return Err(BleError::InvalidArgument(format!(
            "bad parameter name '{}'",
            parameter
        )));
    }
    Ok(format!("set:{}:{}", parameter, value))
}

pub fn encode_stream_command(position: i64, duration_ms: i64) -> String {
    Command::stream(position, duration_ms).to_string()
}

pub fn encode_stream_position(position: f64, duration_ms: f64) -> String {
    Command::stream_rounded(position, duration_ms).to_string()
}

pub fn encode_wifi_command(ssid: &str, password: &str) -> Result<String> {
    Ok(Command::wifi(ssid, password)?.to_string())
}
