use std::ops::Deref;
use std::path::PathBuf;
use std::str::FromStr;

use clap::{ArgEnum, Parser, Subcommand};
use hex::FromHex;
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use ossm_protocol::modbus::regs::RegSpec;

#[derive(Error, Debug)]
pub enum InputError {
    #[error("invalid hex bytes '{0}'")]
    BadHex(String),
    #[error("invalid setting '{0}', expected <register>=<value>")]
    BadSetting(String),
}

/// Bytes given as hex pairs, optionally separated by spaces or colons.
#[derive(Debug, Clone)]
pub struct HexBytes(Vec<u8>);

impl Deref for HexBytes {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromStr for HexBytes {
    type Err = InputError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let digits: String = input
            .trim_start_matches("0x")
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ':')
            .collect();
        Vec::from_hex(&digits)
            .map(HexBytes)
            .map_err(|_| InputError::BadHex(input.to_string()))
    }
}

/// Extra register write for the simulated batch, `<register>=<value>`.
#[derive(Debug, Clone)]
pub struct SettingSpec {
    pub reg: RegSpec,
    pub value: u16,
}

impl FromStr for SettingSpec {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lazy_static! {
            static ref RE: Regex = Regex::new(r"^([^=\s]+)=(\S+)$").unwrap();
        }
        let bad = || InputError::BadSetting(s.to_string());

        let c = RE.captures(s).ok_or_else(bad)?;
        Ok(SettingSpec {
            reg: c[1].parse().map_err(|_| bad())?,
            value: parse_with_radix(&c[2]).map_err(|_| bad())?,
        })
    }
}

pub fn parse_with_radix<T>(input: &str) -> Result<T, T::FromStrRadixErr>
where
    T: num_traits::Num,
    <T as num_traits::Num>::FromStrRadixErr: std::error::Error + Send + Sync,
{
    if let Some(hex) = input.strip_prefix("0x") {
        T::from_str_radix(hex, 16)
    } else if let Some(bin) = input.strip_prefix("0b") {
        T::from_str_radix(bin, 2)
    } else {
        T::from_str_radix(input, 10)
    }
}

#[derive(ArgEnum, Clone, Copy, Debug)]
pub enum FrameType {
    Read,
    Write,
}

#[derive(ArgEnum, Clone, Copy, Debug)]
pub enum PayloadType {
    State,
    Patterns,
    Wifi,
    Reply,
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// enable debug output
    #[clap(long, short)]
    pub debug: bool,

    /// Use json-formatted output
    #[clap(long, short)]
    pub json: bool,

    /// Modbus slave address of the drive
    #[clap(long, short, default_value = "1", parse(try_from_str=parse_with_radix))]
    pub slave: u8,

    /// How many times a settings batch is written
    #[clap(long, short, default_value_t = ossm_protocol::config::DEFAULT_REPETITIONS)]
    pub repetitions: usize,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List gold motor registers
    ListRegisters,

    /// Build a Modbus request frame
    Frame {
        #[clap(subcommand)]
        request: FrameRequest,
    },

    /// Compute the Modbus CRC of some bytes
    Crc {
        #[clap(required = true)]
        bytes: Vec<HexBytes>,
    },

    /// Decode a Modbus response frame
    Parse {
        #[clap(arg_enum)]
        kind: FrameType,
        #[clap(required = true)]
        bytes: Vec<HexBytes>,
    },

    /// Run the settings write sequence against a simulated drive
    SimulateWrite {
        /// Steps per revolution
        #[clap(long, default_value_t = 800)]
        steps_per_rev: u16,
        /// Maximum allowed output
        #[clap(long, default_value_t = 600)]
        max_output: u16,
        /// Speed loop proportional coefficient
        #[clap(long, default_value_t = 3000)]
        speed_kp: u16,
        /// Position loop proportional coefficient
        #[clap(long, default_value_t = 3000)]
        position_kp: u16,
        /// Invert the direction polarity
        #[clap(long)]
        reverse: bool,
        /// Include the advanced settings block
        #[clap(long)]
        advanced: bool,
        /// Make the simulated drive reject writes to a register
        #[clap(long)]
        reject: Vec<RegSpec>,
        /// Extra writes, <register>=<value>
        settings: Vec<SettingSpec>,
    },

    /// Validate a raw OSSM command line
    Command { line: String },

    /// Encode a set:<parameter>:<value> command
    Set {
        parameter: String,
        #[clap(allow_hyphen_values = true)]
        value: i64,
    },

    /// Encode a stream command (clamped to the firmware range)
    Stream {
        #[clap(allow_hyphen_values = true)]
        position: f64,
        #[clap(allow_hyphen_values = true)]
        duration_ms: f64,
    },

    /// Encode a wifi credentials command
    Wifi { ssid: String, password: String },

    /// Decode a BLE characteristic payload
    Decode {
        #[clap(arg_enum)]
        kind: PayloadType,
        payload: String,
    },

    /// Print the stream commands of a funscript file
    Funscript {
        file: PathBuf,
        /// Resume after this media time (ms)
        #[clap(long)]
        after: Option<u64>,
    },
}

#[derive(Subcommand, Debug)]
pub enum FrameRequest {
    /// Read one holding register
    Read { reg: RegSpec },

    /// Write one holding register
    Write {
        reg: RegSpec,
        #[clap(parse(try_from_str=parse_with_radix))]
        value: u16,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_bytes_forms() {
        assert_eq!(*"010300000001".parse::<HexBytes>().unwrap(), vec![1, 3, 0, 0, 0, 1]);
        assert_eq!(*"01 83 02".parse::<HexBytes>().unwrap(), vec![1, 0x83, 2]);
        assert_eq!(*"0x84:0a".parse::<HexBytes>().unwrap(), vec![0x84, 0x0a]);
        assert!("0g".parse::<HexBytes>().is_err());
        assert!("123".parse::<HexBytes>().is_err());
    }

    #[test]
    fn radix_prefixes() {
        assert_eq!(parse_with_radix::<u16>("0x14").unwrap(), 20);
        assert_eq!(parse_with_radix::<u16>("0b101").unwrap(), 5);
        assert_eq!(parse_with_radix::<u16>("800").unwrap(), 800);
        assert!(parse_with_radix::<u8>("256").is_err());
    }

    #[test]
    fn setting_spec() {
        let spec: SettingSpec = "speed_feed=0x0f3c".parse().unwrap();
        assert_eq!(spec.reg, RegSpec::Name("SPEED_FEED".to_string()));
        assert_eq!(spec.value, 3900);

        let spec: SettingSpec = "0x19=1".parse().unwrap();
        assert_eq!(spec.reg, RegSpec::Address(0x19));
        assert!("speed_feed".parse::<SettingSpec>().is_err());
        assert!("x=70000".parse::<SettingSpec>().is_err());
    }

    #[test]
    fn cli_parses() {
        let cli = Cli::try_parse_from(["ossm-tool", "--json", "stream", "-10", "20000"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Stream { position, .. } if position == -10.0));

        let cli = Cli::try_parse_from(["ossm-tool", "frame", "write", "dir_polarity", "0x1"]).unwrap();
        match cli.command {
            Commands::Frame {
                request: FrameRequest::Write { reg, value },
            } => {
                assert_eq!(reg, RegSpec::Name("DIR_POLARITY".to_string()));
                assert_eq!(value, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
