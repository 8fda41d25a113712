use core::fmt::{self, Display};
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

pub const MODBUS_ENABLE: u16 = 0x00;
pub const DRIVE_OUTPUT_ENABLE: u16 = 0x01;
pub const MOTOR_TARGET_SPEED: u16 = 0x02;
pub const MOTOR_ACCELERATION: u16 = 0x03;
pub const WEAK_MAGNETIC_ANGLE: u16 = 0x04;
pub const SPEED_RING_PROPORTIONAL_RATIO_COEFFICIENT: u16 = 0x05;
pub const SPEED_LOOP_INTEGRATION_TIME: u16 = 0x06;
pub const POSITION_RING_PROPORTIONAL_COEFFICIENT: u16 = 0x07;
pub const SPEED_FEED: u16 = 0x08;
pub const DIR_POLARITY: u16 = 0x09;
pub const ELECTRONIC_GEAR_MOLECULES: u16 = 0x0a;
pub const ELECTRONIC_GEAR_DENOMINATOR: u16 = 0x0b;
pub const TARGET_LOCATION_IS_16_BITS_LOWER: u16 = 0x0c;
pub const TARGET_POSITION_IS_16_BITS_HIGH: u16 = 0x0d;
pub const ALARM_CODE: u16 = 0x0e;
pub const SYSTEM_CURRENT: u16 = 0x0f;
pub const MOTOR_CURRENT_SPEED: u16 = 0x10;
pub const SYSTEM_VOLTAGE: u16 = 0x11;
pub const SYSTEM_TEMPERATURE: u16 = 0x12;
pub const THE_PWM_OF_THE_SYSTEM_OUTPUT: u16 = 0x13;
pub const PARAMETER_SAVING_FLAG: u16 = 0x14;
pub const DEVICE_ADDRESS: u16 = 0x15;
pub const ABSOLUTE_POSITION_IS_16_BITS_LOWER: u16 = 0x16;
pub const ABSOLUTE_POSITION_IS_16_BITS_HIGHER: u16 = 0x17;
pub const STILL_MAXIMUM_ALLOWED_OUTPUT: u16 = 0x18;
pub const SPECIFIC_FUNCTION: u16 = 0x19;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reg {
    pub address: u16,
    pub name: &'static str,
}

impl Reg {
    pub const fn new(address: u16, name: &'static str) -> Self {
        Reg { address, name }
    }
}

impl Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x} {}", self.address, self.name)
    }
}

/// Register map of the gold motor drive, in address order.
pub static REGS: &[Reg] = &[
    Reg::new(MODBUS_ENABLE, "MODBUS_ENABLE"),
    Reg::new(DRIVE_OUTPUT_ENABLE, "DRIVE_OUTPUT_ENABLE"),
    Reg::new(MOTOR_TARGET_SPEED, "MOTOR_TARGET_SPEED"),
    Reg::new(MOTOR_ACCELERATION, "MOTOR_ACCELERATION"),
    Reg::new(WEAK_MAGNETIC_ANGLE, "WEAK_MAGNETIC_ANGLE"),
    Reg::new(
        SPEED_RING_PROPORTIONAL_RATIO_COEFFICIENT,
        "SPEED_RING_PROPORTIONAL_RATIO_COEFFICIENT",
    ),
    Reg::new(SPEED_LOOP_INTEGRATION_TIME, "SPEED_LOOP_INTEGRATION_TIME"),
    Reg::new(
        POSITION_RING_PROPORTIONAL_COEFFICIENT,
        "POSITION_RING_PROPORTIONAL_COEFFICIENT",
    ),
    Reg::new(SPEED_FEED, "SPEED_FEED"),
    Reg::new(DIR_POLARITY, "DIR_POLARITY"),
    Reg::new(ELECTRONIC_GEAR_MOLECULES, "ELECTRONIC_GEAR_MOLECULES"),
    Reg::new(ELECTRONIC_GEAR_DENOMINATOR, "ELECTRONIC_GEAR_DENOMINATOR"),
    Reg::new(
        TARGET_LOCATION_IS_16_BITS_LOWER,
        "TARGET_LOCATION_IS_16_BITS_LOWER",
    ),
    Reg::new(
        TARGET_POSITION_IS_16_BITS_HIGH,
        "TARGET_POSITION_IS_16_BITS_HIGH",
    ),
    Reg::new(ALARM_CODE, "ALARM_CODE"),
    Reg::new(SYSTEM_CURRENT, "SYSTEM_CURRENT"),
    Reg::new(MOTOR_CURRENT_SPEED, "MOTOR_CURRENT_SPEED"),
    Reg::new(SYSTEM_VOLTAGE, "SYSTEM_VOLTAGE"),
    Reg::new(SYSTEM_TEMPERATURE, "SYSTEM_TEMPERATURE"),
    Reg::new(THE_PWM_OF_THE_SYSTEM_OUTPUT, "THE_PWM_OF_THE_SYSTEM_OUTPUT"),
    Reg::new(PARAMETER_SAVING_FLAG, "PARAMETER_SAVING_FLAG"),
    Reg::new(DEVICE_ADDRESS, "DEVICE_ADDRESS"),
    Reg::new(
        ABSOLUTE_POSITION_IS_16_BITS_LOWER,
        "ABSOLUTE_POSITION_IS_16_BITS_LOWER",
    ),
    Reg::new(
        ABSOLUTE_POSITION_IS_16_BITS_HIGHER,
        "ABSOLUTE_POSITION_IS_16_BITS_HIGHER",
    ),
    Reg::new(STILL_MAXIMUM_ALLOWED_OUTPUT, "STILL_MAXIMUM_ALLOWED_OUTPUT"),
    Reg::new(SPECIFIC_FUNCTION, "SPECIFIC_FUNCTION"),
];

/// A register given on the command line, either by name or by address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegSpec {
    Name(String),
    Address(u16),
}

#[derive(Error, Debug)]
pub enum RegSpecError {
    #[error("invalid register specification '{0}'")]
    BadRegSpec(String),
}

impl FromStr for RegSpec {
    type Err = RegSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lazy_static! {
            static ref RE: Regex =
                Regex::new(r"^(?:0[xX]([[:xdigit:]]{1,4})|(\d{1,5})|([_[:alpha:]][_[:alnum:]]*))$")
                    .unwrap();
        }
        let bad = || RegSpecError::BadRegSpec(s.to_string());

        let cap = RE.captures(s).ok_or_else(bad)?;
        if let Some(hex) = cap.get(1) {
            u16::from_str_radix(hex.as_str(), 16)
                .map(RegSpec::Address)
                .map_err(|_| bad())
        } else if let Some(dec) = cap.get(2) {
            dec.as_str()
                .parse::<u16>()
                .map(RegSpec::Address)
                .map_err(|_| bad())
        } else {
            Ok(RegSpec::Name(cap[3].to_ascii_uppercase()))
        }
    }
}

pub fn list_registers() -> &'static [Reg] {
    REGS
}

pub fn register_by_address(address: u16) -> Option<Reg> {
    REGS.iter().copied().find(|reg| reg.address == address)
}

pub fn find_register(regspec: &RegSpec) -> Option<Reg> {
    match regspec {
        RegSpec::Address(address) => register_by_address(*address),
        RegSpec::Name(name) => REGS.iter().copied().find(|reg| reg.name == name),
    }
}
