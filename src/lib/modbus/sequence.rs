use core::fmt::{self, Display};

use log::{info, warn};

use super::client::RegisterClient;
use super::regs::{self, REGS};
use super::{ModbusError, Result};
use crate::transport::{ByteTransport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterWrite {
    pub register: u16,
    pub value: u16,
}

impl RegisterWrite {
    pub const fn new(register: u16, value: u16) -> Self {
        Self { register, value }
    }
}

/// Settings exposed by the advanced panel of the motor configurator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvancedSettings {
    pub parameter_saving_flag: u16,
    pub specific_function: u16,
    pub speed_feed: u16,
    pub electronic_gear_molecules: u16,
    pub alarm_code: u16,
    pub device_address: u16,
    pub modbus_enable: u16,
    pub drive_output_enable: u16,
    pub motor_target_speed: u16,
    pub motor_acceleration: u16,
    pub weak_magnetic_angle: u16,
    pub speed_loop_integration_time: u16,
}

impl Default for AdvancedSettings {
    fn default() -> Self {
        Self {
            parameter_saving_flag: 0,
            specific_function: 0,
            speed_feed: 3900,
            electronic_gear_molecules: 32768,
            alarm_code: 0,
            device_address: 1,
            modbus_enable: 0,
            drive_output_enable: 7,
            motor_target_speed: 1500,
            motor_acceleration: 50000,
            weak_magnetic_angle: 495,
            speed_loop_integration_time: 10,
        }
    }
}

/// Motor settings written by one configuration pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotorSettings {
    pub steps_per_revolution: u16,
    pub max_output: u16,
    pub speed_kp: u16,
    pub position_kp: u16,
    pub direction_polarity: bool,
    pub advanced: Option<AdvancedSettings>,
}

impl Default for MotorSettings {
    fn default() -> Self {
        Self {
            steps_per_revolution: 800,
            max_output: 600,
            speed_kp: 3000,
            position_kp: 3000,
            direction_polarity: true,
            advanced: None,
        }
    }
}

impl MotorSettings {
    /// Ordered register batch. Advanced registers come first, and the batch
    /// always ends by setting the parameter saving flag so the drive commits
    /// the values to its EEPROM.
    pub fn to_batch(&self) -> Vec<RegisterWrite> {
        let mut batch = Vec::new();

        if let Some(adv) = &self.advanced {
            batch.extend([
                RegisterWrite::new(regs::PARAMETER_SAVING_FLAG, adv.parameter_saving_flag),
                RegisterWrite::new(regs::SPECIFIC_FUNCTION, adv.specific_function),
                RegisterWrite::new(regs::SPEED_FEED, adv.speed_feed),
                RegisterWrite::new(regs::ELECTRONIC_GEAR_MOLECULES, adv.electronic_gear_molecules),
                RegisterWrite::new(regs::ALARM_CODE, adv.alarm_code),
                RegisterWrite::new(regs::DEVICE_ADDRESS, adv.device_address),
                RegisterWrite::new(regs::MODBUS_ENABLE, adv.modbus_enable),
                RegisterWrite::new(regs::DRIVE_OUTPUT_ENABLE, adv.drive_output_enable),
                RegisterWrite::new(regs::MOTOR_TARGET_SPEED, adv.motor_target_speed),
                RegisterWrite::new(regs::MOTOR_ACCELERATION, adv.motor_acceleration),
                RegisterWrite::new(regs::WEAK_MAGNETIC_ANGLE, adv.weak_magnetic_angle),
                RegisterWrite::new(
                    regs::SPEED_LOOP_INTEGRATION_TIME,
                    adv.speed_loop_integration_time,
                ),
            ]);
        }

        batch.extend([
            RegisterWrite::new(regs::ELECTRONIC_GEAR_DENOMINATOR, self.steps_per_revolution),
            RegisterWrite::new(regs::STILL_MAXIMUM_ALLOWED_OUTPUT, self.max_output),
            RegisterWrite::new(
                regs::SPEED_RING_PROPORTIONAL_RATIO_COEFFICIENT,
                self.speed_kp,
            ),
            RegisterWrite::new(regs::POSITION_RING_PROPORTIONAL_COEFFICIENT, self.position_kp),
            RegisterWrite::new(regs::DIR_POLARITY, u16::from(self.direction_polarity)),
            RegisterWrite::new(regs::PARAMETER_SAVING_FLAG, 1),
        ]);
        batch
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    EnableConfig,
    DisableDrive,
    ApplySettings { repetition: usize },
    EnableDrive,
    VerifyReadback,
}

impl Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::EnableConfig => "enable-config".fmt(f),
            Phase::DisableDrive => "disable-drive".fmt(f),
            Phase::ApplySettings { repetition } => write!(f, "apply-settings #{}", repetition),
            Phase::EnableDrive => "enable-drive".fmt(f),
            Phase::VerifyReadback => "verify-readback".fmt(f),
        }
    }
}

#[derive(Debug)]
pub struct WriteRecord {
    pub phase: Phase,
    pub register: u16,
    pub value: u16,
    pub result: Result<()>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadbackRow {
    pub address: u16,
    pub name: &'static str,
    /// `None` when the register could not be read back.
    pub value: Option<u16>,
    /// Part of the batch that was just written.
    pub written: bool,
}

#[derive(Debug, Default)]
pub struct WriteReport {
    pub writes: Vec<WriteRecord>,
    pub readback: Vec<ReadbackRow>,
    pub read_failures: Vec<(u16, ModbusError)>,
}

impl WriteReport {
    pub fn failed_writes(&self) -> impl Iterator<Item = &WriteRecord> {
        self.writes.iter().filter(|w| w.result.is_err())
    }

    pub fn highlighted(&self) -> usize {
        self.readback.iter().filter(|row| row.written).count()
    }

    pub fn is_clean(&self) -> bool {
        self.failed_writes().next().is_none() && self.read_failures.is_empty()
    }
}

fn is_safety_register(register: u16) -> bool {
    register == regs::MODBUS_ENABLE || register == regs::DRIVE_OUTPUT_ENABLE
}

async fn write_step<T: ByteTransport>(
    client: &mut RegisterClient<T>,
    report: &mut WriteReport,
    phase: Phase,
    write: RegisterWrite,
) {
    let result = client.write_register(write.register, write.value).await;
    if let Err(e) = &result {
        warn!(
            "{}: write 0x{:02x} = {} failed: {}",
            phase, write.register, write.value, e
        );
    }
    report.writes.push(WriteRecord {
        phase,
        register: write.register,
        value: write.value,
        result,
    });
}

/// Reads every register of the map in address order.
///
/// Registers listed in `written` are flagged in the returned rows. A failed
/// read leaves the row without a value and is reported next to the rows.
pub async fn read_all<T: ByteTransport>(
    client: &mut RegisterClient<T>,
    written: &[u16],
) -> Result<(Vec<ReadbackRow>, Vec<(u16, ModbusError)>)> {
    if !client.is_connected() {
        return Err(TransportError::Unavailable.into());
    }

    let mut rows = Vec::with_capacity(REGS.len());
    let mut failures = Vec::new();

    for reg in REGS {
        let value = match client.read_register(reg.address).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("read {} failed: {}", reg, e);
                failures.push((reg.address, e));
                None
            }
        };
        rows.push(ReadbackRow {
            address: reg.address,
            name: reg.name,
            value,
            written: written.contains(&reg.address),
        });
    }

    Ok((rows, failures))
}

/// Applies a register batch under the drive's safety protocol.
///
/// Modbus mode is enabled and motor output is disabled before any setting is
/// touched; the whole batch is then written `repetitions` times (from the
/// client config), motor output is re-enabled and every register is read
/// back. Failed writes are recorded, never fatal: the drive must end up
/// re-enabled whatever happened in between. Only a missing connection
/// aborts.
///
/// Batch entries for `MODBUS_ENABLE` or `DRIVE_OUTPUT_ENABLE` are kept out
/// of the repeated writes and applied once after the drive is re-enabled.
pub async fn apply_settings<T: ByteTransport>(
    client: &mut RegisterClient<T>,
    batch: &[RegisterWrite],
) -> Result<WriteReport> {
    if !client.is_connected() {
        return Err(TransportError::Unavailable.into());
    }

    // The safety registers are owned by the enable/disable phases; values
    // for them in the batch are written once, after the drive is back on.
    let (deferred, mut settings): (Vec<RegisterWrite>, Vec<RegisterWrite>) = batch
        .iter()
        .copied()
        .partition(|w| is_safety_register(w.register));
    let commit = RegisterWrite::new(regs::PARAMETER_SAVING_FLAG, 1);
    if !settings.contains(&commit) {
        settings.push(commit);
    }

    let repetitions = client.config().repetitions.max(1);
    let mut report = WriteReport::default();

    info!("Enabling Modbus and disabling motor power output");
    write_step(
        client,
        &mut report,
        Phase::EnableConfig,
        RegisterWrite::new(regs::MODBUS_ENABLE, 1),
    )
    .await;
    write_step(
        client,
        &mut report,
        Phase::DisableDrive,
        RegisterWrite::new(regs::DRIVE_OUTPUT_ENABLE, 0),
    )
    .await;

    for repetition in 1..=repetitions {
        info!("Writing settings... loop #{}/{}", repetition, repetitions);
        for write in &settings {
            write_step(
                client,
                &mut report,
                Phase::ApplySettings { repetition },
                *write,
            )
            .await;
        }
    }

    info!("Re-enabling motor power output");
    write_step(
        client,
        &mut report,
        Phase::EnableDrive,
        RegisterWrite::new(regs::DRIVE_OUTPUT_ENABLE, 1),
    )
    .await;
    for write in &deferred {
        write_step(client, &mut report, Phase::EnableDrive, *write).await;
    }

    info!("Reading back registers");
    let written: Vec<u16> = settings
        .iter()
        .chain(&deferred)
        .map(|w| w.register)
        .collect();
    let (readback, read_failures) = read_all(client, &written).await?;
    report.readback = readback;
    report.read_failures = read_failures;

    info!(
        "write complete: {} of {} writes failed, {} registers updated",
        report.failed_writes().count(),
        report.writes.len(),
        report.highlighted()
    );
    Ok(report)
}
