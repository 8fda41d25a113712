use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use log::debug;

use super::codec::{
    build_exception_response, build_read_response, build_write_echo, crc_matches, ExceptionCode,
    FunctionCode, DEFAULT_SLAVE_ADDRESS, REQUEST_LEN,
};
use super::regs::{self, REGS};
use crate::transport::{ByteTransport, Result};

const FACTORY_VALUES: [(u16, u16); 12] = [
    (regs::DRIVE_OUTPUT_ENABLE, 1),
    (regs::MOTOR_TARGET_SPEED, 1500),
    (regs::MOTOR_ACCELERATION, 50000),
    (regs::WEAK_MAGNETIC_ANGLE, 495),
    (regs::SPEED_RING_PROPORTIONAL_RATIO_COEFFICIENT, 3000),
    (regs::SPEED_LOOP_INTEGRATION_TIME, 10),
    (regs::POSITION_RING_PROPORTIONAL_COEFFICIENT, 3000),
    (regs::SPEED_FEED, 3900),
    (regs::ELECTRONIC_GEAR_MOLECULES, 32768),
    (regs::ELECTRONIC_GEAR_DENOMINATOR, 800),
    (regs::DEVICE_ADDRESS, 1),
    (regs::STILL_MAXIMUM_ALLOWED_OUTPUT, 600),
];

/// In-memory gold motor drive speaking Modbus-RTU.
///
/// Answers requests the way the real drive does and can be told to misbehave
/// (reject a register, lose replies, deliver responses in small chunks).
pub struct SimulatedDrive {
    slave: u8,
    regs: Vec<u16>,
    outbox: VecDeque<u8>,
    chunk_size: usize,
    requests: Vec<Vec<u8>>,
    rejected: HashMap<u16, u8>,
    lost_replies: HashMap<u16, usize>,
    writes_while_enabled: usize,
}

impl Default for SimulatedDrive {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedDrive {
    pub fn new() -> Self {
        let mut regs = vec![0u16; REGS.len()];
        for (address, value) in FACTORY_VALUES {
            regs[address as usize] = value;
        }

        Self {
            slave: DEFAULT_SLAVE_ADDRESS,
            regs,
            outbox: VecDeque::new(),
            chunk_size: usize::MAX,
            requests: Vec::new(),
            rejected: HashMap::new(),
            lost_replies: HashMap::new(),
            writes_while_enabled: 0,
        }
    }

    pub fn with_slave_address(mut self, slave: u8) -> Self {
        self.slave = slave;
        self
    }

    /// Deliver responses at most `size` bytes per read.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Answer every write to `register` with exception `code`.
    pub fn with_rejected_register(mut self, register: u16, code: ExceptionCode) -> Self {
        self.rejected.insert(register, code as u8);
        self
    }

    /// Apply the next `count` writes to `register` but never answer them.
    pub fn with_lost_replies(mut self, register: u16, count: usize) -> Self {
        self.lost_replies.insert(register, count);
        self
    }

    pub fn register(&self, address: u16) -> Option<u16> {
        self.regs.get(address as usize).copied()
    }

    /// Every frame received, valid or not, in arrival order.
    pub fn requests(&self) -> &[Vec<u8>] {
        &self.requests
    }

    /// `(register, value)` of every well-formed write request, in order.
    pub fn writes(&self) -> Vec<(u16, u16)> {
        self.requests
            .iter()
            .filter(|frame| frame.len() == REQUEST_LEN)
            .filter(|frame| frame[1] == FunctionCode::WriteSingleRegister as u8)
            .map(|frame| {
                (
                    u16::from_be_bytes([frame[2], frame[3]]),
                    u16::from_be_bytes([frame[4], frame[5]]),
                )
            })
            .collect()
    }

    /// Parameter writes that arrived while the motor output was enabled.
    pub fn writes_while_enabled(&self) -> usize {
        self.writes_while_enabled
    }

    fn handle_read(&mut self, address: u16, count: u16) {
        let start = address as usize;
        let end = start + count as usize;

        if count == 0 || end > self.regs.len() {
            debug!("sim: read out of range {}+{}", address, count);
            self.reply(&build_exception_response(
                self.slave,
                FunctionCode::ReadHoldingRegisters as u8,
                ExceptionCode::IllegalDataAddress as u8,
            ));
            return;
        }

        let response = build_read_response(self.slave, &self.regs[start..end]);
        self.reply(&response);
    }

    fn handle_write(&mut self, address: u16, value: u16) {
        if let Some(&code) = self.rejected.get(&address) {
            debug!("sim: rejecting write to 0x{:02x}", address);
            self.reply(&build_exception_response(
                self.slave,
                FunctionCode::WriteSingleRegister as u8,
                code,
            ));
            return;
        }

        if address as usize >= self.regs.len() {
            self.reply(&build_exception_response(
                self.slave,
                FunctionCode::WriteSingleRegister as u8,
                ExceptionCode::IllegalDataAddress as u8,
            ));
            return;
        }
        self.regs[address as usize] = value;

        if address != regs::MODBUS_ENABLE
            && address != regs::DRIVE_OUTPUT_ENABLE
            && self.regs[regs::DRIVE_OUTPUT_ENABLE as usize] != 0
        {
            self.writes_while_enabled += 1;
        }

        if let Some(remaining) = self.lost_replies.get_mut(&address) {
            if *remaining > 0 {
                *remaining -= 1;
                debug!("sim: dropping reply for 0x{:02x}", address);
                return;
            }
        }

        let echo = build_write_echo(self.slave, address, value);
        self.reply(&echo);
    }

    fn reply(&mut self, frame: &[u8]) {
        self.outbox.extend(frame.iter());
    }
}

#[async_trait]
impl ByteTransport for SimulatedDrive {
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.requests.push(bytes.to_vec());

        if bytes.len() != REQUEST_LEN || !crc_matches(bytes) || bytes[0] != self.slave {
            debug!("sim: ignoring frame {:02x?}", bytes);
            return Ok(());
        }

        let address = u16::from_be_bytes([bytes[2], bytes[3]]);
        let value = u16::from_be_bytes([bytes[4], bytes[5]]);

        match bytes[1] {
            f if f == FunctionCode::ReadHoldingRegisters as u8 => self.handle_read(address, value),
            f if f == FunctionCode::WriteSingleRegister as u8 => self.handle_write(address, value),
            f => {
                debug!("sim: function 0x{:02x} not supported", f);
                self.reply(&build_exception_response(
                    self.slave,
                    f,
                    ExceptionCode::IllegalFunction as u8,
                ));
            }
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Vec<u8>>> {
        if self.outbox.is_empty() {
            return Ok(None);
        }
        let n = self.chunk_size.min(self.outbox.len());
        Ok(Some(self.outbox.drain(..n).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modbus::codec::{build_read_command, build_write_command, parse_read_response};
    use crate::modbus::RegisterValues;

    async fn drain(drive: &mut SimulatedDrive) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = drive.recv().await.unwrap() {
            out.extend(chunk);
        }
        out
    }

    #[tokio::test]
    async fn answers_reads_for_every_mapped_register() {
        let mut drive = SimulatedDrive::new();
        for reg in REGS {
            drive.send(&build_read_command(reg.address)).await.unwrap();
            let response = drain(&mut drive).await;
            assert!(crc_matches(&response));
            assert_eq!(
                parse_read_response(&response).unwrap(),
                RegisterValues::Single(drive.register(reg.address).unwrap())
            );
        }
    }

    #[tokio::test]
    async fn ignores_frames_with_bad_crc_or_other_slave() {
        let mut drive = SimulatedDrive::new();
        let mut frame = build_write_command(0x09, 0);
        frame[7] ^= 0xff;
        drive.send(&frame).await.unwrap();
        assert!(drain(&mut drive).await.is_empty());

        let mut drive = SimulatedDrive::new().with_slave_address(2);
        drive.send(&build_write_command(0x09, 1)).await.unwrap();
        assert!(drain(&mut drive).await.is_empty());
        assert_eq!(drive.register(0x09), Some(0));
        assert_eq!(drive.requests().len(), 1);
    }

    #[tokio::test]
    async fn lost_reply_still_applies_write() {
        let mut drive = SimulatedDrive::new().with_lost_replies(0x05, 1);
        drive.send(&build_write_command(0x05, 1234)).await.unwrap();
        assert!(drain(&mut drive).await.is_empty());
        assert_eq!(drive.register(0x05), Some(1234));

        drive.send(&build_write_command(0x05, 1235)).await.unwrap();
        assert_eq!(drain(&mut drive).await.len(), 8);
    }

    #[tokio::test]
    async fn out_of_range_read_is_an_exception() {
        let mut drive = SimulatedDrive::new();
        drive.send(&build_read_command(0x1a)).await.unwrap();
        let response = drain(&mut drive).await;
        assert_eq!(&response[..3], &[0x01, 0x83, 0x02]);
    }
}
