use core::fmt::{self, Display};
use std::collections::VecDeque;

use log::{debug, info, warn};
use tokio::time::{sleep, timeout};

use super::command::{Command, Mode, Parameter, MAX_PERCENT};
use super::gatt::{Characteristic, CharacteristicTransport};
use super::payload::{
    decode_state_report, decode_wifi_status, default_patterns, try_decode_pattern_list,
    CommandReply, ControlState, DeviceState, PatternEntry, WifiStatus,
};
use super::{BleError, Result};
use crate::config::BleConfig;

const RESUME_SPEED: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Tx,
    Rx,
    Err,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub direction: Direction,
    pub text: String,
}

impl Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.direction {
            Direction::Tx => "TX",
            Direction::Rx => "RX",
            Direction::Err => "ERR",
        };
        write!(f, "{} {}", tag, self.text)
    }
}

/// Connected OSSM remote-control session.
///
/// Owns the characteristic transport. Every operation borrows the session
/// mutably, so GATT operations (and in particular the write-then-read
/// pattern description exchange) never overlap.
pub struct BleSession<T> {
    transport: Option<T>,
    config: BleConfig,
    control: ControlState,
    patterns: Vec<PatternEntry>,
    wifi: Option<WifiStatus>,
    log: VecDeque<LogEntry>,
}

impl<T: CharacteristicTransport> BleSession<T> {
    fn new(transport: T, config: BleConfig) -> Self {
        Self {
            transport: Some(transport),
            log: VecDeque::with_capacity(config.log_capacity),
            config,
            control: ControlState::default(),
            patterns: default_patterns(),
            wifi: None,
        }
    }

    /// Connect handshake of the remote control.
    ///
    /// Picks up wifi status, device state and the pattern list (with
    /// descriptions), hands speed control over to BLE and switches the
    /// device into stroke engine mode. Only the mode switch is mandatory.
    pub async fn open(transport: T, config: BleConfig) -> Result<Self> {
        let mut session = Self::new(transport, config);

        if session.has(Characteristic::WifiConfig) {
            if let Err(e) = session.refresh_wifi_status().await {
                warn!("could not read wifi status: {}", e);
            }
        }
        if let Err(e) = session.read_state().await {
            warn!("could not read state: {}", e);
        }
        if let Err(e) = session.refresh_patterns().await {
            warn!("could not read patterns, using defaults: {}", e);
        }
        if let Err(e) = session.release_speed_knob().await {
            warn!("could not set speed knob limit: {}", e);
        }

        session.send_command(&Command::Go(Mode::StrokeEngine)).await?;
        info!("connected, stroke engine mode");
        Ok(session)
    }

    /// Connect handshake of the funscript player: speed knob released, then
    /// streaming mode.
    pub async fn open_streaming(transport: T, config: BleConfig) -> Result<Self> {
        let mut session = Self::new(transport, config);

        if let Err(e) = session.release_speed_knob().await {
            warn!("could not set speed knob limit: {}", e);
        }
        session.send_command(&Command::Go(Mode::Streaming)).await?;
        info!("connected, streaming mode");
        Ok(session)
    }

    pub fn config(&self) -> &BleConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    pub fn transport(&self) -> Option<&T> {
        self.transport.as_ref()
    }

    pub fn control(&self) -> &ControlState {
        &self.control
    }

    pub fn patterns(&self) -> &[PatternEntry] {
        &self.patterns
    }

    pub fn wifi_status(&self) -> Option<&WifiStatus> {
        self.wifi.as_ref()
    }

    /// Most recent traffic, oldest first.
    pub fn log(&self) -> impl Iterator<Item = &LogEntry> {
        self.log.iter()
    }

    fn has(&self, characteristic: Characteristic) -> bool {
        self.transport
            .as_ref()
            .map_or(false, |t| t.has(characteristic))
    }

    fn push_log(&mut self, direction: Direction, text: String) {
        if self.config.log_capacity == 0 {
            return;
        }
        while self.log.len() >= self.config.log_capacity {
            self.log.pop_front();
        }
        self.log.push_back(LogEntry { direction, text });
    }

    fn checked_transport(&mut self, characteristic: Characteristic) -> Result<&mut T> {
        let transport = self.transport.as_mut().ok_or(BleError::Unavailable)?;
        if !transport.has(characteristic) {
            return Err(BleError::MissingCharacteristic(characteristic));
        }
        Ok(transport)
    }

    async fn write(&mut self, characteristic: Characteristic, value: &[u8]) -> Result<()> {
        let limit = self.config.read_timeout;
        let transport = self.checked_transport(characteristic)?;
        debug!("write {} ({} bytes)", characteristic, value.len());

        match timeout(limit, transport.write(characteristic, value)).await {
            Ok(res) => Ok(res?),
            Err(_) => Err(BleError::TimedOut),
        }
    }

    async fn read(&mut self, characteristic: Characteristic) -> Result<Vec<u8>> {
        let limit = self.config.read_timeout;
        let transport = self.checked_transport(characteristic)?;

        let value = match timeout(limit, transport.read(characteristic)).await {
            Ok(res) => res?,
            Err(_) => return Err(BleError::TimedOut),
        };
        debug!("read {} {:?}", characteristic, String::from_utf8_lossy(&value));
        Ok(value)
    }

    /// Writes one command to its characteristic, clamped to the firmware
    /// ranges. Wifi passwords never reach the traffic log.
    pub async fn send_command(&mut self, command: &Command) -> Result<()> {
        let command = command.normalized();
        let shown = command.redacted();
        debug!("send {}", shown);
        self.push_log(Direction::Tx, shown);

        let wire = command.to_string();
        let res = self.write(command.characteristic(), wire.as_bytes()).await;
        if let Err(e) = &res {
            self.push_log(Direction::Err, format!("send failed: {}", e));
        }
        res
    }

    /// Validates a raw command line against the firmware grammar and sends it.
    pub async fn send_raw(&mut self, line: &str) -> Result<Command> {
        let command: Command = line.trim().parse()?;
        self.send_command(&command).await?;
        Ok(command)
    }

    /// Sets the speed; any speed above zero also leaves pause. Local state
    /// only changes once the device took the command.
    pub async fn set_speed(&mut self, speed: u8) -> Result<()> {
        let speed = speed.min(MAX_PERCENT);
        self.send_command(&Command::Set(Parameter::Speed, speed.into()))
            .await?;
        self.control.speed = speed;
        if speed > 0 {
            self.control.paused = false;
        }
        Ok(())
    }

    pub async fn set_depth(&mut self, depth: u8) -> Result<()> {
        let depth = depth.min(MAX_PERCENT);
        self.send_command(&Command::Set(Parameter::Depth, depth.into()))
            .await?;
        self.control.depth = depth;
        Ok(())
    }

    pub async fn set_stroke(&mut self, stroke: u8) -> Result<()> {
        let stroke = stroke.min(MAX_PERCENT);
        self.send_command(&Command::Set(Parameter::Stroke, stroke.into()))
            .await?;
        self.control.stroke = stroke;
        Ok(())
    }

    pub async fn set_sensation(&mut self, sensation: u8) -> Result<()> {
        let sensation = sensation.min(MAX_PERCENT);
        self.send_command(&Command::Set(Parameter::Sensation, sensation.into()))
            .await?;
        self.control.sensation = sensation;
        Ok(())
    }

    pub async fn set_pattern(&mut self, idx: u32) -> Result<()> {
        self.send_command(&Command::Set(Parameter::Pattern, idx))
            .await?;
        self.control.pattern = idx;
        Ok(())
    }

    /// Streaming buffer size of the firmware.
    pub async fn set_buffer(&mut self, buffer: u32) -> Result<()> {
        self.send_command(&Command::Set(Parameter::Buffer, buffer))
            .await
    }

    /// Sends one streaming target; returns the command as sent, after
    /// rounding and clamping.
    pub async fn send_stream_position(&mut self, position: f64, duration_ms: f64) -> Result<Command> {
        let command = Command::stream_rounded(position, duration_ms);
        self.send_command(&command).await?;
        Ok(command)
    }

    /// Pauses at speed 0, or resumes at the last speed (50 if there is none).
    pub async fn toggle_pause(&mut self) -> Result<()> {
        let resume = self.control.paused;
        let speed = match (resume, self.control.speed) {
            (true, 0) => RESUME_SPEED,
            (true, previous) => previous,
            (false, _) => 0,
        };
        self.send_command(&Command::Set(Parameter::Speed, speed.into()))
            .await?;
        self.control.speed = speed;
        self.control.paused = !resume;
        Ok(())
    }

    /// Lets BLE commands control the speed instead of the physical knob.
    pub async fn release_speed_knob(&mut self) -> Result<()> {
        self.push_log(Direction::Tx, "speedKnobLimit: false".to_string());
        self.write(Characteristic::SpeedKnobLimit, b"false").await
    }

    pub async fn read_state(&mut self) -> Result<DeviceState> {
        let raw = self.read(Characteristic::State).await?;
        self.push_log(
            Direction::Rx,
            format!("state: {}", String::from_utf8_lossy(&raw)),
        );

        let state = decode_state_report(&raw)?;
        state.apply_to(&mut self.control);
        Ok(state)
    }

    pub async fn refresh_wifi_status(&mut self) -> Result<WifiStatus> {
        let raw = self.read(Characteristic::WifiConfig).await?;
        self.push_log(
            Direction::Rx,
            format!("wifi status: {}", String::from_utf8_lossy(&raw)),
        );

        let status = decode_wifi_status(&raw)?;
        self.wifi = Some(status.clone());
        Ok(status)
    }

    /// Requests the description of pattern `idx`.
    pub async fn pattern_description(&mut self, idx: u32) -> Result<String> {
        self.write(Characteristic::PatternDescription, idx.to_string().as_bytes())
            .await?;
        let raw = self.read(Characteristic::PatternDescription).await?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    /// Reads the device's pattern list and fetches every description, one
    /// exchange at a time. An empty list keeps the current patterns; a
    /// failed description leaves that entry without one.
    pub async fn refresh_patterns(&mut self) -> Result<&[PatternEntry]> {
        let raw = self.read(Characteristic::Patterns).await?;
        self.push_log(
            Direction::Rx,
            format!("patterns: {}", String::from_utf8_lossy(&raw)),
        );

        let mut patterns = try_decode_pattern_list(&raw)?;
        if patterns.is_empty() {
            warn!("device reported no patterns");
            return Ok(&self.patterns);
        }

        if self.has(Characteristic::PatternDescription) {
            for entry in patterns.iter_mut() {
                match self.pattern_description(entry.idx).await {
                    Ok(description) => {
                        debug!("pattern {}: {}", entry.idx, description);
                        entry.description = Some(description);
                    }
                    Err(e) => warn!("no description for pattern {}: {}", entry.idx, e),
                }
            }
        }

        self.patterns = patterns;
        Ok(&self.patterns)
    }

    /// Sends wifi credentials to the wifi characteristic and reports the
    /// resulting connection status.
    pub async fn configure_wifi(&mut self, ssid: &str, password: &str) -> Result<WifiStatus> {
        let command = Command::wifi(ssid, password)?;
        info!("configuring wifi for {}", ssid);
        self.send_command(&command).await?;

        let raw = self.read(Characteristic::WifiConfig).await?;
        let reply = CommandReply::parse(&raw);
        self.push_log(Direction::Rx, reply.to_string());

        if let CommandReply::Fail(reason) = reply {
            self.push_log(Direction::Err, format!("wifi config failed: {}", reason));
            return Err(BleError::Rejected(reason));
        }

        sleep(self.config.wifi_settle).await;
        self.refresh_wifi_status().await
    }

    /// The link went away underneath the session; later operations fail
    /// with [`BleError::Unavailable`].
    pub fn mark_disconnected(&mut self) -> Option<T> {
        self.control.speed = 0;
        self.control.paused = true;
        self.wifi = None;
        self.transport.take()
    }

    /// Stops the motor, returns the device to its menu and hands back the
    /// transport. Both commands are best effort.
    pub async fn close(mut self) -> Option<T> {
        if self.is_connected() {
            for command in [
                Command::Set(Parameter::Speed, 0),
                Command::Go(Mode::Menu),
            ] {
                if let Err(e) = self.send_command(&command).await {
                    warn!("could not send {}: {}", command, e);
                }
            }
        }
        self.mark_disconnected()
    }
}

#[cfg(test)]
mod tests {
    use core::time::Duration;
    use std::collections::HashMap;
    use std::io;

    use async_trait::async_trait;

    use super::*;

    const DESCRIPTIONS: [&str; 3] = ["in and out", "slow then fast", "robotic"];

    #[derive(Default)]
    struct MockGatt {
        values: HashMap<Characteristic, Vec<u8>>,
        queued: HashMap<Characteristic, VecDeque<Vec<u8>>>,
        writes: Vec<(Characteristic, String)>,
        missing: Vec<Characteristic>,
        failing_writes: Vec<String>,
        wifi_reply: Option<Vec<u8>>,
        hang: bool,
    }

    impl MockGatt {
        fn ossm() -> Self {
            let mut gatt = MockGatt::default();
            gatt.values.insert(
                Characteristic::State,
                br#"{"speed":0,"depth":70,"stroke":40,"sensation":60,"pattern":2}"#.to_vec(),
            );
            gatt.values.insert(
                Characteristic::Patterns,
                br#"[{"name":"Simple Stroke","idx":0},{"name":"Teasing Pounding","idx":1}]"#
                    .to_vec(),
            );
            gatt.values.insert(
                Characteristic::WifiConfig,
                br#"{"connected":false}"#.to_vec(),
            );
            gatt
        }

        fn written(&self, characteristic: Characteristic) -> Vec<&str> {
            self.writes
                .iter()
                .filter(|(c, _)| *c == characteristic)
                .map(|(_, v)| v.as_str())
                .collect()
        }
    }

    #[async_trait]
    impl CharacteristicTransport for MockGatt {
        async fn write(&mut self, characteristic: Characteristic, value: &[u8]) -> io::Result<()> {
            let text = String::from_utf8_lossy(value).into_owned();
            self.writes.push((characteristic, text.clone()));
            if self.hang {
                std::future::pending::<()>().await;
            }
            if self.failing_writes.contains(&text) {
                return Err(io::Error::new(io::ErrorKind::Other, "gatt error"));
            }

            match characteristic {
                Characteristic::PatternDescription => {
                    let idx: usize = text.parse().unwrap_or(0);
                    let description = DESCRIPTIONS[idx % DESCRIPTIONS.len()];
                    self.values
                        .insert(characteristic, description.as_bytes().to_vec());
                }
                Characteristic::WifiConfig => {
                    if let Some(reply) = &self.wifi_reply {
                        self.queued
                            .entry(characteristic)
                            .or_default()
                            .push_back(reply.clone());
                    }
                }
                _ => {}
            }
            Ok(())
        }

        async fn read(&mut self, characteristic: Characteristic) -> io::Result<Vec<u8>> {
            if self.hang {
                std::future::pending::<()>().await;
            }
            if let Some(value) = self
                .queued
                .get_mut(&characteristic)
                .and_then(|q| q.pop_front())
            {
                return Ok(value);
            }
            self.values
                .get(&characteristic)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no value"))
        }

        fn has(&self, characteristic: Characteristic) -> bool {
            !self.missing.contains(&characteristic)
        }
    }

    fn config() -> BleConfig {
        BleConfig {
            read_timeout: Duration::from_millis(50),
            wifi_settle: Duration::ZERO,
            ..BleConfig::default()
        }
    }

    #[tokio::test]
    async fn open_runs_the_connect_handshake() {
        let session = BleSession::open(MockGatt::ossm(), config()).await.unwrap();

        let control = session.control();
        assert_eq!(control.speed, 0);
        assert!(control.paused);
        assert_eq!(control.depth, 70);
        assert_eq!(control.pattern, 2);

        let patterns = session.patterns();
        assert_eq!(patterns.len(), 2);
        assert_eq!(patterns[1].description.as_deref(), Some("slow then fast"));
        assert_eq!(session.wifi_status().map(|w| w.is_connected()), Some(false));

        let gatt = session.transport().unwrap();
        let order: Vec<_> = gatt.writes.iter().map(|(c, v)| (*c, v.as_str())).collect();
        assert_eq!(
            order,
            vec![
                (Characteristic::PatternDescription, "0"),
                (Characteristic::PatternDescription, "1"),
                (Characteristic::SpeedKnobLimit, "false"),
                (Characteristic::Command, "go:strokeEngine"),
            ]
        );
    }

    #[tokio::test]
    async fn open_survives_missing_optional_data() {
        let mut gatt = MockGatt::ossm();
        gatt.values.insert(Characteristic::State, b"ok:boot".to_vec());
        gatt.values.insert(Characteristic::Patterns, b"[]".to_vec());
        gatt.missing = vec![Characteristic::WifiConfig, Characteristic::SpeedKnobLimit];

        let session = BleSession::open(gatt, config()).await.unwrap();
        assert_eq!(session.control(), &ControlState::default());
        assert_eq!(session.patterns(), default_patterns().as_slice());
        assert!(session.wifi_status().is_none());
        assert_eq!(
            session.transport().unwrap().written(Characteristic::Command),
            vec!["go:strokeEngine"]
        );
    }

    #[tokio::test]
    async fn open_fails_without_mode_switch() {
        let mut gatt = MockGatt::ossm();
        gatt.failing_writes = vec!["go:strokeEngine".to_string()];
        let err = BleSession::open(gatt, config()).await.err().unwrap();
        assert!(matches!(err, BleError::Io(_)));

        let mut gatt = MockGatt::ossm();
        gatt.missing = vec![Characteristic::Command];
        let err = BleSession::open(gatt, config()).await.err().unwrap();
        assert!(matches!(
            err,
            BleError::MissingCharacteristic(Characteristic::Command)
        ));
    }

    #[tokio::test]
    async fn failed_description_keeps_entry() {
        let mut gatt = MockGatt::ossm();
        gatt.failing_writes = vec!["1".to_string()];
        let session = BleSession::open(gatt, config()).await.unwrap();

        let patterns = session.patterns();
        assert_eq!(patterns[0].description.as_deref(), Some("in and out"));
        assert_eq!(patterns[1].name, "Teasing Pounding");
        assert_eq!(patterns[1].description, None);
    }

    #[tokio::test]
    async fn speed_and_pause() {
        let mut session = BleSession::open(MockGatt::ossm(), config()).await.unwrap();

        session.toggle_pause().await.unwrap();
        assert_eq!(session.control().speed, 50);
        assert!(!session.control().paused);

        session.toggle_pause().await.unwrap();
        assert!(session.control().paused);

        session.set_speed(120).await.unwrap();
        assert_eq!(session.control().speed, 100);
        assert!(!session.control().paused);

        session.set_depth(30).await.unwrap();
        session.set_pattern(4).await.unwrap();

        let gatt = session.transport().unwrap();
        assert_eq!(
            gatt.written(Characteristic::Command),
            vec![
                "go:strokeEngine",
                "set:speed:50",
                "set:speed:0",
                "set:speed:100",
                "set:depth:30",
                "set:pattern:4",
            ]
        );
    }

    #[tokio::test]
    async fn failed_writes_leave_controls_alone() {
        let mut gatt = MockGatt::ossm();
        gatt.failing_writes = vec!["set:speed:40".to_string(), "set:depth:10".to_string()];
        let mut session = BleSession::open(gatt, config()).await.unwrap();
        let before = session.control().clone();

        assert!(session.set_speed(40).await.is_err());
        assert!(session.set_depth(10).await.is_err());
        assert_eq!(session.control(), &before);

        session.set_speed(30).await.unwrap();
        if let Some(gatt) = session.transport.as_mut() {
            gatt.failing_writes = vec!["set:speed:0".to_string()];
        }
        assert!(session.toggle_pause().await.is_err());
        assert_eq!(session.control().speed, 30);
        assert!(!session.control().paused);
    }

    #[tokio::test]
    async fn hand_built_commands_are_clamped_on_the_wire() {
        let mut session = BleSession::open_streaming(MockGatt::ossm(), config())
            .await
            .unwrap();
        session
            .send_command(&Command::Stream {
                position: 200,
                duration_ms: 60000,
            })
            .await
            .unwrap();
        session
            .send_command(&Command::Set(Parameter::Speed, 500))
            .await
            .unwrap();

        assert_eq!(
            session.transport().unwrap().written(Characteristic::Command),
            vec!["go:streaming", "stream:100:10000", "set:speed:100"]
        );
    }

    #[tokio::test]
    async fn stream_positions_are_clamped() {
        let mut session = BleSession::open_streaming(MockGatt::ossm(), config())
            .await
            .unwrap();
        let sent = session.send_stream_position(120.6, 33.3).await.unwrap();
        assert_eq!(sent.to_string(), "stream:100:33");
        session.set_buffer(20).await.unwrap();

        assert_eq!(
            session.transport().unwrap().written(Characteristic::Command),
            vec!["go:streaming", "stream:100:33", "set:buffer:20"]
        );
    }

    #[tokio::test]
    async fn raw_commands_are_validated() {
        let mut session = BleSession::open(MockGatt::ossm(), config()).await.unwrap();
        assert!(matches!(
            session.send_raw("set:speed:abc").await,
            Err(BleError::InvalidArgument(_))
        ));
        assert_eq!(
            session.send_raw(" go:menu ").await.unwrap(),
            Command::Go(Mode::Menu)
        );
    }

    #[tokio::test]
    async fn wifi_configuration() {
        let mut gatt = MockGatt::ossm();
        gatt.wifi_reply = Some(b"ok:wifi:connected".to_vec());
        gatt.values.insert(
            Characteristic::WifiConfig,
            br#"{"connected":true,"ssid":"home","ip":"10.0.0.7","rssi":-50}"#.to_vec(),
        );
        let mut session = BleSession::open(gatt, config()).await.unwrap();

        let status = session.configure_wifi("home", "hunter22").await.unwrap();
        assert!(status.is_connected());
        assert_eq!(status.ip.as_deref(), Some("10.0.0.7"));

        assert_eq!(
            session.transport().unwrap().written(Characteristic::WifiConfig),
            vec!["set:wifi:home|hunter22"]
        );
        assert!(session.log().all(|entry| !entry.text.contains("hunter22")));
        assert!(session
            .log()
            .any(|entry| entry.to_string() == "TX set:wifi:home|***"));
    }

    #[tokio::test]
    async fn wifi_rejection_is_reported() {
        let mut gatt = MockGatt::ossm();
        gatt.wifi_reply = Some(b"fail:wifi:invalid_password".to_vec());
        let mut session = BleSession::open(gatt, config()).await.unwrap();

        let err = session.configure_wifi("home", "short").await.unwrap_err();
        assert!(matches!(err, BleError::Rejected(reason) if reason == "wifi:invalid_password"));

        assert!(matches!(
            session.configure_wifi("ho|me", "hunter22").await,
            Err(BleError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn close_is_best_effort() {
        let mut gatt = MockGatt::ossm();
        gatt.failing_writes = vec!["set:speed:0".to_string()];
        let session = BleSession::open(gatt, config()).await.unwrap();

        let gatt = session.close().await.unwrap();
        assert_eq!(
            gatt.written(Characteristic::Command),
            vec!["go:strokeEngine", "set:speed:0", "go:menu"]
        );
    }

    #[tokio::test]
    async fn disconnected_session_is_unavailable() {
        let mut session = BleSession::open(MockGatt::ossm(), config()).await.unwrap();
        session.set_speed(40).await.unwrap();

        assert!(session.mark_disconnected().is_some());
        assert_eq!(session.control().speed, 0);
        assert!(session.control().paused);
        assert!(matches!(
            session.set_speed(10).await,
            Err(BleError::Unavailable)
        ));
        assert!(session.close().await.is_none());
    }

    #[tokio::test]
    async fn silent_device_times_out() {
        let mut session = BleSession::open(MockGatt::ossm(), config()).await.unwrap();
        if let Some(gatt) = session.transport.as_mut() {
            gatt.hang = true;
        }
        assert!(matches!(session.read_state().await, Err(BleError::TimedOut)));
        assert!(matches!(
            session.set_speed(10).await,
            Err(BleError::TimedOut)
        ));
    }

    #[tokio::test]
    async fn traffic_log_is_bounded() {
        let config = BleConfig {
            log_capacity: 3,
            ..config()
        };
        let mut session = BleSession::open(MockGatt::ossm(), config).await.unwrap();
        for speed in 1..=5 {
            session.set_speed(speed).await.unwrap();
        }
        let entries: Vec<String> = session.log().map(|e| e.to_string()).collect();
        assert_eq!(
            entries,
            vec!["TX set:speed:3", "TX set:speed:4", "TX set:speed:5"]
        );
    }
}
