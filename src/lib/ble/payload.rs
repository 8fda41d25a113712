use core::fmt::{self, Display};

use json::JsonValue;
use log::{debug, warn};

use super::{BleError, Result};

/// Fields the device reported in a state read. A field the device left out
/// stays `None` and must not overwrite local state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceState {
    pub speed: Option<u8>,
    pub depth: Option<u8>,
    pub stroke: Option<u8>,
    pub sensation: Option<u8>,
    pub pattern: Option<u32>,
}

/// Local view of the controls, as a remote control keeps it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlState {
    pub speed: u8,
    pub depth: u8,
    pub stroke: u8,
    pub sensation: u8,
    pub pattern: u32,
    pub paused: bool,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            speed: 0,
            depth: 50,
            stroke: 50,
            sensation: 50,
            pattern: 0,
            paused: true,
        }
    }
}

impl DeviceState {
    pub fn is_empty(&self) -> bool {
        *self == DeviceState::default()
    }

    pub fn apply_to(&self, control: &mut ControlState) {
        if let Some(speed) = self.speed {
            control.speed = speed;
            control.paused = speed == 0;
        }
        if let Some(depth) = self.depth {
            control.depth = depth;
        }
        if let Some(stroke) = self.stroke {
            control.stroke = stroke;
        }
        if let Some(sensation) = self.sensation {
            control.sensation = sensation;
        }
        if let Some(pattern) = self.pattern {
            control.pattern = pattern;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternEntry {
    pub idx: u32,
    pub name: String,
    pub description: Option<String>,
}

impl PatternEntry {
    pub fn new(idx: u32, name: &str) -> Self {
        Self {
            idx,
            name: name.to_string(),
            description: None,
        }
    }
}

impl Display for PatternEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.idx, self.name)?;
        if let Some(description) = &self.description {
            write!(f, ": {}", description)?;
        }
        Ok(())
    }
}

/// Stroke engine patterns of the stock firmware, used until the device
/// reports its own list.
pub static DEFAULT_PATTERNS: &[(u32, &str)] = &[
    (0, "Simple Stroke"),
    (1, "Teasing Pounding"),
    (2, "Robo Stroke"),
    (3, "Half'n'Half"),
    (4, "Deeper"),
    (5, "Stop'n'Go"),
    (6, "Insist"),
];

pub fn default_patterns() -> Vec<PatternEntry> {
    DEFAULT_PATTERNS
        .iter()
        .map(|&(idx, name)| PatternEntry::new(idx, name))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WifiStatus {
    pub connected: Option<bool>,
    pub ssid: Option<String>,
    pub ip: Option<String>,
    pub rssi: Option<i32>,
}

impl WifiStatus {
    pub fn is_connected(&self) -> bool {
        self.connected.unwrap_or(false)
    }
}

impl Display for WifiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_connected() {
            "connected".fmt(f)?;
        } else {
            "not connected".fmt(f)?;
        }
        if let Some(ssid) = &self.ssid {
            write!(f, ", ssid {}", ssid)?;
        }
        if let Some(ip) = &self.ip {
            write!(f, ", ip {}", ip)?;
        }
        if let (true, Some(rssi)) = (self.is_connected(), self.rssi) {
            write!(f, ", signal {} dBm", rssi)?;
        }
        Ok(())
    }
}

/// Plain-text acknowledgement left in a characteristic by the firmware,
/// e.g. `ok:wifi:saved` or `fail:wifi:invalid_ssid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandReply {
    Ok(String),
    Fail(String),
    Other(String),
}

impl CommandReply {
    pub fn parse(bytes: &[u8]) -> Self {
        let text = String::from_utf8_lossy(bytes).trim().to_string();
        if let Some(rest) = text.strip_prefix("ok:") {
            CommandReply::Ok(rest.to_string())
        } else if let Some(rest) = text.strip_prefix("fail:") {
            CommandReply::Fail(rest.to_string())
        } else {
            CommandReply::Other(text)
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, CommandReply::Ok(_))
    }
}

impl Display for CommandReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandReply::Ok(s) => write!(f, "ok:{}", s),
            CommandReply::Fail(s) => write!(f, "fail:{}", s),
            CommandReply::Other(s) => s.fmt(f),
        }
    }
}

fn parse_json(bytes: &[u8]) -> Result<JsonValue> {
    let text = std::str::from_utf8(bytes).map_err(|e| BleError::Decode(e.to_string()))?;
    json::parse(text).map_err(|e| BleError::Decode(format!("{}: {:?}", e, text)))
}

fn expect_object(value: &JsonValue) -> Result<()> {
    if value.is_object() {
        Ok(())
    } else {
        Err(BleError::Decode(format!("expected an object, got {}", value.dump())))
    }
}

fn percent(value: &JsonValue, field: &str) -> Option<u8> {
    let v = &value[field];
    if v.is_null() {
        return None;
    }
    let n = v.as_u8();
    if n.is_none() {
        debug!("ignoring {} = {}", field, v.dump());
    }
    n
}

/// Decodes the JSON state report. The state characteristic holds `ok:boot`
/// until the firmware publishes its first state, which is a decode error.
pub fn decode_state_report(bytes: &[u8]) -> Result<DeviceState> {
    let value = parse_json(bytes)?;
    expect_object(&value)?;

    Ok(DeviceState {
        speed: percent(&value, "speed"),
        depth: percent(&value, "depth"),
        stroke: percent(&value, "stroke"),
        sensation: percent(&value, "sensation"),
        pattern: value["pattern"].as_u32(),
    })
}

/// Decodes the pattern list as sent. Entries without a numeric `idx` or a
/// string `name` are dropped.
pub fn try_decode_pattern_list(bytes: &[u8]) -> Result<Vec<PatternEntry>> {
    let value = parse_json(bytes)?;
    if !value.is_array() {
        return Err(BleError::Decode(format!(
            "expected an array, got {}",
            value.dump()
        )));
    }

    let mut patterns = Vec::new();
    for member in value.members() {
        match (member["idx"].as_u32(), member["name"].as_str()) {
            (Some(idx), Some(name)) => patterns.push(PatternEntry::new(idx, name)),
            _ => debug!("skipping pattern entry {}", member.dump()),
        }
    }
    Ok(patterns)
}

/// Like [`try_decode_pattern_list`], but falls back to [`default_patterns`]
/// when the payload is malformed or empty.
pub fn decode_pattern_list(bytes: &[u8]) -> Vec<PatternEntry> {
    match try_decode_pattern_list(bytes) {
        Ok(patterns) if !patterns.is_empty() => patterns,
        Ok(_) => {
            warn!("device reported no patterns, using defaults");
            default_patterns()
        }
        Err(e) => {
            warn!("cannot read pattern list ({}), using defaults", e);
            default_patterns()
        }
    }
}

pub fn decode_wifi_status(bytes: &[u8]) -> Result<WifiStatus> {
    let value = parse_json(bytes)?;
    expect_object(&value)?;

    Ok(WifiStatus {
        connected: value["connected"].as_bool(),
        ssid: value["ssid"].as_str().map(str::to_string),
        ip: value["ip"].as_str().map(str::to_string),
        rssi: value["rssi"].as_i32(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_state_only_touches_reported_fields() {
        let state = decode_state_report(br#"{"speed": 0, "depth": 80}"#).unwrap();
        assert_eq!(
            state,
            DeviceState {
                speed: Some(0),
                depth: Some(80),
                ..DeviceState::default()
            }
        );

        let mut control = ControlState {
            speed: 40,
            stroke: 10,
            paused: false,
            ..ControlState::default()
        };
        state.apply_to(&mut control);
        assert_eq!(control.speed, 0);
        assert!(control.paused);
        assert_eq!(control.depth, 80);
        assert_eq!(control.stroke, 10);
        assert_eq!(control.sensation, 50);
    }

    #[test]
    fn running_speed_unpauses() {
        let mut control = ControlState::default();
        decode_state_report(br#"{"speed":35,"pattern":4,"sensation":"x"}"#)
            .unwrap()
            .apply_to(&mut control);
        assert_eq!(control.speed, 35);
        assert!(!control.paused);
        assert_eq!(control.pattern, 4);
        assert_eq!(control.sensation, 50);
    }

    #[test]
    fn boot_marker_is_not_a_state() {
        assert!(matches!(
            decode_state_report(b"ok:boot"),
            Err(BleError::Decode(_))
        ));
        assert!(decode_state_report(b"[1,2]").is_err());
        assert!(decode_state_report(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn pattern_list_from_device() {
        let patterns =
            decode_pattern_list(br#"[{"name":"Simple Stroke","idx":0},{"name":"Custom","idx":9}]"#);
        assert_eq!(patterns.len(), 2);
        assert_eq!(patterns[1], PatternEntry::new(9, "Custom"));
    }

    #[test]
    fn pattern_list_falls_back_to_defaults() {
        let payloads: [&[u8]; 4] = [b"[]", b"not json", b"{}", br#"[{"idx":"a"}]"#];
        for payload in payloads {
            let patterns = decode_pattern_list(payload);
            assert_eq!(patterns, default_patterns());
        }
        let defaults = default_patterns();
        assert_eq!(defaults.len(), 7);
        assert_eq!(defaults[3].name, "Half'n'Half");
        assert!(defaults.iter().enumerate().all(|(i, p)| p.idx as usize == i));
    }

    #[test]
    fn wifi_status_fields_are_optional() {
        let status = decode_wifi_status(
            br#"{"connected":true,"ssid":"home","ip":"192.168.1.20","rssi":-61}"#,
        )
        .unwrap();
        assert!(status.is_connected());
        assert_eq!(status.rssi, Some(-61));
        assert_eq!(
            status.to_string(),
            "connected, ssid home, ip 192.168.1.20, signal -61 dBm"
        );

        let status = decode_wifi_status(br#"{"connected":false}"#).unwrap();
        assert_eq!(status.ssid, None);
        assert_eq!(status.to_string(), "not connected");

        assert!(decode_wifi_status(b"ok:wifi:saved").is_err());
    }

    #[test]
    fn command_replies() {
        assert_eq!(
            CommandReply::parse(b"ok:wifi:connected"),
            CommandReply::Ok("wifi:connected".into())
        );
        let fail = CommandReply::parse(b"fail:wifi:invalid_password");
        assert!(!fail.is_ok());
        assert_eq!(fail.to_string(), "fail:wifi:invalid_password");
        assert_eq!(
            CommandReply::parse(b"{\"connected\":true}"),
            CommandReply::Other("{\"connected\":true}".into())
        );
    }
}
