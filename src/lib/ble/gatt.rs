use core::fmt::{self, Display};
use std::io;

use async_trait::async_trait;
use uuid::Uuid;

pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x522b443a_4f53_534d_0001_420badbabe69);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Characteristic {
    Command,
    SpeedKnobLimit,
    WifiConfig,
    State,
    Patterns,
    PatternDescription,
}

impl Characteristic {
    pub const ALL: [Characteristic; 6] = [
        Characteristic::Command,
        Characteristic::SpeedKnobLimit,
        Characteristic::WifiConfig,
        Characteristic::State,
        Characteristic::Patterns,
        Characteristic::PatternDescription,
    ];

    pub const fn uuid(self) -> Uuid {
        let id: u128 = match self {
            Characteristic::Command => 0x522b443a_4f53_534d_1000_420badbabe69,
            Characteristic::SpeedKnobLimit => 0x522b443a_4f53_534d_1010_420badbabe69,
            Characteristic::WifiConfig => 0x522b443a_4f53_534d_1020_420badbabe69,
            Characteristic::State => 0x522b443a_4f53_534d_2000_420badbabe69,
            Characteristic::Patterns => 0x522b443a_4f53_534d_3000_420badbabe69,
            Characteristic::PatternDescription => 0x522b443a_4f53_534d_3010_420badbabe69,
        };
        Uuid::from_u128(id)
    }

    pub fn from_uuid(uuid: &Uuid) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.uuid() == *uuid)
    }
}

impl Display for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Characteristic::Command => "command",
            Characteristic::SpeedKnobLimit => "speed-knob-limit",
            Characteristic::WifiConfig => "wifi-config",
            Characteristic::State => "state",
            Characteristic::Patterns => "patterns",
            Characteristic::PatternDescription => "pattern-description",
        };
        write!(f, "{} ({})", name, self.uuid())
    }
}

/// Access to the characteristics of a connected OSSM service.
///
/// Implementations wrap whatever BLE stack discovered the service; each call
/// is one discrete GATT write or read.
#[async_trait]
pub trait CharacteristicTransport: Send {
    async fn write(&mut self, characteristic: Characteristic, value: &[u8]) -> io::Result<()>;
    async fn read(&mut self, characteristic: Characteristic) -> io::Result<Vec<u8>>;

    /// Whether the service exposes `characteristic`. Older firmware lacks
    /// some of the optional ones.
    fn has(&self, _characteristic: Characteristic) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuids_match_firmware() {
        assert_eq!(
            SERVICE_UUID.to_string(),
            "522b443a-4f53-534d-0001-420badbabe69"
        );
        assert_eq!(
            Characteristic::Command.uuid().to_string(),
            "522b443a-4f53-534d-1000-420badbabe69"
        );
        assert_eq!(
            Characteristic::PatternDescription.uuid().to_string(),
            "522b443a-4f53-534d-3010-420badbabe69"
        );
    }

    #[test]
    fn uuid_lookup() {
        for c in Characteristic::ALL {
            assert_eq!(Characteristic::from_uuid(&c.uuid()), Some(c));
        }
        assert_eq!(Characteristic::from_uuid(&SERVICE_UUID), None);
    }
}
