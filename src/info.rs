//! Node identity: role, affinity and level.
//!
//! Each node persists a tiny [`DeviceInfo`] record describing what it currently is. The record
//! travels over the air twice: packed into the mesh frame every node broadcasts, and verbatim
//! inside master frames that reconfigure a specific node remotely.
//!
//! # Level encoding
//!
//! For the pure affinities a level is a plain rank, `0..=3`, with `4` reserved for the aura
//! "hostile environment" broadcast. Unity nodes straddle both sides, so a unity aura's level
//! byte holds two independent ranks: the magic rank in the upper nibble and the techno rank in
//! the lower one, each `0..=3`.
//!
//! [`DeviceInfo`]: struct.DeviceInfo.html

use crate::bytes::{ByteReader, ByteWriter, FromBytes, ToBytes};
use crate::config::{HOSTILE_ENVIRONMENT_LEVEL, MAX_AURA_LEVEL};
use crate::Error;

enum_with_unknown! {
    /// The role a node is currently operating in.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub enum Mode(u8) {
        /// Inert. Only reacts to master frames.
        None = 0,
        /// A pendant broadcasting an affinity and level.
        Aura = 1,
        /// Switches a physical output based on surrounding auras.
        Device = 2,
        /// Hands a one-shot level-up to a qualifying aura.
        LvlupToken = 3,
        /// Observes the field and broadcasts commanded states.
        Overseer = 4,
    }
}

enum_with_unknown! {
    /// A node's team.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub enum Affinity(u8) {
        /// Friendly to both sides.
        Unity = 0,
        Magic = 1,
        Techno = 2,
    }
}

/// Packs independent magic and techno ranks into a unity level byte.
pub const fn pack_unity_level(magic: u8, techno: u8) -> u8 {
    (magic << 4) | (techno & 0x0F)
}

/// Extracts the rank relevant to `target` from a unity level byte.
///
/// A unity observer has no preferred side, so it sees the larger of the two ranks.
pub fn split_unity_level(level: u8, target: Affinity) -> u8 {
    let magic = (level >> 4) & 0x0F;
    let techno = level & 0x0F;
    match target {
        Affinity::Magic => magic,
        Affinity::Techno => techno,
        _ => {
            if magic > techno {
                magic
            } else {
                techno
            }
        }
    }
}

/// The persisted identity and configuration of a node.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub mode: Mode,
    pub affinity: Affinity,
    /// Rank, or a packed rank pair for unity auras.
    pub level: u8,
    /// Per-node RSSI floor for device-mode peer admission. `0` disables the gate.
    pub dynamic_rssi_threshold: i8,
}

impl DeviceInfo {
    /// Length of the persisted record.
    pub const RECORD_LEN: usize = 4;

    /// Checks whether `rssi` passes the node's dynamic threshold.
    pub fn passes_rssi_gate(&self, rssi: i8) -> bool {
        self.dynamic_rssi_threshold == 0 || rssi >= self.dynamic_rssi_threshold
    }

    /// Validates a remotely commanded configuration.
    ///
    /// Unity devices only have a single rank, so their level must stay below the hostile
    /// broadcast level; unity auras carry a rank pair whose halves must both be regular ranks.
    pub fn validate(&self) -> Result<(), Error> {
        if self.affinity == Affinity::Unity {
            if self.mode == Mode::Device && self.level >= HOSTILE_ENVIRONMENT_LEVEL {
                return Err(Error::InvalidValue);
            }
            if self.mode == Mode::Aura {
                let magic = split_unity_level(self.level, Affinity::Magic);
                let techno = split_unity_level(self.level, Affinity::Techno);
                if magic > MAX_AURA_LEVEL || techno > MAX_AURA_LEVEL {
                    return Err(Error::InvalidValue);
                }
            }
        }
        Ok(())
    }

    /// Returns the persisted form of the record.
    pub fn to_record(&self) -> [u8; Self::RECORD_LEN] {
        [
            self.mode.into(),
            self.affinity.into(),
            self.level,
            self.dynamic_rssi_threshold as u8,
        ]
    }

    /// Decodes a persisted record.
    pub fn from_record(record: &[u8]) -> Result<Self, Error> {
        Self::from_bytes(&mut ByteReader::new(record))
    }
}

impl Default for DeviceInfo {
    fn default() -> Self {
        DeviceInfo {
            mode: Mode::None,
            affinity: Affinity::Unity,
            level: 0,
            dynamic_rssi_threshold: 0,
        }
    }
}

impl ToBytes for DeviceInfo {
    fn to_bytes(&self, writer: &mut ByteWriter<'_>) -> Result<(), Error> {
        writer.write_slice(&self.to_record())
    }
}

impl<'a> FromBytes<'a> for DeviceInfo {
    fn from_bytes(bytes: &mut ByteReader<'a>) -> Result<Self, Error> {
        Ok(DeviceInfo {
            mode: bytes.read_u8()?.into(),
            affinity: bytes.read_u8()?.into(),
            level: bytes.read_u8()?,
            dynamic_rssi_threshold: bytes.read_u8()? as i8,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unity_level_roundtrip() {
        for magic in 0..=3 {
            for techno in 0..=3 {
                let packed = pack_unity_level(magic, techno);
                assert_eq!(split_unity_level(packed, Affinity::Magic), magic);
                assert_eq!(split_unity_level(packed, Affinity::Techno), techno);
                assert_eq!(
                    split_unity_level(packed, Affinity::Unity),
                    magic.max(techno)
                );
            }
        }
    }

    #[test]
    fn record_roundtrip() {
        let info = DeviceInfo {
            mode: Mode::Device,
            affinity: Affinity::Techno,
            level: 2,
            dynamic_rssi_threshold: -55,
        };
        assert_eq!(DeviceInfo::from_record(&info.to_record()), Ok(info));
    }

    #[test]
    fn unknown_raw_values_survive_decoding() {
        let info = DeviceInfo::from_record(&[9, 7, 1, 0]).unwrap();
        assert_eq!(info.mode, Mode::Unknown(9));
        assert_eq!(info.affinity, Affinity::Unknown(7));
    }

    #[test]
    fn unity_device_rank_is_bounded() {
        let mut info = DeviceInfo {
            mode: Mode::Device,
            affinity: Affinity::Unity,
            level: 3,
            dynamic_rssi_threshold: 0,
        };
        assert!(info.validate().is_ok());
        info.level = HOSTILE_ENVIRONMENT_LEVEL;
        assert_eq!(info.validate(), Err(Error::InvalidValue));
    }

    #[test]
    fn unity_aura_rank_pair_is_bounded() {
        let mut info = DeviceInfo {
            mode: Mode::Aura,
            affinity: Affinity::Unity,
            level: pack_unity_level(3, 3),
            dynamic_rssi_threshold: 0,
        };
        assert!(info.validate().is_ok());
        info.level = pack_unity_level(4, 0);
        assert_eq!(info.validate(), Err(Error::InvalidValue));
        info.level = pack_unity_level(1, 5);
        assert_eq!(info.validate(), Err(Error::InvalidValue));
    }

    #[test]
    fn hostile_level_is_fine_outside_unity() {
        let info = DeviceInfo {
            mode: Mode::Aura,
            affinity: Affinity::Magic,
            level: HOSTILE_ENVIRONMENT_LEVEL,
            dynamic_rssi_threshold: 0,
        };
        assert!(info.validate().is_ok());
    }

    #[test]
    fn rssi_gate() {
        let mut info = DeviceInfo::default();
        assert!(info.passes_rssi_gate(-90));
        info.dynamic_rssi_threshold = -60;
        assert!(info.passes_rssi_gate(-60));
        assert!(info.passes_rssi_gate(-40));
        assert!(!info.passes_rssi_gate(-61));
    }
}
