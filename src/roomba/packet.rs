// Open Interface sensor packet groups
//
// A packet group bundles a contiguous run of sensor packet ids. The host sends
// [SENSORS, group] and the robot answers with a fixed number of bytes.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Identifier of a sensor packet group
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PacketGroupId(pub u8);

impl PacketGroupId {
    pub const P0: Self = Self(0);
    pub const P1: Self = Self(1);
    pub const P2: Self = Self(2);
    pub const P3: Self = Self(3);
    pub const P4: Self = Self(4);
    pub const P5: Self = Self(5);
    pub const P6: Self = Self(6);
    pub const P100: Self = Self(100);
    pub const P101: Self = Self(101);
    pub const P106: Self = Self(106);
    pub const P107: Self = Self(107);

    /// Packet ids carried by this group, in wire order
    pub fn packet_ids(self) -> Option<RangeInclusive<u8>> {
        let range = match self.0 {
            0 => 7..=26,
            1 => 7..=16,
            2 => 17..=20,
            3 => 21..=26,
            4 => 27..=34,
            5 => 35..=42,
            6 => 7..=42,
            100 => 7..=58,
            101 => 43..=58,
            106 => 46..=51,
            107 => 54..=58,
            _ => return None,
        };
        Some(range)
    }

    /// Number of bytes the documented layout of this group occupies
    pub fn layout_len(self) -> Option<usize> {
        self.packet_ids().map(|ids| ids.map(packet_width).sum())
    }

    /// Byte offset of a packet inside this group's response
    pub fn packet_offset(self, id: u8) -> Option<usize> {
        let ids = self.packet_ids()?;
        if !ids.contains(&id) {
            return None;
        }
        Some((*ids.start()..id).map(packet_width).sum())
    }
}

impl fmt::Display for PacketGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Wire width in bytes of a single sensor packet (ids 7-58)
pub fn packet_width(id: u8) -> usize {
    match id {
        19 | 20 | 22 | 23 | 25..=31 | 33 | 39..=44 | 46..=51 | 54..=57 => 2,
        _ => 1,
    }
}

/// Expected response length for each packet group
///
/// Built once at startup and shared read-only with the decoder and the
/// acquisition loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketSizeTable {
    sizes: BTreeMap<PacketGroupId, usize>,
}

impl Default for PacketSizeTable {
    fn default() -> Self {
        let sizes = BTreeMap::from([
            (PacketGroupId::P0, 26),
            (PacketGroupId::P1, 10),
            (PacketGroupId::P2, 6),
            (PacketGroupId::P3, 10),
            (PacketGroupId::P4, 14),
            (PacketGroupId::P5, 12),
            (PacketGroupId::P6, 52),
            // Documented as 80 bytes, the robot sends 93
            (PacketGroupId::P100, 93),
            (PacketGroupId::P101, 28),
            (PacketGroupId::P106, 12),
            (PacketGroupId::P107, 9),
        ]);
        Self { sizes }
    }
}

impl PacketSizeTable {
    /// Table with custom lengths (e.g. a firmware that pads differently)
    pub fn from_sizes(sizes: impl IntoIterator<Item = (PacketGroupId, usize)>) -> Self {
        Self {
            sizes: sizes.into_iter().collect(),
        }
    }

    /// Expected response length for a group
    pub fn size(&self, group: PacketGroupId) -> Option<usize> {
        self.sizes.get(&group).copied()
    }

    pub fn groups(&self) -> impl Iterator<Item = PacketGroupId> + '_ {
        self.sizes.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sizes() {
        let table = PacketSizeTable::default();
        assert_eq!(table.size(PacketGroupId::P100), Some(93));
        assert_eq!(table.size(PacketGroupId::P6), Some(52));
        assert_eq!(table.size(PacketGroupId(42)), None);
    }

    #[test]
    fn test_layouts_match_documented_sizes() {
        // Every group except 100 answers with exactly its documented layout
        let table = PacketSizeTable::default();
        for group in table.groups() {
            let layout = group.layout_len().unwrap();
            if group == PacketGroupId::P100 {
                assert_eq!(layout, 80);
            } else {
                assert_eq!(Some(layout), table.size(group), "group {}", group);
            }
        }
    }

    #[test]
    fn test_packet_offsets() {
        // Encoder counts sit right after the 52 bytes of group 6
        assert_eq!(PacketGroupId::P100.packet_offset(43), Some(52));
        assert_eq!(PacketGroupId::P100.packet_offset(44), Some(54));
        assert_eq!(PacketGroupId::P101.packet_offset(43), Some(0));
        assert_eq!(PacketGroupId::P100.packet_offset(14), Some(7));
        assert_eq!(PacketGroupId::P2.packet_offset(43), None);
    }

    #[test]
    fn test_unknown_group_has_no_layout() {
        assert!(PacketGroupId(99).packet_ids().is_none());
        assert!(PacketGroupId(99).layout_len().is_none());
    }
}
