// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! `Connectivity` network-diagnostic TLV value.

use crate::error::{CommissionerError, Result};

/// Parent-priority field, packed in the top 2 bits of the first byte.
/// `0b10` is reserved by the wire format but still round-trips as `-2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentPriority {
    Zero,
    Plus1,
    Minus1,
    Minus2Reserved,
}

impl ParentPriority {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x3 {
            0b00 => ParentPriority::Zero,
            0b01 => ParentPriority::Plus1,
            0b11 => ParentPriority::Minus1,
            _ => ParentPriority::Minus2Reserved,
        }
    }

    fn to_bits(self) -> u8 {
        match self {
            ParentPriority::Zero => 0b00,
            ParentPriority::Plus1 => 0b01,
            ParentPriority::Minus1 => 0b11,
            ParentPriority::Minus2Reserved => 0b10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connectivity {
    pub parent_priority: ParentPriority,
    pub link_quality_3: u8,
    pub link_quality_2: u8,
    pub link_quality_1: u8,
    pub leader_cost: u8,
    pub id_sequence: u8,
    pub sed_buffer_size_and_datagram_count: Option<(u16, u8)>,
}

impl Connectivity {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![
            self.parent_priority.to_bits() << 6,
            self.link_quality_3,
            self.link_quality_2,
            self.link_quality_1,
            self.leader_cost,
            self.id_sequence,
        ];
        if let Some((buffer_size, datagram_count)) = self.sed_buffer_size_and_datagram_count {
            buf.extend_from_slice(&buffer_size.to_be_bytes());
            buf.push(datagram_count);
        }
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() != 6 && buf.len() != 9 {
            return Err(CommissionerError::bad_format("connectivity TLV must be 7 or 10 bytes"));
        }
        let sed_buffer_size_and_datagram_count = if buf.len() == 9 {
            Some((u16::from_be_bytes([buf[6], buf[7]]), buf[8]))
        } else {
            None
        };
        Ok(Self {
            parent_priority: ParentPriority::from_bits(buf[0] >> 6),
            link_quality_3: buf[1],
            link_quality_2: buf[2],
            link_quality_1: buf[3],
            leader_cost: buf[4],
            id_sequence: buf[5],
            sed_buffer_size_and_datagram_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_without_sed_fields() {
        let c = Connectivity {
            parent_priority: ParentPriority::Plus1,
            link_quality_3: 1,
            link_quality_2: 2,
            link_quality_1: 3,
            leader_cost: 4,
            id_sequence: 5,
            sed_buffer_size_and_datagram_count: None,
        };
        assert_eq!(Connectivity::decode(&c.encode()).expect("decodes"), c);
    }

    #[test]
    fn round_trip_with_sed_fields() {
        let c = Connectivity {
            parent_priority: ParentPriority::Minus1,
            link_quality_3: 1,
            link_quality_2: 2,
            link_quality_1: 3,
            leader_cost: 4,
            id_sequence: 5,
            sed_buffer_size_and_datagram_count: Some((1024, 6)),
        };
        assert_eq!(Connectivity::decode(&c.encode()).expect("decodes"), c);
    }
}
