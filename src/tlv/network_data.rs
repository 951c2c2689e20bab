// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Network Data TLV value: a sequence of `Prefix` sub-TLVs, each carrying
//! further nested sub-TLVs (`HasRoute`, `BorderRouter`, `6LoWPANContext`).

use crate::error::{CommissionerError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HasRouteEntry {
    pub border_router_16: u16,
    pub preference: i8,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BorderRouterEntry {
    pub border_router_16: u16,
    pub flags: u16,
    pub preference: i8,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SixLowPanContextEntry {
    pub context_id: u8,
    pub compress: bool,
    pub context_length: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PrefixSubTlvs {
    pub has_route: Vec<HasRouteEntry>,
    pub border_router: Vec<BorderRouterEntry>,
    pub six_lowpan_context: Vec<SixLowPanContextEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Prefix {
    pub domain_id: u8,
    pub prefix_length_bits: u8,
    pub prefix_bytes: Vec<u8>,
    pub sub_tlvs: PrefixSubTlvs,
}

const SUB_TYPE_HAS_ROUTE: u8 = 0;
const SUB_TYPE_BORDER_ROUTER: u8 = 2;
const SUB_TYPE_SIX_LOWPAN_CONTEXT: u8 = 4;

impl Prefix {
    pub fn encode(&self) -> Vec<u8> {
        let mut sub = Vec::new();
        if !self.sub_tlvs.has_route.is_empty() {
            let mut value = Vec::new();
            for e in &self.sub_tlvs.has_route {
                value.extend_from_slice(&e.border_router_16.to_be_bytes());
                value.push(e.preference as u8);
            }
            sub.push(SUB_TYPE_HAS_ROUTE);
            sub.push(value.len() as u8);
            sub.extend_from_slice(&value);
        }
        if !self.sub_tlvs.border_router.is_empty() {
            let mut value = Vec::new();
            for e in &self.sub_tlvs.border_router {
                value.extend_from_slice(&e.border_router_16.to_be_bytes());
                value.extend_from_slice(&e.flags.to_be_bytes());
                value.push(e.preference as u8);
            }
            sub.push(SUB_TYPE_BORDER_ROUTER);
            sub.push(value.len() as u8);
            sub.extend_from_slice(&value);
        }
        if !self.sub_tlvs.six_lowpan_context.is_empty() {
            let mut value = Vec::new();
            for e in &self.sub_tlvs.six_lowpan_context {
                value.push((e.context_id & 0x0F) | if e.compress { 0x10 } else { 0 });
                value.push(e.context_length);
            }
            sub.push(SUB_TYPE_SIX_LOWPAN_CONTEXT);
            sub.push(value.len() as u8);
            sub.extend_from_slice(&value);
        }

        let mut buf = Vec::with_capacity(2 + self.prefix_bytes.len() + sub.len());
        buf.push(self.domain_id);
        buf.push(self.prefix_length_bits);
        buf.extend_from_slice(&self.prefix_bytes);
        buf.extend_from_slice(&sub);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        Self::decode_prefixed(buf).map(|(prefix, _)| prefix)
    }

    /// Decodes one `Prefix` from the start of `buf`, returning it along with
    /// the number of bytes consumed so callers can decode a concatenated
    /// sequence of prefixes.
    fn decode_prefixed(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < 2 {
            return Err(CommissionerError::bad_format("prefix TLV too short"));
        }
        let domain_id = buf[0];
        let prefix_length_bits = buf[1];
        let prefix_len_bytes = prefix_length_bits.div_ceil(8) as usize;
        if buf.len() < 2 + prefix_len_bytes {
            return Err(CommissionerError::bad_format("prefix TLV truncated prefix bytes"));
        }
        let prefix_bytes = buf[2..2 + prefix_len_bytes].to_vec();

        let mut sub_tlvs = PrefixSubTlvs::default();
        let mut offset = 2 + prefix_len_bytes;
        while offset < buf.len() {
            if buf.len() < offset + 2 {
                return Err(CommissionerError::bad_format("truncated prefix sub-TLV header"));
            }
            let sub_type = buf[offset];
            let len = buf[offset + 1] as usize;
            if buf.len() < offset + 2 + len {
                return Err(CommissionerError::bad_format("truncated prefix sub-TLV value"));
            }
            let value = &buf[offset + 2..offset + 2 + len];
            match sub_type {
                SUB_TYPE_HAS_ROUTE => {
                    for chunk in value.chunks_exact(3) {
                        sub_tlvs.has_route.push(HasRouteEntry {
                            border_router_16: u16::from_be_bytes([chunk[0], chunk[1]]),
                            preference: chunk[2] as i8,
                        });
                    }
                },
                SUB_TYPE_BORDER_ROUTER => {
                    for chunk in value.chunks_exact(5) {
                        sub_tlvs.border_router.push(BorderRouterEntry {
                            border_router_16: u16::from_be_bytes([chunk[0], chunk[1]]),
                            flags: u16::from_be_bytes([chunk[2], chunk[3]]),
                            preference: chunk[4] as i8,
                        });
                    }
                },
                SUB_TYPE_SIX_LOWPAN_CONTEXT => {
                    for chunk in value.chunks_exact(2) {
                        sub_tlvs.six_lowpan_context.push(SixLowPanContextEntry {
                            context_id: chunk[0] & 0x0F,
                            compress: chunk[0] & 0x10 != 0,
                            context_length: chunk[1],
                        });
                    }
                },
                _ => {}, // unknown sub-TLV, non-critical, dropped
            }
            offset += 2 + len;
        }

        Ok((Self { domain_id, prefix_length_bits, prefix_bytes, sub_tlvs }, offset))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NetworkData {
    pub prefixes: Vec<Prefix>,
}

impl NetworkData {
    /// A Network Data TLV value is a concatenation of self-delimiting
    /// `Prefix` blobs (each one's sub-TLVs make its total length
    /// recoverable without an outer wrapper).
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut prefixes = Vec::new();
        let mut offset = 0;
        while offset < buf.len() {
            let (prefix, consumed) = Prefix::decode_prefixed(&buf[offset..])?;
            offset += consumed;
            prefixes.push(prefix);
        }
        Ok(Self { prefixes })
    }

    pub fn encode(&self) -> Vec<u8> {
        self.prefixes.iter().flat_map(Prefix::encode).collect()
    }
}
