// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Wire TLV: `Type(1B) | Length(1B, 0xFF escapes to +2B) | Value`.

use std::collections::BTreeMap;

use crate::error::{CommissionerError, Result};

pub const ESCAPE_LENGTH: u8 = 0xFF;

/// Which TLV type-space a [`Tlv`] lives in. Type values are meaningful only
/// relative to their scope — the same byte means different things in
/// `MeshCop` and `NetworkDiag`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    MeshCop = 0,
    Thread = 1,
    MeshLink = 2,
    NetworkDiag = 3,
}

/// MeshCoP TLV type bytes (Thread management / provisioning / protocol
/// command TLVs).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshCopType {
    Channel = 0,
    PanId = 1,
    ExtendedPanId = 2,
    NetworkName = 3,
    PSKc = 4,
    NetworkMasterKey = 5,
    NetworkKeySequenceCounter = 6,
    NetworkMeshLocalPrefix = 7,
    SteeringData = 8,
    BorderAgentLocator = 9,
    CommissionerId = 10,
    CommissionerSessionId = 11,
    SecurityPolicy = 12,
    Get = 13,
    ActiveTimestamp = 14,
    CommissionerUdpPort = 15,
    State = 16,
    JoinerDtlsEncapsulation = 17,
    JoinerUdpPort = 18,
    JoinerIID = 19,
    JoinerRouterLocator = 20,
    JoinerRouterKek = 21,
    ProvisioningUrl = 32,
    VendorName = 33,
    VendorModel = 34,
    VendorSWVersion = 35,
    VendorData = 36,
    VendorStackVersion = 37,
    UdpEncapsulation = 48,
    Ipv6Address = 49,
    PendingTimestamp = 51,
    DelayTimer = 52,
    ChannelMask = 53,
    Count = 54,
    Period = 55,
    ScanDuration = 56,
    EnergyList = 57,
    SecureDissemination = 58,
    DomainName = 59,
    DomainPrefix = 60,
    AeSteeringData = 61,
    NmkpSteeringData = 62,
    CommissionerToken = 63,
    CommissionerSignature = 64,
    AeUdpPort = 65,
    NmkpUdpPort = 66,
    TriHostname = 67,
    RegistrarIpv6Address = 68,
    RegistrarHostname = 69,
    CommissionerPenSignature = 70,
    DiscoveryRequest = 128,
    DiscoveryResponse = 129,
}

/// Thread network-layer TLV type bytes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadType {
    Status = 4,
    Timeout = 11,
    Ipv6Addresses = 14,
    CommissionerSessionId = 15,
    CommissionerToken = 63,
    CommissionerSignature = 64,
}

/// TMF Network Diagnostic TLV type bytes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkDiagType {
    ExtMacAddress = 0,
    MacAddress = 1,
    Mode = 2,
    Timeout = 3,
    Connectivity = 4,
    Route64 = 5,
    LeaderData = 6,
    NetworkData = 7,
    Ipv6Address = 8,
    MacCounters = 9,
    BatteryLevel = 14,
    SupplyVoltage = 15,
    ChildTable = 16,
    ChannelPages = 17,
    TypeList = 18,
    MaxChildTimeout = 19,
    LDevIDSubjectPubKeyInfo = 20,
    IDevIDCert = 21,
    Eui64 = 23,
    Version = 24,
    VendorName = 25,
    VendorModel = 26,
    VendorSWVersion = 27,
    ThreadStackVersion = 28,
    Child = 29,
    ChildIpv6Address = 30,
    RouterNeighbor = 31,
    Answer = 32,
    QueryId = 33,
    MleCounters = 34,
}

/// MeshCoP TLV types whose corruption cannot be locally tolerated: a
/// failed validity check on one of these aborts decoding of the whole
/// message with `BadFormat` rather than dropping just that TLV. These are
/// the fields datasets and protocol commands treat as mandatory (see the
/// dataset mandatory/forbidden table).
pub const CRITICAL_MESH_COP_TYPES: &[u8] = &[
    MeshCopType::ActiveTimestamp as u8,
    MeshCopType::PendingTimestamp as u8,
    MeshCopType::DelayTimer as u8,
    MeshCopType::State as u8,
    MeshCopType::CommissionerSessionId as u8,
    MeshCopType::Get as u8,
];

/// Maximum TLV value length this codec accepts for "any length" TLVs.
pub const MAX_VALUE_LEN: usize = 1034;

/// A single decoded/to-be-encoded TLV. The raw `tlv_type` byte is kept
/// untyped so that scope-specific enums (`MeshCopType` &c.) remain simple
/// `u8` newtypes rather than forcing every caller through a fallible
/// conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tlv {
    scope: Scope,
    tlv_type: u8,
    value: Vec<u8>,
}

impl Tlv {
    pub fn new(scope: Scope, tlv_type: u8, value: Vec<u8>) -> Self {
        Self { scope, tlv_type, value }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn tlv_type(&self) -> u8 {
        self.tlv_type
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn into_value(self) -> Vec<u8> {
        self.value
    }

    pub fn value_as_u8(&self) -> Result<u8> {
        self.value
            .first()
            .copied()
            .ok_or_else(|| CommissionerError::bad_format("TLV value too short for u8"))
    }

    pub fn value_as_u16(&self) -> Result<u16> {
        if self.value.len() < 2 {
            return Err(CommissionerError::bad_format("TLV value too short for u16"));
        }
        Ok(u16::from_be_bytes([self.value[0], self.value[1]]))
    }

    pub fn value_as_string(&self) -> Result<String> {
        String::from_utf8(self.value.clone())
            .map_err(|e| CommissionerError::bad_format(format!("TLV value is not UTF-8: {e}")))
    }

    /// Whether this type, given extended-length TLV types, always uses the
    /// escape encoding regardless of actual length. Extended TLVs are
    /// switched on by type, never by "value length >= 255".
    fn always_escaped(scope: Scope, tlv_type: u8) -> bool {
        matches!(
            (scope, tlv_type),
            (Scope::MeshCop, t) if t == MeshCopType::NetworkData as u8
                || t == MeshCopType::SteeringData as u8
                || t == MeshCopType::EnergyList as u8
        )
    }

    pub fn total_length(&self) -> usize {
        let len = self.value.len();
        let len_field = if len >= ESCAPE_LENGTH as usize || Self::always_escaped(self.scope, self.tlv_type) {
            3
        } else {
            1
        };
        1 + len_field + len
    }

    pub fn serialize(&self, buf: &mut Vec<u8>) {
        buf.push(self.tlv_type);
        let len = self.value.len();
        if len >= ESCAPE_LENGTH as usize || Self::always_escaped(self.scope, self.tlv_type) {
            buf.push(ESCAPE_LENGTH);
            buf.extend_from_slice(&(len as u16).to_be_bytes());
        } else {
            buf.push(len as u8);
        }
        buf.extend_from_slice(&self.value);
    }

    /// Reads one TLV starting at `offset`, advancing it past the TLV on
    /// success.
    pub fn deserialize(scope: Scope, buf: &[u8], offset: &mut usize) -> Result<Self> {
        let start = *offset;
        if buf.len() < start + 2 {
            return Err(CommissionerError::bad_format("truncated TLV header"));
        }
        let tlv_type = buf[start];
        let short_len = buf[start + 1];
        let (len, header_len) = if short_len == ESCAPE_LENGTH {
            if buf.len() < start + 4 {
                return Err(CommissionerError::bad_format("truncated extended TLV length"));
            }
            let len = u16::from_be_bytes([buf[start + 2], buf[start + 3]]) as usize;
            (len, 4)
        } else {
            (short_len as usize, 2)
        };

        if len > MAX_VALUE_LEN {
            return Err(CommissionerError::bad_format(format!(
                "TLV value length {len} exceeds maximum {MAX_VALUE_LEN}"
            )));
        }
        if buf.len() < start + header_len + len {
            return Err(CommissionerError::bad_format("truncated TLV value"));
        }

        let value = buf[start + header_len..start + header_len + len].to_vec();
        *offset = start + header_len + len;

        if !is_valid(scope, tlv_type, value.len()) {
            return if is_critical(scope, tlv_type) {
                Err(CommissionerError::bad_format(format!(
                    "critical TLV type {tlv_type} failed validity check"
                )))
            } else {
                // Caller drops non-critical invalid TLVs; signal via a
                // dedicated, recoverable error the caller can filter on.
                Err(CommissionerError::new(
                    crate::error::ErrorCode::NotFound,
                    "non-critical TLV dropped",
                ))
            };
        }

        Ok(Tlv { scope, tlv_type, value })
    }
}

/// Per-`(scope, type)` validity predicate: fixed length, maximum length, or
/// "any `<= 1034`".
pub fn is_valid(scope: Scope, tlv_type: u8, len: usize) -> bool {
    use MeshCopType::*;
    match scope {
        Scope::MeshCop => match tlv_type {
            t if t == Channel as u8 => len == 3,
            t if t == PanId as u8 => len == 2,
            t if t == ExtendedPanId as u8 => len == 8,
            t if t == NetworkName as u8 => len <= 16,
            t if t == PSKc as u8 => len <= 16,
            t if t == NetworkMasterKey as u8 => len == 16,
            t if t == NetworkKeySequenceCounter as u8 => len == 4,
            t if t == NetworkMeshLocalPrefix as u8 => len == 8,
            t if t == SteeringData as u8 => len <= 16,
            t if t == BorderAgentLocator as u8 => len == 4,
            t if t == CommissionerId as u8 => len <= 64,
            t if t == CommissionerSessionId as u8 => len == 2,
            t if t == SecurityPolicy as u8 => len >= 2,
            t if t == ActiveTimestamp as u8 => len == 8,
            t if t == CommissionerUdpPort as u8 => len == 2,
            t if t == State as u8 => len == 1,
            t if t == JoinerUdpPort as u8 => len == 2,
            t if t == JoinerIID as u8 => len == 8,
            t if t == JoinerRouterLocator as u8 => len == 2,
            t if t == JoinerRouterKek as u8 => len == 16,
            t if t == PendingTimestamp as u8 => len == 8,
            t if t == DelayTimer as u8 => len == 4,
            _ => len <= MAX_VALUE_LEN,
        },
        _ => len <= MAX_VALUE_LEN,
    }
}

pub fn is_critical(scope: Scope, tlv_type: u8) -> bool {
    match scope {
        Scope::MeshCop => CRITICAL_MESH_COP_TYPES.contains(&tlv_type),
        _ => false,
    }
}

/// Typed lookup by TLV type, last occurrence wins (consistent with
/// `TlvList` iteration order: later TLVs overwrite earlier ones of the same
/// type).
pub type TlvSet = BTreeMap<u8, Tlv>;

/// In-order list, used where a TLV type may legitimately repeat.
pub type TlvList = Vec<Tlv>;

/// Decodes every TLV in `buf`, building a [`TlvSet`]. Non-critical TLVs that
/// fail validation are dropped; a critical one aborts decoding.
pub fn get_tlv_set(scope: Scope, buf: &[u8]) -> Result<TlvSet> {
    let mut set = TlvSet::new();
    let mut offset = 0;
    while offset < buf.len() {
        match Tlv::deserialize(scope, buf, &mut offset) {
            Ok(tlv) => {
                set.insert(tlv.tlv_type(), tlv);
            },
            Err(e) if e.code == crate::error::ErrorCode::NotFound => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(set)
}

/// Decodes every TLV in `buf`, preserving order and repeats.
pub fn get_tlv_list(scope: Scope, buf: &[u8]) -> Result<TlvList> {
    let mut list = TlvList::new();
    let mut offset = 0;
    while offset < buf.len() {
        match Tlv::deserialize(scope, buf, &mut offset) {
            Ok(tlv) => list.push(tlv),
            Err(e) if e.code == crate::error::ErrorCode::NotFound => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(list)
}

pub fn encode_tlvs(tlvs: &[Tlv]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(tlvs.iter().map(Tlv::total_length).sum());
    for tlv in tlvs {
        tlv.serialize(&mut buf);
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_short_tlv() {
        let tlv = Tlv::new(Scope::MeshCop, MeshCopType::CommissionerSessionId as u8, vec![0x00, 0x42]);
        let mut buf = Vec::new();
        tlv.serialize(&mut buf);
        assert_eq!(buf, vec![11, 2, 0x00, 0x42]);

        let mut offset = 0;
        let decoded = Tlv::deserialize(Scope::MeshCop, &buf, &mut offset).expect("decodes");
        assert_eq!(decoded, tlv);
        assert_eq!(offset, buf.len());
    }

    #[test]
    fn round_trip_escaped_length() {
        let value = vec![0xAB; 300];
        let tlv = Tlv::new(Scope::NetworkDiag, NetworkDiagType::NetworkData as u8, value.clone());
        let mut buf = Vec::new();
        tlv.serialize(&mut buf);
        assert_eq!(buf[1], ESCAPE_LENGTH);
        assert_eq!(u16::from_be_bytes([buf[2], buf[3]]) as usize, 300);

        let mut offset = 0;
        let decoded = Tlv::deserialize(Scope::NetworkDiag, &buf, &mut offset).expect("decodes");
        assert_eq!(decoded.value(), value.as_slice());
    }

    #[test]
    fn always_escaped_type_uses_extended_encoding_even_when_short() {
        let tlv = Tlv::new(Scope::MeshCop, MeshCopType::SteeringData as u8, vec![0x00]);
        let mut buf = Vec::new();
        tlv.serialize(&mut buf);
        assert_eq!(buf[1], ESCAPE_LENGTH);
    }

    #[test]
    fn critical_type_with_bad_length_aborts_decode() {
        // State TLV must be exactly 1 byte; zero-length is invalid and State
        // is in the critical set, so decoding the whole message fails.
        let buf = vec![MeshCopType::State as u8, 0];
        let mut offset = 0;
        let res = Tlv::deserialize(Scope::MeshCop, &buf, &mut offset);
        assert!(res.is_err());
    }

    #[test]
    fn noncritical_type_with_bad_length_is_dropped_not_fatal() {
        // PanId must be 2 bytes; zero-length is invalid but PanId is not in
        // the critical set, so the TLV is dropped rather than aborting.
        let buf = vec![MeshCopType::PanId as u8, 0];
        let set = get_tlv_set(Scope::MeshCop, &buf).expect("non-critical drop is not an error");
        assert!(set.is_empty());
    }

    #[test]
    fn tlv_set_keeps_last_occurrence() {
        let mut buf = Vec::new();
        Tlv::new(Scope::MeshCop, MeshCopType::CommissionerSessionId as u8, vec![0x00, 0x01])
            .serialize(&mut buf);
        Tlv::new(Scope::MeshCop, MeshCopType::CommissionerSessionId as u8, vec![0x00, 0x02])
            .serialize(&mut buf);
        let set = get_tlv_set(Scope::MeshCop, &buf).expect("decodes");
        assert_eq!(
            set.get(&(MeshCopType::CommissionerSessionId as u8)).expect("present").value_as_u16().expect("u16-sized"),
            0x0002
        );
    }
}
