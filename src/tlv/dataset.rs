// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Active/Pending Operational, Commissioner and Backbone-Router datasets:
//! optional-field structs with a `present_flags` bitmask, TLV encode/decode,
//! and merge semantics.

use bitflags::bitflags;

use crate::{
    error::{CommissionerError, Result},
    tlv::{
        channel_mask::ChannelMask,
        codec::{MeshCopType, Scope, Tlv, get_tlv_set},
        security_policy::SecurityPolicy,
        steering::SteeringData,
    },
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ActiveFlags: u32 {
        const ACTIVE_TIMESTAMP    = 1 << 0;
        const CHANNEL             = 1 << 1;
        const CHANNEL_MASK        = 1 << 2;
        const EXTENDED_PAN_ID     = 1 << 3;
        const MESH_LOCAL_PREFIX   = 1 << 4;
        const NETWORK_MASTER_KEY  = 1 << 5;
        const NETWORK_NAME        = 1 << 6;
        const PAN_ID              = 1 << 7;
        const PSKC                = 1 << 8;
        const SECURITY_POLICY     = 1 << 9;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PendingFlags: u32 {
        const ACTIVE_TIMESTAMP  = 1 << 0;
        const PENDING_TIMESTAMP = 1 << 1;
        const DELAY_TIMER       = 1 << 2;
        const ACTIVE            = 1 << 3; // nested active-dataset fields are present
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CommissionerFlags: u32 {
        const SESSION_ID            = 1 << 0;
        const BORDER_AGENT_LOCATOR  = 1 << 1;
        const STEERING_DATA         = 1 << 2;
        const AE_STEERING_DATA      = 1 << 3;
        const NMKP_STEERING_DATA    = 1 << 4;
        const JOINER_UDP_PORT       = 1 << 5;
        const AE_UDP_PORT           = 1 << 6;
        const NMKP_UDP_PORT         = 1 << 7;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BbrFlags: u32 {
        const REGISTRAR_IPV6_ADDR = 1 << 0;
        const REGISTRAR_HOSTNAME  = 1 << 1;
        const DOMAIN_NAME         = 1 << 2;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActiveDataset {
    pub present_flags: ActiveFlags,
    pub active_timestamp: u64,
    pub channel: u16,
    pub channel_mask: ChannelMask,
    pub extended_pan_id: [u8; 8],
    pub mesh_local_prefix: [u8; 8],
    pub network_master_key: [u8; 16],
    pub network_name: String,
    pub pan_id: u16,
    pub pskc: Vec<u8>,
    pub security_policy: SecurityPolicy,
}

impl ActiveDataset {
    pub fn encode(&self) -> Vec<u8> {
        let mut tlvs = Vec::new();
        let f = self.present_flags;
        if f.contains(ActiveFlags::ACTIVE_TIMESTAMP) {
            tlvs.push(Tlv::new(
                Scope::MeshCop,
                MeshCopType::ActiveTimestamp as u8,
                self.active_timestamp.to_be_bytes().to_vec(),
            ));
        }
        if f.contains(ActiveFlags::CHANNEL) {
            let mut v = vec![0u8]; // channel page, always 0 for this encoding
            v.extend_from_slice(&self.channel.to_be_bytes());
            tlvs.push(Tlv::new(Scope::MeshCop, MeshCopType::Channel as u8, v));
        }
        if f.contains(ActiveFlags::CHANNEL_MASK) {
            tlvs.push(Tlv::new(Scope::MeshCop, MeshCopType::ChannelMask as u8, self.channel_mask.encode()));
        }
        if f.contains(ActiveFlags::EXTENDED_PAN_ID) {
            tlvs.push(Tlv::new(
                Scope::MeshCop,
                MeshCopType::ExtendedPanId as u8,
                self.extended_pan_id.to_vec(),
            ));
        }
        if f.contains(ActiveFlags::MESH_LOCAL_PREFIX) {
            tlvs.push(Tlv::new(
                Scope::MeshCop,
                MeshCopType::NetworkMeshLocalPrefix as u8,
                self.mesh_local_prefix.to_vec(),
            ));
        }
        if f.contains(ActiveFlags::NETWORK_MASTER_KEY) {
            tlvs.push(Tlv::new(
                Scope::MeshCop,
                MeshCopType::NetworkMasterKey as u8,
                self.network_master_key.to_vec(),
            ));
        }
        if f.contains(ActiveFlags::NETWORK_NAME) {
            tlvs.push(Tlv::new(
                Scope::MeshCop,
                MeshCopType::NetworkName as u8,
                self.network_name.as_bytes().to_vec(),
            ));
        }
        if f.contains(ActiveFlags::PAN_ID) {
            tlvs.push(Tlv::new(Scope::MeshCop, MeshCopType::PanId as u8, self.pan_id.to_be_bytes().to_vec()));
        }
        if f.contains(ActiveFlags::PSKC) {
            tlvs.push(Tlv::new(Scope::MeshCop, MeshCopType::PSKc as u8, self.pskc.clone()));
        }
        if f.contains(ActiveFlags::SECURITY_POLICY) {
            tlvs.push(Tlv::new(
                Scope::MeshCop,
                MeshCopType::SecurityPolicy as u8,
                self.security_policy.encode(),
            ));
        }
        crate::tlv::codec::encode_tlvs(&tlvs)
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let set = get_tlv_set(Scope::MeshCop, buf)?;
        let mut ds = ActiveDataset::default();

        if let Some(tlv) = set.get(&(MeshCopType::ActiveTimestamp as u8)) {
            ds.active_timestamp = u64::from_be_bytes(
                tlv.value().try_into().map_err(|_| CommissionerError::bad_format("bad ActiveTimestamp"))?,
            );
            ds.present_flags |= ActiveFlags::ACTIVE_TIMESTAMP;
        }
        if let Some(tlv) = set.get(&(MeshCopType::Channel as u8)) {
            ds.channel = tlv.value_as_u16_from(1)?;
            ds.present_flags |= ActiveFlags::CHANNEL;
        }
        if let Some(tlv) = set.get(&(MeshCopType::ChannelMask as u8)) {
            ds.channel_mask = ChannelMask::decode(tlv.value())?;
            ds.present_flags |= ActiveFlags::CHANNEL_MASK;
        }
        if let Some(tlv) = set.get(&(MeshCopType::ExtendedPanId as u8)) {
            ds.extended_pan_id = tlv
                .value()
                .try_into()
                .map_err(|_| CommissionerError::bad_format("bad ExtendedPanId"))?;
            ds.present_flags |= ActiveFlags::EXTENDED_PAN_ID;
        }
        if let Some(tlv) = set.get(&(MeshCopType::NetworkMeshLocalPrefix as u8)) {
            ds.mesh_local_prefix = tlv
                .value()
                .try_into()
                .map_err(|_| CommissionerError::bad_format("bad MeshLocalPrefix"))?;
            ds.present_flags |= ActiveFlags::MESH_LOCAL_PREFIX;
        }
        if let Some(tlv) = set.get(&(MeshCopType::NetworkMasterKey as u8)) {
            ds.network_master_key = tlv
                .value()
                .try_into()
                .map_err(|_| CommissionerError::bad_format("bad NetworkMasterKey"))?;
            ds.present_flags |= ActiveFlags::NETWORK_MASTER_KEY;
        }
        if let Some(tlv) = set.get(&(MeshCopType::NetworkName as u8)) {
            ds.network_name = tlv.value_as_string()?;
            ds.present_flags |= ActiveFlags::NETWORK_NAME;
        }
        if let Some(tlv) = set.get(&(MeshCopType::PanId as u8)) {
            ds.pan_id = tlv.value_as_u16()?;
            ds.present_flags |= ActiveFlags::PAN_ID;
        }
        if let Some(tlv) = set.get(&(MeshCopType::PSKc as u8)) {
            ds.pskc = tlv.value().to_vec();
            ds.present_flags |= ActiveFlags::PSKC;
        }
        if let Some(tlv) = set.get(&(MeshCopType::SecurityPolicy as u8)) {
            ds.security_policy = SecurityPolicy::decode(tlv.value())?;
            ds.present_flags |= ActiveFlags::SECURITY_POLICY;
        }

        Ok(ds)
    }

    /// Fields forbidden on an Active Dataset write (they belong to the
    /// Pending Dataset instead).
    pub fn validate_for_write(&self) -> Result<()> {
        if !self.present_flags.contains(ActiveFlags::ACTIVE_TIMESTAMP) {
            return Err(CommissionerError::bad_format("ActiveTimestamp is mandatory on Active Dataset write"));
        }
        let forbidden = ActiveFlags::CHANNEL
            | ActiveFlags::PAN_ID
            | ActiveFlags::MESH_LOCAL_PREFIX
            | ActiveFlags::NETWORK_MASTER_KEY;
        if self.present_flags.intersects(forbidden) {
            return Err(CommissionerError::invalid_args(
                "Channel, PanId, MeshLocalPrefix and NetworkMasterKey must be set via the Pending Dataset",
            ));
        }
        Ok(())
    }

    /// Last-write-wins merge: every field set in `src` overwrites `dst`;
    /// fields absent from `src` are left untouched in `dst`.
    pub fn merge(dst: &mut Self, src: &Self) {
        macro_rules! merge_field {
            ($flag:ident, $field:ident) => {
                if src.present_flags.contains(ActiveFlags::$flag) {
                    dst.$field = src.$field.clone();
                    dst.present_flags |= ActiveFlags::$flag;
                }
            };
        }
        merge_field!(ACTIVE_TIMESTAMP, active_timestamp);
        merge_field!(CHANNEL, channel);
        merge_field!(CHANNEL_MASK, channel_mask);
        merge_field!(EXTENDED_PAN_ID, extended_pan_id);
        merge_field!(MESH_LOCAL_PREFIX, mesh_local_prefix);
        merge_field!(NETWORK_MASTER_KEY, network_master_key);
        merge_field!(NETWORK_NAME, network_name);
        merge_field!(PAN_ID, pan_id);
        merge_field!(PSKC, pskc);
        merge_field!(SECURITY_POLICY, security_policy);
    }
}

// `Tlv::value_as_u16` assumes a 2-byte value at offset 0; Channel TLVs carry
// a leading page byte, so a small helper reads the trailing u16 instead.
trait ValueAtOffset {
    fn value_as_u16_from(&self, offset: usize) -> Result<u16>;
}

impl ValueAtOffset for Tlv {
    fn value_as_u16_from(&self, offset: usize) -> Result<u16> {
        let v = self.value();
        if v.len() < offset + 2 {
            return Err(CommissionerError::bad_format("TLV value too short"));
        }
        Ok(u16::from_be_bytes([v[offset], v[offset + 1]]))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PendingDataset {
    pub present_flags: PendingFlags,
    pub active_timestamp: u64,
    pub pending_timestamp: u64,
    pub delay_timer: u32,
    pub active: ActiveDataset,
}

impl PendingDataset {
    pub fn encode(&self) -> Vec<u8> {
        let mut tlvs = Vec::new();
        let f = self.present_flags;
        if f.contains(PendingFlags::ACTIVE_TIMESTAMP) {
            tlvs.push(Tlv::new(
                Scope::MeshCop,
                MeshCopType::ActiveTimestamp as u8,
                self.active_timestamp.to_be_bytes().to_vec(),
            ));
        }
        if f.contains(PendingFlags::PENDING_TIMESTAMP) {
            tlvs.push(Tlv::new(
                Scope::MeshCop,
                MeshCopType::PendingTimestamp as u8,
                self.pending_timestamp.to_be_bytes().to_vec(),
            ));
        }
        if f.contains(PendingFlags::DELAY_TIMER) {
            tlvs.push(Tlv::new(Scope::MeshCop, MeshCopType::DelayTimer as u8, self.delay_timer.to_be_bytes().to_vec()));
        }
        let mut buf = crate::tlv::codec::encode_tlvs(&tlvs);
        if f.contains(PendingFlags::ACTIVE) {
            buf.extend_from_slice(&self.active.encode());
        }
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let set = get_tlv_set(Scope::MeshCop, buf)?;
        let mut ds = PendingDataset::default();

        if let Some(tlv) = set.get(&(MeshCopType::ActiveTimestamp as u8)) {
            ds.active_timestamp = u64::from_be_bytes(
                tlv.value().try_into().map_err(|_| CommissionerError::bad_format("bad ActiveTimestamp"))?,
            );
            ds.present_flags |= PendingFlags::ACTIVE_TIMESTAMP;
        }
        if let Some(tlv) = set.get(&(MeshCopType::PendingTimestamp as u8)) {
            ds.pending_timestamp = u64::from_be_bytes(
                tlv.value().try_into().map_err(|_| CommissionerError::bad_format("bad PendingTimestamp"))?,
            );
            ds.present_flags |= PendingFlags::PENDING_TIMESTAMP;
        }
        if let Some(tlv) = set.get(&(MeshCopType::DelayTimer as u8)) {
            ds.delay_timer = u32::from_be_bytes(
                tlv.value().try_into().map_err(|_| CommissionerError::bad_format("bad DelayTimer"))?,
            );
            ds.present_flags |= PendingFlags::DELAY_TIMER;
        }

        let active = ActiveDataset::decode(buf)?;
        if !active.present_flags.is_empty() {
            ds.active = active;
            ds.present_flags |= PendingFlags::ACTIVE;
        }

        Ok(ds)
    }

    pub fn validate_for_write(&self) -> Result<()> {
        let mandatory = PendingFlags::ACTIVE_TIMESTAMP | PendingFlags::PENDING_TIMESTAMP | PendingFlags::DELAY_TIMER;
        if !self.present_flags.contains(mandatory) {
            return Err(CommissionerError::bad_format(
                "ActiveTimestamp, PendingTimestamp and DelayTimer are mandatory on Pending Dataset write",
            ));
        }
        Ok(())
    }

    pub fn merge(dst: &mut Self, src: &Self) {
        if src.present_flags.contains(PendingFlags::ACTIVE_TIMESTAMP) {
            dst.active_timestamp = src.active_timestamp;
            dst.present_flags |= PendingFlags::ACTIVE_TIMESTAMP;
        }
        if src.present_flags.contains(PendingFlags::PENDING_TIMESTAMP) {
            dst.pending_timestamp = src.pending_timestamp;
            dst.present_flags |= PendingFlags::PENDING_TIMESTAMP;
        }
        if src.present_flags.contains(PendingFlags::DELAY_TIMER) {
            dst.delay_timer = src.delay_timer;
            dst.present_flags |= PendingFlags::DELAY_TIMER;
        }
        if src.present_flags.contains(PendingFlags::ACTIVE) {
            ActiveDataset::merge(&mut dst.active, &src.active);
            dst.present_flags |= PendingFlags::ACTIVE;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommissionerDataset {
    pub present_flags: CommissionerFlags,
    pub session_id: u16,
    pub border_agent_locator: u32,
    pub steering_data: SteeringData,
    pub ae_steering_data: SteeringData,
    pub nmkp_steering_data: SteeringData,
    pub joiner_udp_port: u16,
    pub ae_udp_port: u16,
    pub nmkp_udp_port: u16,
}

impl CommissionerDataset {
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let set = get_tlv_set(Scope::MeshCop, buf)?;
        let mut ds = CommissionerDataset::default();

        if let Some(tlv) = set.get(&(MeshCopType::CommissionerSessionId as u8)) {
            ds.session_id = tlv.value_as_u16()?;
            ds.present_flags |= CommissionerFlags::SESSION_ID;
        }
        if let Some(tlv) = set.get(&(MeshCopType::BorderAgentLocator as u8)) {
            ds.border_agent_locator = u32::from_be_bytes(
                tlv.value().try_into().map_err(|_| CommissionerError::bad_format("bad BorderAgentLocator"))?,
            );
            ds.present_flags |= CommissionerFlags::BORDER_AGENT_LOCATOR;
        }
        if let Some(tlv) = set.get(&(MeshCopType::SteeringData as u8)) {
            ds.steering_data = SteeringData::from_bytes(tlv.value().to_vec());
            ds.present_flags |= CommissionerFlags::STEERING_DATA;
        }
        if let Some(tlv) = set.get(&(MeshCopType::AeSteeringData as u8)) {
            ds.ae_steering_data = SteeringData::from_bytes(tlv.value().to_vec());
            ds.present_flags |= CommissionerFlags::AE_STEERING_DATA;
        }
        if let Some(tlv) = set.get(&(MeshCopType::NmkpSteeringData as u8)) {
            ds.nmkp_steering_data = SteeringData::from_bytes(tlv.value().to_vec());
            ds.present_flags |= CommissionerFlags::NMKP_STEERING_DATA;
        }
        if let Some(tlv) = set.get(&(MeshCopType::JoinerUdpPort as u8)) {
            ds.joiner_udp_port = tlv.value_as_u16()?;
            ds.present_flags |= CommissionerFlags::JOINER_UDP_PORT;
        }
        if let Some(tlv) = set.get(&(MeshCopType::AeUdpPort as u8)) {
            ds.ae_udp_port = tlv.value_as_u16()?;
            ds.present_flags |= CommissionerFlags::AE_UDP_PORT;
        }
        if let Some(tlv) = set.get(&(MeshCopType::NmkpUdpPort as u8)) {
            ds.nmkp_udp_port = tlv.value_as_u16()?;
            ds.present_flags |= CommissionerFlags::NMKP_UDP_PORT;
        }

        Ok(ds)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut tlvs = Vec::new();
        let f = self.present_flags;
        if f.contains(CommissionerFlags::SESSION_ID) {
            tlvs.push(Tlv::new(
                Scope::MeshCop,
                MeshCopType::CommissionerSessionId as u8,
                self.session_id.to_be_bytes().to_vec(),
            ));
        }
        if f.contains(CommissionerFlags::BORDER_AGENT_LOCATOR) {
            tlvs.push(Tlv::new(
                Scope::MeshCop,
                MeshCopType::BorderAgentLocator as u8,
                self.border_agent_locator.to_be_bytes().to_vec(),
            ));
        }
        if f.contains(CommissionerFlags::STEERING_DATA) {
            tlvs.push(Tlv::new(Scope::MeshCop, MeshCopType::SteeringData as u8, self.steering_data.as_bytes().to_vec()));
        }
        if f.contains(CommissionerFlags::AE_STEERING_DATA) {
            tlvs.push(Tlv::new(
                Scope::MeshCop,
                MeshCopType::AeSteeringData as u8,
                self.ae_steering_data.as_bytes().to_vec(),
            ));
        }
        if f.contains(CommissionerFlags::NMKP_STEERING_DATA) {
            tlvs.push(Tlv::new(
                Scope::MeshCop,
                MeshCopType::NmkpSteeringData as u8,
                self.nmkp_steering_data.as_bytes().to_vec(),
            ));
        }
        if f.contains(CommissionerFlags::JOINER_UDP_PORT) {
            tlvs.push(Tlv::new(
                Scope::MeshCop,
                MeshCopType::JoinerUdpPort as u8,
                self.joiner_udp_port.to_be_bytes().to_vec(),
            ));
        }
        if f.contains(CommissionerFlags::AE_UDP_PORT) {
            tlvs.push(Tlv::new(Scope::MeshCop, MeshCopType::AeUdpPort as u8, self.ae_udp_port.to_be_bytes().to_vec()));
        }
        if f.contains(CommissionerFlags::NMKP_UDP_PORT) {
            tlvs.push(Tlv::new(
                Scope::MeshCop,
                MeshCopType::NmkpUdpPort as u8,
                self.nmkp_udp_port.to_be_bytes().to_vec(),
            ));
        }
        crate::tlv::codec::encode_tlvs(&tlvs)
    }

    /// SessionId and BorderAgentLocator are read-only and must be stripped
    /// before a SET is transmitted.
    pub fn strip_read_only_for_write(&self) -> Self {
        let mut w = self.clone();
        w.present_flags.remove(CommissionerFlags::SESSION_ID | CommissionerFlags::BORDER_AGENT_LOCATOR);
        w
    }

    /// Merge with the Commissioner-dataset divergence (open question (i)):
    /// `steering_data` and `joiner_udp_port` are *cleared* in `dst` when
    /// absent from `src`, unlike every other dataset's preserve-on-absent
    /// rule.
    pub fn merge(dst: &mut Self, src: &Self) {
        macro_rules! merge_preserve {
            ($flag:ident, $field:ident) => {
                if src.present_flags.contains(CommissionerFlags::$flag) {
                    dst.$field = src.$field.clone();
                    dst.present_flags |= CommissionerFlags::$flag;
                }
            };
        }
        macro_rules! merge_clear_on_absent {
            ($flag:ident, $field:ident) => {
                if src.present_flags.contains(CommissionerFlags::$flag) {
                    dst.$field = src.$field.clone();
                    dst.present_flags |= CommissionerFlags::$flag;
                } else {
                    dst.$field = Default::default();
                    dst.present_flags.remove(CommissionerFlags::$flag);
                }
            };
        }

        merge_preserve!(SESSION_ID, session_id);
        merge_preserve!(BORDER_AGENT_LOCATOR, border_agent_locator);
        merge_clear_on_absent!(STEERING_DATA, steering_data);
        merge_clear_on_absent!(JOINER_UDP_PORT, joiner_udp_port);
        merge_preserve!(AE_STEERING_DATA, ae_steering_data);
        merge_preserve!(NMKP_STEERING_DATA, nmkp_steering_data);
        merge_preserve!(AE_UDP_PORT, ae_udp_port);
        merge_preserve!(NMKP_UDP_PORT, nmkp_udp_port);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BbrDataset {
    pub present_flags: BbrFlags,
    pub registrar_ipv6_addr: [u8; 16],
    pub registrar_hostname: String,
    pub domain_name: String,
}

impl BbrDataset {
    /// RegistrarIpv6Addr is read-only; callers must not set it on a write.
    pub fn validate_for_write(&self) -> Result<()> {
        if self.present_flags.contains(BbrFlags::REGISTRAR_IPV6_ADDR) {
            return Err(CommissionerError::invalid_args("RegistrarIpv6Addr is read-only"));
        }
        Ok(())
    }

    pub fn merge(dst: &mut Self, src: &Self) {
        macro_rules! merge_field {
            ($flag:ident, $field:ident) => {
                if src.present_flags.contains(BbrFlags::$flag) {
                    dst.$field = src.$field.clone();
                    dst.present_flags |= BbrFlags::$flag;
                }
            };
        }
        merge_field!(REGISTRAR_IPV6_ADDR, registrar_ipv6_addr);
        merge_field!(REGISTRAR_HOSTNAME, registrar_hostname);
        merge_field!(DOMAIN_NAME, domain_name);
    }
}
