// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! UDP-proxy client: tunnels outbound CoAP requests inside `UDP_TX.ntf`
//! (`/c/ur`) over the border-agent secure session, and decapsulates
//! `UDP_RX.ntf` (`/c/ut`) back into CoAP responses.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{
    address::Address,
    coap::{
        engine::{CoapEngine, DatagramTransport},
        message::{Code, Message, MessageType},
    },
    commissioner::uris,
    error::{CommissionerError, Result},
    tlv::codec::{MeshCopType, Scope, Tlv, get_tlv_set},
};

/// Default Thread management port, used as the hard-coded source port on
/// every `UDP_TX.ntf` this client emits.
pub const DEFAULT_MM_PORT: u16 = 61631;

/// A mesh-local prefix must begin with the locally-assigned ULA prefix byte.
const MESH_LOCAL_PREFIX_TAG: u8 = 0xFD;

#[derive(Debug, Default)]
struct State {
    mesh_local_prefix: Option<[u8; 8]>,
}

/// Holds the lazily-fetched mesh-local prefix and performs anycast-locator
/// address derivation and `UDP_TX`/`UDP_RX` payload framing. Does not itself
/// own a transport; callers pair it with the outer secure session and the
/// inner CoAP engine (see §4.5: "the inner CoAP engine is a separate
/// instance whose transport is the proxy endpoint").
#[derive(Debug, Default)]
pub struct UdpProxyClient {
    state: RwLock<State>,
}

impl UdpProxyClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn mesh_local_prefix(&self) -> Option<[u8; 8]> {
        self.state.read().await.mesh_local_prefix
    }

    pub async fn clear_mesh_local_prefix(&self) {
        self.state.write().await.mesh_local_prefix = None;
    }

    pub async fn set_mesh_local_prefix(&self, prefix: [u8; 8]) -> Result<()> {
        if prefix[0] != MESH_LOCAL_PREFIX_TAG {
            return Err(CommissionerError::invalid_args("mesh-local prefix must begin with 0xFD"));
        }
        self.state.write().await.mesh_local_prefix = Some(prefix);
        Ok(())
    }

    /// `prefix || 00 00 00 FF FE 00 || aloc16`, the standard Thread
    /// anycast-locator-to-IPv6 expansion.
    pub fn anycast_locator_address(prefix: &[u8; 8], aloc16: u16) -> Address {
        let mut octets = [0u8; 16];
        octets[..8].copy_from_slice(prefix);
        octets[8..13].copy_from_slice(&[0x00, 0x00, 0x00, 0xFF, 0xFE]);
        octets[13] = 0x00;
        octets[14..16].copy_from_slice(&aloc16.to_be_bytes());
        Address::from_ipv6(octets)
    }

    /// `src-port(2) || dst-port(2) || opaque-coap-bytes`, the `UDP_TX.ntf`
    /// payload layout. Source is always `DEFAULT_MM_PORT`.
    pub fn encode_udp_tx(dst_port: u16, coap_bytes: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + coap_bytes.len());
        buf.extend_from_slice(&DEFAULT_MM_PORT.to_be_bytes());
        buf.extend_from_slice(&dst_port.to_be_bytes());
        buf.extend_from_slice(coap_bytes);
        buf
    }

    /// Decodes a `UDP_RX.ntf` payload, returning `(src_port, dst_port,
    /// coap_bytes)`. Rejects payloads whose destination port is not
    /// `DEFAULT_MM_PORT` — this client never listens on any other port.
    pub fn decode_udp_rx(payload: &[u8]) -> Result<(u16, u16, &[u8])> {
        if payload.len() < 4 {
            return Err(CommissionerError::bad_format("UDP_RX.ntf payload shorter than the port header"));
        }
        let src_port = u16::from_be_bytes([payload[0], payload[1]]);
        let dst_port = u16::from_be_bytes([payload[2], payload[3]]);
        if dst_port != DEFAULT_MM_PORT {
            return Err(CommissionerError::bad_format(format!(
                "UDP_RX.ntf destined for unexpected port {dst_port}, expected {DEFAULT_MM_PORT}"
            )));
        }
        Ok((src_port, dst_port, &payload[4..]))
    }

    /// Builds the full `UDP_TX.ntf` request for a CoAP message addressed to
    /// a mesh-interior unicast node: the destination carried as an
    /// `Ipv6Address` TLV, the port-prefixed CoAP bytes as a
    /// `UdpEncapsulation` TLV (mirrors `ProxyEndpoint::Send`). Sent
    /// non-confirmable; the real request's own reliability is the inner CoAP
    /// engine's job, not this tunnel's.
    pub fn build_udp_tx(dst_addr: &Address, dst_port: u16, coap_bytes: &[u8]) -> Message {
        let mut payload = Vec::new();
        Tlv::new(Scope::MeshCop, MeshCopType::Ipv6Address as u8, dst_addr.raw().to_vec()).serialize(&mut payload);
        Tlv::new(Scope::MeshCop, MeshCopType::UdpEncapsulation as u8, Self::encode_udp_tx(dst_port, coap_bytes))
            .serialize(&mut payload);
        Message::new(MessageType::NonConfirmable, Code::POST, 0, Vec::new()).with_path(uris::UDP_TX).with_payload(payload)
    }

    /// Decodes an inbound `UDP_RX.ntf` request's payload into
    /// `(peer_addr, src_port, dst_port, coap_bytes)`.
    pub fn decode_udp_rx_request(payload: &[u8]) -> Result<(Address, u16, u16, Vec<u8>)> {
        let tlvs = get_tlv_set(Scope::MeshCop, payload)?;
        let addr_tlv = tlvs
            .get(&(MeshCopType::Ipv6Address as u8))
            .ok_or_else(|| CommissionerError::bad_format("UDP_RX.ntf missing Ipv6Address TLV"))?;
        let encap_tlv = tlvs
            .get(&(MeshCopType::UdpEncapsulation as u8))
            .ok_or_else(|| CommissionerError::bad_format("UDP_RX.ntf missing UdpEncapsulation TLV"))?;
        let addr = Address::from_raw(addr_tlv.value().to_vec())?;
        let (src_port, dst_port, coap_bytes) = Self::decode_udp_rx(encap_tlv.value())?;
        Ok((addr, src_port, dst_port, coap_bytes.to_vec()))
    }
}

/// Transport for the inner per-destination CoAP engine a unicast CCM
/// command runs over: every datagram it is asked to send is wrapped in a
/// `UDP_TX.ntf` (carrying the fixed `dst_addr`/`dst_port`) and fired over the
/// outer border-agent engine. Mirrors `ProxyEndpoint::Send` — the tunnel
/// itself never waits for a reply, only the inner engine's own exchange
/// does, once the matching `UDP_RX.ntf` is decoded and fed back in.
pub struct ProxyTransport<T: DatagramTransport> {
    outer: Arc<CoapEngine<T>>,
    dst_addr: Address,
    dst_port: u16,
}

impl<T: DatagramTransport> ProxyTransport<T> {
    pub fn new(outer: Arc<CoapEngine<T>>, dst_addr: Address, dst_port: u16) -> Self {
        Self { outer, dst_addr, dst_port }
    }
}

impl<T: DatagramTransport> DatagramTransport for ProxyTransport<T> {
    async fn send_datagram(&self, bytes: &[u8]) -> Result<()> {
        let udp_tx = UdpProxyClient::build_udp_tx(&self.dst_addr, self.dst_port, bytes);
        self.outer.send_notification(udp_tx).await
    }
}

/// Registers `proxy_engine` as the decoder for inbound `UDP_RX.ntf` on
/// `outer`, replacing whatever handler was registered for a previous
/// unicast command (CCM commands are issued one at a time, never
/// concurrently, so a single slot is sufficient).
pub fn register_udp_rx<T: DatagramTransport>(
    outer: &CoapEngine<T>,
    proxy_engine: Arc<CoapEngine<ProxyTransport<T>>>,
    expected_peer: Address,
) {
    outer.register_resource(
        uris::UDP_RX,
        Arc::new(move |req| {
            if let Ok((peer, _src_port, _dst_port, coap_bytes)) = UdpProxyClient::decode_udp_rx_request(&req.payload)
                && peer == expected_peer
                && let Ok(inner) = Message::decode(&coap_bytes)
            {
                proxy_engine.handle_incoming(inner);
            }
            Message::new(MessageType::Acknowledgement, Code::CHANGED, req.message_id, req.token.clone())
        }),
    );
}
