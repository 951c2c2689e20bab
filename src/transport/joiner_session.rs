// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Joiner session: one DTLS server per joining device, tunnelled through a
//! border agent via `RLY_TX.ntf`/`RLY_RX.ntf` relay notifications, nested
//! with a small CoAP server that handles `JOIN_FIN.req` on `/c/cf`.

use std::{collections::VecDeque, sync::Arc};

use tokio::sync::Mutex;

use crate::{
    coap::{
        engine::{CoapEngine, DatagramTransport},
        message::{Code, Message, MessageType},
    },
    commissioner::uris,
    error::{CommissionerError, Result},
    tlv::codec::{MeshCopType, Scope, Tlv, get_tlv_set},
    transport::secure_session::JOINER_ROUTER_KEK_LEN,
};

/// UDP port the joiner's DTLS client targets inside the relay tunnel.
pub const LISTENING_JOINER_PORT: u16 = 9527;

/// XORed into `joiner_id[0]` to derive the joiner IID carried in
/// `RLY_TX.ntf` (flips the universal/local bit of the EUI-64-derived id).
const LOCAL_EXTERNAL_ADDR_MASK: u8 = 1 << 1;

const STATE_ACCEPT: u8 = 1;
const STATE_REJECT: u8 = 0;

/// Upper bound on a joiner session's lifetime once DTLS has connected,
/// measured from handshake completion: the joiner must finalize within this
/// window or the session is torn down.
pub const JOINER_TIMEOUT_SECS: u64 = 20;

/// `/c/cf` request fields (`JOIN_FIN.req`).
#[derive(Debug, Clone)]
pub struct JoinFinRequest {
    pub vendor_name: String,
    pub vendor_model: String,
    pub vendor_sw_version: String,
    pub vendor_stack_version: Vec<u8>,
    pub provisioning_url: Option<String>,
    pub vendor_data: Option<Vec<u8>>,
}

/// Pseudo-socket presenting the relay notification stream as a plain
/// datagram socket to the nested DTLS context: inbound bytes arrive via
/// `push_rly_rx`, outbound bytes are queued for the caller to wrap in a
/// `RLY_TX.ntf` and send to the border agent.
#[derive(Debug, Default)]
pub struct RelaySocket {
    recv_bufs: Mutex<VecDeque<Vec<u8>>>,
    send_bufs: Mutex<VecDeque<Vec<u8>>>,
}

impl RelaySocket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called when a `RLY_RX.ntf` arrives for this joiner.
    pub async fn push_rly_rx(&self, payload: Vec<u8>) {
        self.recv_bufs.lock().await.push_back(payload);
    }

    /// Pulled by the DTLS read side; `None` means no datagram is queued yet.
    pub async fn pop_received(&self) -> Option<Vec<u8>> {
        self.recv_bufs.lock().await.pop_front()
    }

    /// Called by the DTLS write side; queues a datagram for the caller to
    /// relay onward as `RLY_TX.ntf`.
    pub async fn queue_send(&self, payload: Vec<u8>) {
        self.send_bufs.lock().await.push_back(payload);
    }

    /// Pulled by the caller driving the relay notifications out.
    pub async fn pop_to_send(&self) -> Option<Vec<u8>> {
        self.send_bufs.lock().await.pop_front()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Handshaking,
    Connected,
    Finalized,
    TimedOut,
}

/// One session per commissioning joiner. In proxy mode (`pskd` empty) the
/// session skips DTLS entirely and forwards payloads verbatim to the
/// caller-supplied joiner-message callback rather than running a nested CoAP
/// server.
pub struct JoinerSession {
    joiner_id: [u8; 8],
    pskd: String,
    joiner_udp_port: u16,
    joiner_router_locator: u16,
    relay: RelaySocket,
    state: Mutex<SessionState>,
}

impl JoinerSession {
    pub fn new(joiner_id: [u8; 8], pskd: String, joiner_udp_port: u16, joiner_router_locator: u16) -> Self {
        Self {
            joiner_id,
            pskd,
            joiner_udp_port,
            joiner_router_locator,
            relay: RelaySocket::new(),
            state: Mutex::new(SessionState::Handshaking),
        }
    }

    pub fn joiner_id(&self) -> [u8; 8] {
        self.joiner_id
    }

    pub fn joiner_udp_port(&self) -> u16 {
        self.joiner_udp_port
    }

    pub fn joiner_router_locator(&self) -> u16 {
        self.joiner_router_locator
    }

    /// `joiner_id` with the universal/local bit flipped, the IID this
    /// session's joiner is addressed by inside the relay tunnel.
    pub fn joiner_iid(&self) -> [u8; 8] {
        let mut iid = self.joiner_id;
        iid[0] ^= LOCAL_EXTERNAL_ADDR_MASK;
        iid
    }

    pub fn relay(&self) -> &RelaySocket {
        &self.relay
    }

    /// Builds the `RLY_TX.ntf` carrying `dtls_bytes` to this joiner's border
    /// router: `JoinerUdpPort`, `JoinerRouterLocator`, `JoinerIID` and
    /// `JoinerDtlsEncapsulation`, plus `JoinerRouterKek` when `kek` is
    /// supplied (the JOIN_FIN.rsp record is the only one sent with a KEK
    /// attached; every other outbound DTLS record omits it).
    pub fn build_rly_tx(&self, dtls_bytes: &[u8], kek: Option<Kek>) -> Message {
        let mut payload = Vec::new();
        Tlv::new(Scope::MeshCop, MeshCopType::JoinerUdpPort as u8, self.joiner_udp_port.to_be_bytes().to_vec())
            .serialize(&mut payload);
        Tlv::new(
            Scope::MeshCop,
            MeshCopType::JoinerRouterLocator as u8,
            self.joiner_router_locator.to_be_bytes().to_vec(),
        )
        .serialize(&mut payload);
        Tlv::new(Scope::MeshCop, MeshCopType::JoinerIID as u8, self.joiner_iid().to_vec()).serialize(&mut payload);
        Tlv::new(Scope::MeshCop, MeshCopType::JoinerDtlsEncapsulation as u8, dtls_bytes.to_vec())
            .serialize(&mut payload);
        if let Some(kek) = kek {
            Tlv::new(Scope::MeshCop, MeshCopType::JoinerRouterKek as u8, kek.to_vec()).serialize(&mut payload);
        }
        Message::new(MessageType::NonConfirmable, Code::POST, 0, Vec::new()).with_path(uris::RLY_TX).with_payload(payload)
    }

    /// A joiner session is in proxy mode when no PSKd was configured for it
    /// — the commissioner core only tunnels bytes, leaving DTLS and
    /// finalization to whatever external joining agent is speaking through
    /// this border agent.
    pub fn is_proxy_mode(&self) -> bool {
        self.pskd.is_empty()
    }

    pub async fn state(&self) -> SessionState {
        *self.state.lock().await
    }

    pub async fn mark_connected(&self) {
        *self.state.lock().await = SessionState::Connected;
    }

    pub async fn mark_timed_out(&self) {
        *self.state.lock().await = SessionState::TimedOut;
    }

    /// Validates a `JOIN_FIN.req` using the caller's acceptance callback and
    /// produces the `State` TLV value (`true` => Accept, `false` => Reject)
    /// for the `JOIN_FIN.rsp`. Pair with [`JoinerSession::join_fin_response`]
    /// and [`JoinerSession::build_rly_tx`] to frame and relay the reply: the
    /// `JOIN_FIN.rsp` this produces is the one record in the whole session
    /// whose `RLY_TX.ntf` also carries the KEK TLV.
    pub async fn handle_join_fin<F>(&self, req: &JoinFinRequest, on_finalize: F) -> Result<bool>
    where F: FnOnce(&JoinFinRequest) -> bool {
        if *self.state.lock().await != SessionState::Connected {
            return Err(CommissionerError::invalid_args("JOIN_FIN.req received outside a connected session"));
        }
        let accepted = on_finalize(req);
        *self.state.lock().await = SessionState::Finalized;
        Ok(accepted)
    }

    /// Builds the `JOIN_FIN.rsp` payload (a lone `State` TLV). The caller
    /// DTLS-encrypts the encoded message and passes the ciphertext to
    /// [`JoinerSession::build_rly_tx`] with the session's KEK attached.
    pub fn join_fin_response(&self, accepted: bool) -> Message {
        let state = if accepted { STATE_ACCEPT } else { STATE_REJECT };
        let mut payload = Vec::new();
        Tlv::new(Scope::MeshCop, MeshCopType::State as u8, vec![state]).serialize(&mut payload);
        Message::new(MessageType::Acknowledgement, Code::CHANGED, 0, Vec::new()).with_payload(payload)
    }
}

/// `SHA256`-derived KEK shared with the joiner router once the DTLS
/// handshake completes, re-exported here for callers that only import the
/// joiner-session module.
pub type Kek = [u8; JOINER_ROUTER_KEK_LEN];

/// Transport for the nested DTLS/CoAP server a non-proxy-mode joiner session
/// runs: every datagram it writes is framed as a `RLY_TX.ntf` (no KEK TLV —
/// only the JOIN_FIN.rsp record carries one, handled separately via
/// [`JoinerSession::join_fin_response`]) and fired over the outer
/// border-agent engine. Mirrors `crate::transport::udp_proxy::ProxyTransport`.
pub struct RelayTransport<T: DatagramTransport> {
    outer: Arc<CoapEngine<T>>,
    session: Arc<JoinerSession>,
}

impl<T: DatagramTransport> RelayTransport<T> {
    pub fn new(outer: Arc<CoapEngine<T>>, session: Arc<JoinerSession>) -> Self {
        Self { outer, session }
    }
}

impl<T: DatagramTransport> DatagramTransport for RelayTransport<T> {
    async fn send_datagram(&self, bytes: &[u8]) -> Result<()> {
        let rly_tx = self.session.build_rly_tx(bytes, None);
        self.outer.send_notification(rly_tx).await
    }
}

/// Decodes an inbound `RLY_RX.ntf` request's payload into `(joiner_udp_port,
/// joiner_router_locator, joiner_id, dtls_bytes)`. `joiner_id` is recovered
/// from the carried IID by re-applying the same XOR mask used to derive it
/// ([`JoinerSession::joiner_iid`]). The commissioner-level joiner table (not
/// this module — it owns no session registry) uses `joiner_id` to route
/// `dtls_bytes` to the right session's [`RelaySocket::push_rly_rx`].
pub fn decode_rly_rx(payload: &[u8]) -> Result<(u16, u16, [u8; 8], Vec<u8>)> {
    let tlvs = get_tlv_set(Scope::MeshCop, payload)?;
    let udp_port = tlvs
        .get(&(MeshCopType::JoinerUdpPort as u8))
        .ok_or_else(|| CommissionerError::bad_format("RLY_RX.ntf missing JoinerUdpPort TLV"))?
        .value_as_u16()?;
    let router_locator = tlvs
        .get(&(MeshCopType::JoinerRouterLocator as u8))
        .ok_or_else(|| CommissionerError::bad_format("RLY_RX.ntf missing JoinerRouterLocator TLV"))?
        .value_as_u16()?;
    let iid_tlv = tlvs
        .get(&(MeshCopType::JoinerIID as u8))
        .ok_or_else(|| CommissionerError::bad_format("RLY_RX.ntf missing JoinerIID TLV"))?;
    let dtls_tlv = tlvs
        .get(&(MeshCopType::JoinerDtlsEncapsulation as u8))
        .ok_or_else(|| CommissionerError::bad_format("RLY_RX.ntf missing JoinerDtlsEncapsulation TLV"))?;

    let mut joiner_id = [0u8; 8];
    if iid_tlv.value().len() != 8 {
        return Err(CommissionerError::bad_format("RLY_RX.ntf JoinerIID TLV is not 8 bytes"));
    }
    joiner_id.copy_from_slice(iid_tlv.value());
    joiner_id[0] ^= LOCAL_EXTERNAL_ADDR_MASK;

    Ok((udp_port, router_locator, joiner_id, dtls_tlv.value().to_vec()))
}
