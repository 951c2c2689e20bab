// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Top-level commissioning state machine: petitions for the commissioner
//! role, keeps the session alive, fetches/merges/writes the four datasets,
//! and issues the one-shot management commands (announce, PAN-ID query,
//! energy scan, multicast listener registration, CCM reenroll/domain-reset/
//! migrate).

use std::sync::Arc;

use mbedtls::{
    hash::Type as MdType,
    pk::Pk,
    rng::{CtrDrbg, OsEntropy},
};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{
    address::Address,
    cfg::config::CommissionerConfig,
    coap::{
        engine::{CoapEngine, DatagramTransport},
        message::{Code, Message, MessageType},
    },
    commissioner::uris,
    error::{CommissionerError, Result},
    tlv::{
        codec::{MeshCopType, Scope, Tlv, get_tlv_set},
        dataset::{ActiveDataset, ActiveFlags, BbrDataset, CommissionerDataset, PendingDataset},
    },
    transport::udp_proxy::{DEFAULT_MM_PORT, ProxyTransport, register_udp_rx},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Disabled,
    Connected,
    Petitioning,
    Active,
}

impl State {
    fn is_active_or_connected(self) -> bool {
        matches!(self, State::Active | State::Connected)
    }
}

/// Accept/Reject state byte carried by `/c/cp`, `/c/ca`, management
/// get/set responses and JOIN_FIN — the one TLV every CoAP exchange in
/// this module validates first.
const STATE_ACCEPT: u8 = 1;

struct Inner {
    state: State,
    session_id: Option<u16>,
    active: ActiveDataset,
    pending: PendingDataset,
    commissioner: CommissionerDataset,
    bbr: BbrDataset,
}

/// Drives the commissioning lifecycle over a CoAP engine bound to the
/// border-agent secure session. One instance per commissioner connection;
/// the joiner-session and UDP-proxy subsystems are driven separately and
/// report back into the cached datasets held here.
pub struct CommissionerStateMachine<T: DatagramTransport> {
    config: CommissionerConfig,
    engine: Arc<CoapEngine<T>>,
    inner: Mutex<Inner>,
    keep_alive_cancel: CancellationToken,
}

impl<T: DatagramTransport> CommissionerStateMachine<T> {
    pub fn new(config: CommissionerConfig, engine: Arc<CoapEngine<T>>) -> Self {
        Self {
            config,
            engine,
            inner: Mutex::new(Inner {
                state: State::Disabled,
                session_id: None,
                active: ActiveDataset::default(),
                pending: PendingDataset::default(),
                commissioner: CommissionerDataset::default(),
                bbr: BbrDataset::default(),
            }),
            keep_alive_cancel: CancellationToken::new(),
        }
    }

    pub async fn state(&self) -> State {
        self.inner.lock().await.state
    }

    pub async fn session_id(&self) -> Option<u16> {
        self.inner.lock().await.session_id
    }

    /// Transitions `Disabled -> Connected`. The DTLS handshake itself is
    /// driven by the caller (via `SecureSession::connect`); this only
    /// records the resulting state once the secure channel is up.
    pub async fn mark_connected(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state != State::Disabled {
            return Err(CommissionerError::invalid_state("connect requires Disabled"));
        }
        inner.state = State::Connected;
        Ok(())
    }

    /// Sends `COMM_PET.req` to `/c/cp`. On ACCEPT records `session_id` and
    /// transitions to `Active`; on REJECT surfaces the currently-active
    /// commissioner id (if echoed) as the error message.
    pub async fn petition(&self) -> Result<()> {
        {
            let mut inner = self.inner.lock().await;
            if inner.state != State::Connected {
                return Err(CommissionerError::invalid_state("petition requires Connected"));
            }
            inner.state = State::Petitioning;
        }

        let mut payload = Vec::new();
        Tlv::new(Scope::MeshCop, MeshCopType::CommissionerId as u8, self.config.id.clone().into_bytes())
            .serialize(&mut payload);

        self.sign_ccm_request(&mut payload, true)?;
        let request =
            Message::new(MessageType::Confirmable, Code::POST, 0, Vec::new()).with_path(uris::PETITION).with_payload(payload);
        let response = self.engine.request(request).await;

        let mut inner = self.inner.lock().await;
        match response {
            Ok(response) => {
                let tlvs = get_tlv_set(Scope::MeshCop, &response.payload)?;
                let state = tlvs
                    .get(&(MeshCopType::State as u8))
                    .ok_or_else(|| CommissionerError::bad_format("COMM_PET.rsp missing State TLV"))?
                    .value_as_u8()?;
                if state != STATE_ACCEPT {
                    inner.state = State::Disabled;
                    let rejected_id = tlvs
                        .get(&(MeshCopType::CommissionerId as u8))
                        .and_then(|t| t.value_as_string().ok())
                        .unwrap_or_default();
                    return Err(CommissionerError::rejected(format!(
                        "petition rejected, active commissioner id: {rejected_id}"
                    )));
                }
                let session_id = tlvs
                    .get(&(MeshCopType::CommissionerSessionId as u8))
                    .ok_or_else(|| CommissionerError::bad_format("COMM_PET.rsp missing CommissionerSessionId TLV"))?
                    .value_as_u16()?;
                inner.session_id = Some(session_id);
                inner.state = State::Active;
                Ok(())
            },
            Err(e) => {
                inner.state = State::Connected;
                Err(e)
            },
        }
    }

    /// Sends a resigning keep-alive and transitions `Active -> Disabled`.
    pub async fn resign(&self) -> Result<()> {
        {
            let inner = self.inner.lock().await;
            if inner.state != State::Active {
                return Err(CommissionerError::invalid_state("resign requires Active"));
            }
        }
        self.keep_alive_cancel.cancel();
        let _ = self.send_keep_alive(false).await;
        let mut inner = self.inner.lock().await;
        inner.state = State::Disabled;
        inner.session_id = None;
        Ok(())
    }

    /// Sends a single keep-alive (`accept` or resigning) to `/c/ca`. The
    /// periodic retrigger is the caller's responsibility (e.g. a
    /// `tokio::time::interval` driven by `self.config.keep_alive_interval`).
    pub async fn send_keep_alive(&self, keep_alive: bool) -> Result<()> {
        let session_id = self.session_id().await.ok_or_else(|| CommissionerError::invalid_state("no active session"))?;

        let mut payload = Vec::new();
        Tlv::new(Scope::MeshCop, MeshCopType::State as u8, vec![if keep_alive { STATE_ACCEPT } else { 0 }])
            .serialize(&mut payload);
        Tlv::new(Scope::MeshCop, MeshCopType::CommissionerSessionId as u8, session_id.to_be_bytes().to_vec())
            .serialize(&mut payload);
        // Keep-alive is the one request the original never attaches a fresh
        // COM_TOK to (`commissioner_impl.cpp`'s `SendKeepAlive`): it only
        // signs, since the token was already carried by the petition.
        self.sign_ccm_request(&mut payload, false)?;

        let request = Message::new(MessageType::Confirmable, Code::POST, 0, Vec::new()).with_path(uris::KEEP_ALIVE).with_payload(payload);
        let response = self.engine.request(request).await?;

        let tlvs = get_tlv_set(Scope::MeshCop, &response.payload)?;
        let state = tlvs.get(&(MeshCopType::State as u8)).map(|t| t.value_as_u8()).transpose()?.unwrap_or(0);
        if state != STATE_ACCEPT {
            let mut inner = self.inner.lock().await;
            inner.state = State::Disabled;
            inner.session_id = None;
            return Err(CommissionerError::rejected("keep-alive rejected by border agent"));
        }
        Ok(())
    }

    /// Requires `Active` for set operations, `Active` or `Connected` for
    /// get. Shared by every dataset get/set below.
    async fn require_active(&self) -> Result<()> {
        let inner = self.inner.lock().await;
        if inner.state != State::Active {
            return Err(CommissionerError::invalid_state("operation requires Active"));
        }
        Ok(())
    }

    async fn require_active_or_connected(&self) -> Result<()> {
        let inner = self.inner.lock().await;
        if !inner.state.is_active_or_connected() {
            return Err(CommissionerError::invalid_state("operation requires Connected or Active"));
        }
        Ok(())
    }

    pub async fn get_active_dataset(&self) -> Result<ActiveDataset> {
        self.require_active_or_connected().await?;
        let mut payload = Vec::new();
        self.sign_ccm_request(&mut payload, true)?;
        let request = Message::new(MessageType::Confirmable, Code::GET, 0, Vec::new())
            .with_path(uris::MGMT_ACTIVE_GET)
            .with_payload(payload);
        let response = self.engine.request(request).await?;
        let dataset = ActiveDataset::decode(&response.payload)?;
        let mut inner = self.inner.lock().await;
        ActiveDataset::merge(&mut inner.active, &dataset);
        Ok(inner.active.clone())
    }

    pub async fn set_active_dataset(&self, dataset: &ActiveDataset) -> Result<()> {
        self.require_active().await?;
        dataset.validate_for_write()?;
        let mut payload = dataset.encode();
        self.sign_ccm_request(&mut payload, true)?;
        let request = Message::new(MessageType::Confirmable, Code::POST, 0, Vec::new())
            .with_path(uris::MGMT_ACTIVE_SET)
            .with_payload(payload);
        let response = self.engine.request(request).await?;
        check_state_tlv(&response.payload)
    }

    pub async fn get_pending_dataset(&self) -> Result<PendingDataset> {
        self.require_active_or_connected().await?;
        let mut payload = Vec::new();
        self.sign_ccm_request(&mut payload, true)?;
        let request = Message::new(MessageType::Confirmable, Code::GET, 0, Vec::new())
            .with_path(uris::MGMT_PENDING_GET)
            .with_payload(payload);
        let response = self.engine.request(request).await?;
        let dataset = PendingDataset::decode(&response.payload)?;
        let mut inner = self.inner.lock().await;
        PendingDataset::merge(&mut inner.pending, &dataset);
        Ok(inner.pending.clone())
    }

    pub async fn set_pending_dataset(&self, dataset: &PendingDataset) -> Result<()> {
        self.require_active().await?;
        dataset.validate_for_write()?;
        let mut payload = dataset.encode();
        self.sign_ccm_request(&mut payload, true)?;
        let request = Message::new(MessageType::Confirmable, Code::POST, 0, Vec::new())
            .with_path(uris::MGMT_PENDING_SET)
            .with_payload(payload);
        let response = self.engine.request(request).await?;
        check_state_tlv(&response.payload)
    }

    pub async fn get_commissioner_dataset(&self) -> Result<CommissionerDataset> {
        self.require_active_or_connected().await?;
        let mut payload = Vec::new();
        self.sign_ccm_request(&mut payload, true)?;
        let request = Message::new(MessageType::Confirmable, Code::GET, 0, Vec::new())
            .with_path(uris::MGMT_COMMISSIONER_GET)
            .with_payload(payload);
        let response = self.engine.request(request).await?;
        let dataset = CommissionerDataset::decode(&response.payload)?;
        let mut inner = self.inner.lock().await;
        CommissionerDataset::merge(&mut inner.commissioner, &dataset);
        Ok(inner.commissioner.clone())
    }

    /// Strips `SessionId`/`BorderAgentLocator` (read-only) before sending.
    pub async fn set_commissioner_dataset(&self, dataset: &CommissionerDataset) -> Result<()> {
        self.require_active().await?;
        let mut payload = dataset.strip_read_only_for_write().encode();
        self.sign_ccm_request(&mut payload, true)?;
        let request = Message::new(MessageType::Confirmable, Code::POST, 0, Vec::new())
            .with_path(uris::MGMT_COMMISSIONER_SET)
            .with_payload(payload);
        let response = self.engine.request(request).await?;
        check_state_tlv(&response.payload)
    }

    pub async fn get_bbr_dataset(&self) -> Result<BbrDataset> {
        self.require_active_or_connected().await?;
        let mut payload = Vec::new();
        self.sign_ccm_request(&mut payload, true)?;
        let request = Message::new(MessageType::Confirmable, Code::GET, 0, Vec::new())
            .with_path(uris::MGMT_BBR_GET)
            .with_payload(payload);
        let response = self.engine.request(request).await?;
        let dataset = BbrDataset::decode(&response.payload)?;
        let mut inner = self.inner.lock().await;
        BbrDataset::merge(&mut inner.bbr, &dataset);
        Ok(inner.bbr.clone())
    }

    pub async fn set_bbr_dataset(&self, dataset: &BbrDataset) -> Result<()> {
        self.require_active().await?;
        dataset.validate_for_write()?;
        let mut payload = dataset.encode();
        self.sign_ccm_request(&mut payload, true)?;
        let request = Message::new(MessageType::Confirmable, Code::POST, 0, Vec::new())
            .with_path(uris::MGMT_BBR_SET)
            .with_payload(payload);
        let response = self.engine.request(request).await?;
        check_state_tlv(&response.payload)
    }

    /// Unicast is sent confirmable and awaits the response; multicast is
    /// sent non-confirmable with no reply expected (matches the ANNCE/
    /// PAN-ID-query/energy-scan semantics: they fan out to an entire
    /// Thread partition, which never ACKs at the CoAP layer).
    pub async fn announce_begin(&self, channel_mask: u32, count: u8, period: u16, is_multicast: bool) -> Result<()> {
        self.require_active().await?;
        let mut payload = Vec::new();
        Tlv::new(Scope::MeshCop, MeshCopType::ChannelMask as u8, channel_mask.to_be_bytes().to_vec()).serialize(&mut payload);
        payload.extend_from_slice(&[count]);
        payload.extend_from_slice(&period.to_be_bytes());
        self.send_management_command(uris::ANNOUNCE_BEGIN, payload, is_multicast).await
    }

    pub async fn pan_id_query(&self, channel_mask: u32, pan_id: u16, is_multicast: bool) -> Result<()> {
        self.require_active().await?;
        let mut payload = Vec::new();
        Tlv::new(Scope::MeshCop, MeshCopType::ChannelMask as u8, channel_mask.to_be_bytes().to_vec()).serialize(&mut payload);
        Tlv::new(Scope::MeshCop, MeshCopType::PanId as u8, pan_id.to_be_bytes().to_vec()).serialize(&mut payload);
        self.send_management_command(uris::PAN_ID_QUERY, payload, is_multicast).await
    }

    pub async fn energy_scan(&self, channel_mask: u32, count: u8, period: u16, scan_duration: u16, is_multicast: bool) -> Result<()> {
        self.require_active().await?;
        let mut payload = Vec::new();
        Tlv::new(Scope::MeshCop, MeshCopType::ChannelMask as u8, channel_mask.to_be_bytes().to_vec()).serialize(&mut payload);
        payload.extend_from_slice(&[count]);
        payload.extend_from_slice(&period.to_be_bytes());
        payload.extend_from_slice(&scan_duration.to_be_bytes());
        self.send_management_command(uris::ENERGY_SCAN, payload, is_multicast).await
    }

    async fn send_management_command(&self, path: &str, mut payload: Vec<u8>, is_multicast: bool) -> Result<()> {
        self.sign_ccm_request(&mut payload, true)?;
        let msg_type = if is_multicast { MessageType::NonConfirmable } else { MessageType::Confirmable };
        let request = Message::new(msg_type, Code::POST, 0, Vec::new()).with_path(path).with_payload(payload);
        if is_multicast {
            // fire-and-forget: no response handler awaits a reply for a
            // multicast-destined request.
            let _ = self.engine.request(request).await;
            Ok(())
        } else {
            let response = self.engine.request(request).await?;
            check_state_tlv(&response.payload)
        }
    }

    /// Registers with the primary BBR anycast locator. CCM-only.
    pub async fn register_multicast_listener(&self, multicast_addrs: &[String], timeout_secs: u32) -> Result<u8> {
        self.require_active().await?;
        if !self.config.enable_ccm {
            return Err(CommissionerError::invalid_state("RegisterMulticastListener requires CCM mode"));
        }
        let mut payload = Vec::new();
        for addr in multicast_addrs {
            Tlv::new(Scope::MeshCop, MeshCopType::Ipv6Address as u8, addr.clone().into_bytes()).serialize(&mut payload);
        }
        payload.extend_from_slice(&timeout_secs.to_be_bytes());
        self.sign_ccm_request(&mut payload, true)?;
        let request = Message::new(MessageType::Confirmable, Code::POST, 0, Vec::new())
            .with_path(uris::MULTICAST_LISTENER_REGISTRATION)
            .with_payload(payload);
        let response = self.engine.request(request).await?;
        let tlvs = get_tlv_set(Scope::MeshCop, &response.payload)?;
        tlvs.get(&(MeshCopType::State as u8)).ok_or_else(|| CommissionerError::bad_format("MLR.rsp missing State TLV"))?.value_as_u8()
    }

    async fn require_ccm(&self) -> Result<()> {
        self.require_active().await?;
        if !self.config.enable_ccm {
            return Err(CommissionerError::invalid_state("this command requires CCM mode"));
        }
        Ok(())
    }

    pub async fn command_reenroll(&self, dst_addr: &str) -> Result<()> {
        self.require_ccm().await?;
        self.send_unicast_ccm_command(uris::MGMT_REENROLL, dst_addr, Vec::new()).await
    }

    pub async fn command_domain_reset(&self, dst_addr: &str) -> Result<()> {
        self.require_ccm().await?;
        self.send_unicast_ccm_command(uris::MGMT_DOMAIN_RESET, dst_addr, Vec::new()).await
    }

    /// NET_MIGRATE carries the target network name.
    pub async fn command_migrate(&self, dst_addr: &str, dst_network_name: &str) -> Result<()> {
        self.require_ccm().await?;
        let mut payload = Vec::new();
        Tlv::new(Scope::MeshCop, MeshCopType::NetworkName as u8, dst_network_name.as_bytes().to_vec()).serialize(&mut payload);
        self.send_unicast_ccm_command(uris::MGMT_NET_MIGRATE, dst_addr, payload).await
    }

    /// Routes a CCM unicast command through the UDP proxy to the mesh-interior
    /// node at `dst_addr`, mirroring `CommissionerImpl::SendProxyMessage`: a
    /// fresh inner CoAP engine handles this single request's own reliability,
    /// tunnelled over the outer border-agent session via `UDP_TX.ntf`/
    /// `UDP_RX.ntf`.
    async fn send_unicast_ccm_command(&self, path: &str, dst_addr: &str, mut payload: Vec<u8>) -> Result<()> {
        let session_id = self.session_id().await.ok_or_else(|| CommissionerError::invalid_state("no active session"))?;
        Tlv::new(Scope::MeshCop, MeshCopType::CommissionerSessionId as u8, session_id.to_be_bytes().to_vec())
            .serialize(&mut payload);
        self.sign_ccm_request(&mut payload, true)?;

        let dst_addr = Address::parse(dst_addr)?;
        let proxy_transport =
            Arc::new(ProxyTransport::new(Arc::clone(&self.engine), dst_addr.clone(), DEFAULT_MM_PORT));
        let proxy_engine = Arc::new(CoapEngine::new(proxy_transport));
        register_udp_rx(&self.engine, Arc::clone(&proxy_engine), dst_addr);

        let request = Message::new(MessageType::Confirmable, Code::POST, 0, Vec::new()).with_path(path).with_payload(payload);
        let response = proxy_engine.request(request).await?;
        check_state_tlv(&response.payload)
    }

    /// CCM request signing (spec §4.1 "CCM mode"): appends `CommissionerToken`
    /// (only when `append_token`, and only once credentials allow it — the
    /// original's `SignRequest` is unconditional on CCM mode, matching
    /// `CommissionerImpl::SignRequest` / `commissioner_impl.cpp:1423`) and
    /// always appends `CommissionerSignature` over the payload built so far.
    /// A no-op outside CCM mode.
    fn sign_ccm_request(&self, payload: &mut Vec<u8>, append_token: bool) -> Result<()> {
        if !self.config.enable_ccm {
            return Ok(());
        }
        let private_key = self
            .config
            .private_key
            .as_ref()
            .ok_or_else(|| CommissionerError::invalid_state("CCM mode requires a configured private key"))?;

        let mut pk = Pk::from_private_key(private_key, None)
            .map_err(|e| CommissionerError::security(format!("invalid CCM private key: {e}")))?;
        let entropy = Arc::new(OsEntropy::new());
        let mut rng = CtrDrbg::new(entropy, None)
            .map_err(|e| CommissionerError::security(format!("CCM signing RNG init failed: {e}")))?;

        let digest = Sha256::digest(payload.as_slice());
        let mut signature = vec![0u8; 256];
        let sig_len = pk
            .sign(MdType::Sha256, &digest, &mut signature, &mut rng)
            .map_err(|e| CommissionerError::security(format!("failed to sign CCM request: {e}")))?;
        signature.truncate(sig_len);

        if append_token {
            let token = self.config.commissioner_token.as_ref().ok_or_else(|| {
                CommissionerError::invalid_state("CCM mode requires a COM_TOK before signing the first request")
            })?;
            Tlv::new(Scope::MeshCop, MeshCopType::CommissionerToken as u8, token.clone()).serialize(payload);
        }
        Tlv::new(Scope::MeshCop, MeshCopType::CommissionerSignature as u8, signature).serialize(payload);
        Ok(())
    }

    pub fn cancel_requests(&self) {
        self.engine.cancel_requests();
    }
}

fn check_state_tlv(payload: &[u8]) -> Result<()> {
    let tlvs = get_tlv_set(Scope::MeshCop, payload)?;
    let state =
        tlvs.get(&(MeshCopType::State as u8)).ok_or_else(|| CommissionerError::bad_format("response missing State TLV"))?.value_as_u8()?;
    if state != STATE_ACCEPT {
        return Err(CommissionerError::rejected("request rejected by border agent"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{sync::atomic::AtomicUsize, time::Duration};

    use super::*;

    struct NullTransport;

    impl DatagramTransport for NullTransport {
        async fn send_datagram(&self, _bytes: &[u8]) -> Result<()> {
            Ok(())
        }
    }

    fn base_config() -> CommissionerConfig {
        CommissionerConfig {
            id: "TestComm".into(),
            enable_ccm: false,
            domain_name: String::new(),
            keep_alive_interval: Duration::from_secs(40),
            max_connection_num: 16,
            pskc: Some(vec![0u8; 16]),
            private_key: None,
            certificate: None,
            trust_anchor: None,
            commissioner_token: None,
            proxy_mode: false,
            enable_dtls_debug_logging: false,
        }
    }

    fn machine() -> CommissionerStateMachine<NullTransport> {
        let engine = Arc::new(CoapEngine::new(Arc::new(NullTransport)));
        CommissionerStateMachine::new(base_config(), engine)
    }

    #[tokio::test]
    async fn starts_disabled() {
        assert_eq!(machine().state().await, State::Disabled);
    }

    #[tokio::test]
    async fn petition_requires_connected() {
        let m = machine();
        assert!(m.petition().await.is_err());
        assert_eq!(m.state().await, State::Disabled);
    }

    #[tokio::test]
    async fn mark_connected_then_resign_requires_active() {
        let m = machine();
        m.mark_connected().await.expect("connects from Disabled");
        assert_eq!(m.state().await, State::Connected);
        assert!(m.resign().await.is_err());
    }

    #[tokio::test]
    async fn set_active_dataset_requires_active() {
        let m = machine();
        let dataset = ActiveDataset { present_flags: ActiveFlags::ACTIVE_TIMESTAMP, ..Default::default() };
        assert!(m.set_active_dataset(&dataset).await.is_err());
    }

    #[tokio::test]
    async fn register_multicast_listener_requires_ccm() {
        let m = machine();
        m.mark_connected().await.expect("connects");
        let result = m.register_multicast_listener(&["ff04::1".to_string()], 300).await;
        assert!(result.is_err());
        let _ = AtomicUsize::new(0);
    }

    #[tokio::test]
    async fn command_reenroll_requires_ccm() {
        let m = machine();
        m.mark_connected().await.expect("connects");
        assert!(m.command_reenroll("fd00::1").await.is_err());
    }

    #[test]
    fn ccm_signing_is_a_no_op_outside_ccm_mode() {
        let m = machine();
        let mut payload = vec![1, 2, 3];
        m.sign_ccm_request(&mut payload, true).expect("non-CCM mode never signs");
        assert_eq!(payload, vec![1, 2, 3]);
    }

    #[test]
    fn ccm_mode_requires_a_private_key_before_signing() {
        let mut config = base_config();
        config.enable_ccm = true;
        config.domain_name = "TestDomain".into();
        config.pskc = None;
        let engine = Arc::new(CoapEngine::new(Arc::new(NullTransport)));
        let m = CommissionerStateMachine::new(config, engine);
        let mut payload = Vec::new();
        let err = m.sign_ccm_request(&mut payload, true).expect_err("no private key configured");
        assert!(!err.is_cancelled());
    }
}
