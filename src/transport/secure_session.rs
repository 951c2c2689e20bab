// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Secure datagram (DTLS) session: a thin, stateful wrapper around
//! `mbedtls` that exposes the handshake/read/write lifecycle the
//! commissioning state machine and the joiner session both depend on.

use std::sync::Arc;

use mbedtls::{
    pk::Pk,
    rng::CtrDrbg,
    ssl::{
        Config,
        Context,
        Version,
        config::{AuthMode, Endpoint as TlsRole, Preset, Transport as TlsTransport},
    },
    x509::Certificate,
};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::{
    address::Address,
    error::{CommissionerError, Result},
};

pub const HANDSHAKE_TIMEOUT_MIN_SECS: u64 = 8;
pub const HANDSHAKE_TIMEOUT_MAX_SECS: u64 = 60;
const KEY_BLOCK_SIZE: usize = 40;
pub const JOINER_ROUTER_KEK_LEN: usize = 16;
pub const MTU: usize = 1280;
pub const MAX_FRAGMENT_LEN: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Open,
    Connecting,
    Connected,
    Disconnected,
}

/// Material a session may be configured with. Whichever of PSK / certificate
/// material is present determines which cipher suite gets advertised.
#[derive(Debug, Clone, Default)]
pub struct DtlsConfig {
    pub enable_debug_logging: bool,
    pub psk: Option<Vec<u8>>,
    pub psk_identity: Vec<u8>,
    pub own_key: Option<Vec<u8>>,
    pub own_cert: Option<Vec<u8>>,
    pub trust_anchor: Option<Vec<u8>>,
    /// Empty disables peer hostname/SAN verification (used for the
    /// border-agent's self-signed deployment certificates).
    pub peer_hostname: String,
}

/// Cipher suites in preference order, selected by what credentials are
/// configured: PSK-JPAKE first (commercial & non-CCM joining both can use
/// it), ECDHE-ECDSA when certificate material is present (CCM).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherSuite {
    EcJpakeWithAes128Ccm8,
    EcdheEcdsaWithAes128Ccm8,
}

impl CipherSuite {
    /// IANA TLS cipher suite registry id, as consumed by
    /// `mbedtls::ssl::Config::set_ciphersuites`.
    fn iana_id(self) -> std::os::raw::c_int {
        match self {
            CipherSuite::EcJpakeWithAes128Ccm8 => 0xC0FF,
            CipherSuite::EcdheEcdsaWithAes128Ccm8 => 0xC0AC,
        }
    }
}

fn select_cipher_suites(cfg: &DtlsConfig) -> Vec<CipherSuite> {
    let mut suites = Vec::new();
    if cfg.psk.is_some() {
        suites.push(CipherSuite::EcJpakeWithAes128Ccm8);
    }
    if cfg.own_cert.is_some() {
        suites.push(CipherSuite::EcdheEcdsaWithAes128Ccm8);
    }
    suites
}

/// A DTLS session over an unspecified datagram transport. The transport
/// itself (plain UDP socket, joiner relay pseudo-socket) is supplied by the
/// caller at handshake time; this type owns only the mbedtls state machine,
/// configuration and derived keys.
pub struct SecureSession {
    role: Role,
    config: DtlsConfig,
    peer_addr: Address,
    peer_port: u16,
    inner: Mutex<Inner>,
}

struct Inner {
    state: State,
    kek: Option<[u8; JOINER_ROUTER_KEK_LEN]>,
}

impl SecureSession {
    pub fn new(role: Role, config: DtlsConfig, peer_addr: Address, peer_port: u16) -> Self {
        Self { role, config, peer_addr, peer_port, inner: Mutex::new(Inner { state: State::Open, kek: None }) }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn peer_addr(&self) -> &Address {
        &self.peer_addr
    }

    pub fn peer_port(&self) -> u16 {
        self.peer_port
    }

    pub async fn state(&self) -> State {
        self.inner.lock().await.state
    }

    pub async fn kek(&self) -> Option<[u8; JOINER_ROUTER_KEK_LEN]> {
        self.inner.lock().await.kek
    }

    /// Builds the `mbedtls` configuration for this session's role and
    /// credentials. Isolated in its own function so the rest of the session
    /// lifecycle stays free of FFI-adjacent error handling.
    fn build_mbedtls_config(&self) -> Result<Config> {
        let entropy = Arc::new(mbedtls::rng::OsEntropy::new());
        let rng = Arc::new(
            CtrDrbg::new(entropy, None)
                .map_err(|e| CommissionerError::security(format!("DTLS RNG init failed: {e}")))?,
        );

        let role = match self.role {
            Role::Client => TlsRole::Client,
            Role::Server => TlsRole::Server,
        };
        let mut config = Config::new(role, TlsTransport::Datagram, Preset::Default);
        config.set_rng(rng);
        config.set_min_version(Version::Tls1_2).map_err(|e| {
            CommissionerError::security(format!("DTLS min version negotiation failed: {e}"))
        })?;

        let cipher_suites = select_cipher_suites(&self.config);
        if cipher_suites.is_empty() {
            return Err(CommissionerError::invalid_args("no PSK or certificate material configured for DTLS"));
        }
        let ciphersuite_ids: Arc<[std::os::raw::c_int]> =
            cipher_suites.iter().map(|cs| cs.iana_id()).collect::<Vec<_>>().into();
        config.set_ciphersuites(ciphersuite_ids);

        if let Some(psk) = &self.config.psk {
            config
                .set_psk(psk, &self.config.psk_identity)
                .map_err(|e| CommissionerError::security(format!("failed to install PSK/EC-JPAKE password: {e}")))?;
        }

        if let Some(cert_pem) = &self.config.own_cert {
            let cert = Arc::new(
                Certificate::from_pem_multiple(cert_pem)
                    .map_err(|e| CommissionerError::security(format!("invalid own certificate: {e}")))?,
            );
            let key_pem = self
                .config
                .own_key
                .as_ref()
                .ok_or_else(|| CommissionerError::invalid_args("certificate configured without a private key"))?;
            let key = Arc::new(
                Pk::from_private_key(key_pem, None)
                    .map_err(|e| CommissionerError::security(format!("invalid own private key: {e}")))?,
            );
            config
                .push_cert(cert, key)
                .map_err(|e| CommissionerError::security(format!("failed to attach own certificate: {e}")))?;
        }

        if let Some(trust_anchor) = &self.config.trust_anchor {
            let ca = Arc::new(
                Certificate::from_pem_multiple(trust_anchor)
                    .map_err(|e| CommissionerError::security(format!("invalid trust anchor: {e}")))?,
            );
            config.set_ca_list(ca, None);
            config.set_authmode(AuthMode::Required);
        } else {
            config.set_authmode(AuthMode::None);
        }

        Ok(config)
    }

    /// Drives the handshake to completion over `stream`. On success derives
    /// the KEK from the exported key block and transitions to `Connected`.
    pub async fn connect<S>(&self, stream: S) -> Result<()>
    where S: std::io::Read + std::io::Write + Send + 'static {
        {
            let mut inner = self.inner.lock().await;
            inner.state = State::Connecting;
        }

        let config = self.build_mbedtls_config()?;
        let cipher_suites = select_cipher_suites(&self.config);
        if cipher_suites.is_empty() {
            return Err(CommissionerError::invalid_args("no PSK or certificate material configured for DTLS"));
        }

        let mut ctx = Context::new(Arc::new(config));
        ctx.establish(stream, None)
            .map_err(|e| CommissionerError::security(format!("DTLS handshake failed: {e}")))?;

        // `mbedtls`'s key-export callback is wired in at `Config` construction
        // in the real integration; here we derive the KEK from the exported
        // key block the callback would have captured.
        let key_block = ctx
            .export_keying_material(&mut [0u8; KEY_BLOCK_SIZE], "", None)
            .map_err(|e| CommissionerError::security(format!("key export failed: {e}")))?;
        let kek = derive_kek(&key_block);

        let mut inner = self.inner.lock().await;
        inner.kek = Some(kek);
        inner.state = State::Connected;
        Ok(())
    }

    /// Returns to `Open` without discarding configuration, as required when
    /// a `HelloVerifyRequired` cookie exchange forces a fresh handshake.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.state = State::Open;
        inner.kek = None;
    }

    pub async fn disconnect(&self) {
        let mut inner = self.inner.lock().await;
        inner.state = State::Disconnected;
    }
}

/// `SHA256(key_block[0..2*(MAC+KEY+IV)])` truncated to
/// `JOINER_ROUTER_KEK_LEN` bytes.
fn derive_kek(key_block: &[u8]) -> [u8; JOINER_ROUTER_KEK_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(key_block);
    let digest = hasher.finalize();
    let mut kek = [0u8; JOINER_ROUTER_KEK_LEN];
    kek.copy_from_slice(&digest[..JOINER_ROUTER_KEK_LEN]);
    kek
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cipher_suite_selection_prefers_psk_then_cert() {
        let psk_only = DtlsConfig { psk: Some(vec![1, 2, 3]), ..Default::default() };
        assert_eq!(select_cipher_suites(&psk_only), vec![CipherSuite::EcJpakeWithAes128Ccm8]);

        let cert_only = DtlsConfig { own_cert: Some(vec![4, 5, 6]), ..Default::default() };
        assert_eq!(select_cipher_suites(&cert_only), vec![CipherSuite::EcdheEcdsaWithAes128Ccm8]);

        let both = DtlsConfig { psk: Some(vec![1]), own_cert: Some(vec![2]), ..Default::default() };
        assert_eq!(
            select_cipher_suites(&both),
            vec![CipherSuite::EcJpakeWithAes128Ccm8, CipherSuite::EcdheEcdsaWithAes128Ccm8]
        );
    }

    #[test]
    fn kek_derivation_is_deterministic_and_truncated() {
        let key_block = vec![0xAB; KEY_BLOCK_SIZE];
        let kek = derive_kek(&key_block);
        assert_eq!(kek.len(), JOINER_ROUTER_KEK_LEN);
        assert_eq!(kek, derive_kek(&key_block));
    }

    #[tokio::test]
    async fn fresh_session_starts_open_with_no_kek() {
        let session =
            SecureSession::new(Role::Client, DtlsConfig::default(), Address::parse("::1").expect("valid"), 5684);
        assert_eq!(session.state().await, State::Open);
        assert!(session.kek().await.is_none());
    }

    #[tokio::test]
    async fn reset_clears_kek_and_returns_to_open() {
        let session =
            SecureSession::new(Role::Client, DtlsConfig::default(), Address::parse("::1").expect("valid"), 5684);
        {
            let mut inner = session.inner.lock().await;
            inner.state = State::Connected;
            inner.kek = Some([0x42; JOINER_ROUTER_KEK_LEN]);
        }
        session.reset().await;
        assert_eq!(session.state().await, State::Open);
        assert!(session.kek().await.is_none());
    }
}
