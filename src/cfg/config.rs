// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::address::ByteArray;

/// Commissioner configuration, as enumerated in the external configuration
/// surface: identity, CCM/non-CCM credentials, timers and debug flags.
///
/// Loaded from YAML by the CLI/config-tooling layer (outside this crate's
/// scope); this struct only validates and normalizes what it is handed.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CommissionerConfig {
    /// Commissioner id, advertised during petitioning. Max 64 bytes.
    #[serde(rename = "Id")]
    pub id: String,

    /// Whether Commercial Commissioning Mode (certificate-based, signed
    /// tokens) is enabled.
    #[serde(rename = "EnableCcm", default)]
    pub enable_ccm: bool,

    /// Required when `enable_ccm` is set. Max 16 bytes.
    #[serde(rename = "DomainName", default)]
    pub domain_name: String,

    /// Keep-alive period; enforced to `[30, 45]` seconds at parse time.
    #[serde(rename = "KeepAliveInterval", with = "serde_secs")]
    pub keep_alive_interval: Duration,

    /// Upper bound on concurrently tracked joiner/proxy sessions.
    #[serde(rename = "MaxConnectionNum")]
    pub max_connection_num: u32,

    /// Non-CCM credential: PSKc used for the EC-JPAKE cipher suite.
    #[serde(rename = "Pskc", default)]
    pub pskc: Option<ByteArray>,

    /// CCM credentials: DER-encoded private key, certificate and trust
    /// anchor used for the ECDHE-ECDSA cipher suite.
    #[serde(rename = "PrivateKey", default)]
    pub private_key: Option<ByteArray>,
    #[serde(rename = "Certificate", default)]
    pub certificate: Option<ByteArray>,
    #[serde(rename = "TrustAnchor", default)]
    pub trust_anchor: Option<ByteArray>,

    /// Optional pre-obtained COM_TOK bound to the commissioner certificate,
    /// used to sign CCM requests.
    #[serde(rename = "CommissionerToken", default)]
    pub commissioner_token: Option<ByteArray>,

    /// When set, joiner sessions forward raw payloads to the user instead of
    /// running DTLS as the commissioner (see joiner-session proxy mode).
    #[serde(rename = "ProxyMode", default)]
    pub proxy_mode: bool,

    #[serde(rename = "EnableDtlsDebugLogging", default)]
    pub enable_dtls_debug_logging: bool,
}

const KEEP_ALIVE_MIN: Duration = Duration::from_secs(30);
const KEEP_ALIVE_MAX: Duration = Duration::from_secs(45);
const ID_MAX_LEN: usize = 64;
const DOMAIN_NAME_MAX_LEN: usize = 16;

impl CommissionerConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: CommissionerConfig =
            serde_yaml::from_str(&s).context("failed to parse commissioner config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants. Keep-alive bounds are enforced here and never
    /// widened (see REDESIGN FLAGS / Open Questions (iii)).
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(!self.id.is_empty(), "Id must not be empty");
        ensure!(self.id.len() <= ID_MAX_LEN, "Id must be <= {ID_MAX_LEN} bytes");

        if self.enable_ccm {
            ensure!(
                !self.domain_name.is_empty(),
                "DomainName is required when EnableCcm is set"
            );
            ensure!(
                self.domain_name.len() <= DOMAIN_NAME_MAX_LEN,
                "DomainName must be <= {DOMAIN_NAME_MAX_LEN} bytes"
            );
            ensure!(
                self.private_key.is_some()
                    && self.certificate.is_some()
                    && self.trust_anchor.is_some(),
                "PrivateKey, Certificate and TrustAnchor are required when EnableCcm is set"
            );
        } else {
            ensure!(self.pskc.is_some(), "Pskc is required when EnableCcm is not set");
        }

        ensure!(
            self.keep_alive_interval >= KEEP_ALIVE_MIN
                && self.keep_alive_interval <= KEEP_ALIVE_MAX,
            "KeepAliveInterval must be within [{}, {}] seconds",
            KEEP_ALIVE_MIN.as_secs(),
            KEEP_ALIVE_MAX.as_secs()
        );

        ensure!(self.max_connection_num >= 1, "MaxConnectionNum must be >= 1");

        Ok(())
    }
}

mod serde_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> CommissionerConfig {
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

    #[test]
    fn keep_alive_bounds_enforced() {
        let mut cfg = base();
        cfg.keep_alive_interval = Duration::from_secs(10);
        assert!(cfg.validate_and_normalize().is_err());

        cfg.keep_alive_interval = Duration::from_secs(60);
        assert!(cfg.validate_and_normalize().is_err());

        cfg.keep_alive_interval = Duration::from_secs(30);
        assert!(cfg.validate_and_normalize().is_ok());
    }

    #[test]
    fn ccm_requires_cert_material() {
        let mut cfg = base();
        cfg.enable_ccm = true;
        cfg.domain_name = "TestDomain".into();
        cfg.pskc = None;
        assert!(cfg.validate_and_normalize().is_err());

        cfg.private_key = Some(vec![1]);
        cfg.certificate = Some(vec![2]);
        cfg.trust_anchor = Some(vec![3]);
        assert!(cfg.validate_and_normalize().is_ok());
    }

    #[test]
    fn non_ccm_requires_pskc() {
        let mut cfg = base();
        cfg.pskc = None;
        assert!(cfg.validate_and_normalize().is_err());
    }
}
