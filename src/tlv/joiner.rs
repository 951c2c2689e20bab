// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Joiner record and the derived values computed from it: `joiner_id` and
//! `PSKc`.

use cmac::Cmac;
use pbkdf2::pbkdf2;
use sha2::{Digest, Sha256};

use crate::error::{CommissionerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinerType {
    MeshCop,
    Ae,
    Nmkp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joiner {
    pub joiner_type: JoinerType,
    pub eui64: u64,
    pub joiner_id: [u8; 8],
    pub pskd: String,
    pub provisioning_url: String,
}

impl Joiner {
    pub fn new(joiner_type: JoinerType, eui64: u64, pskd: String, provisioning_url: String) -> Self {
        Self { joiner_type, eui64, joiner_id: compute_joiner_id(eui64), pskd, provisioning_url }
    }

    /// Whether this joiner session should run as a transparent proxy
    /// instead of performing the EC-JPAKE DTLS handshake itself.
    pub fn is_proxy_mode(&self) -> bool {
        self.pskd.is_empty()
    }
}

/// `SHA256(be64(eui64))[0..8]` with the local/external-address bit
/// (`byte0 |= 0x02`) set.
pub fn compute_joiner_id(eui64: u64) -> [u8; 8] {
    let mut hasher = Sha256::new();
    hasher.update(eui64.to_be_bytes());
    let digest = hasher.finalize();

    let mut id = [0u8; 8];
    id.copy_from_slice(&digest[0..8]);
    id[0] |= 0x02;
    id
}

const PSKC_ITERATIONS: u32 = 16384;
const PSKC_LEN: usize = 16;

/// `PBKDF2-AES-CMAC(pass, "Thread" || xpan || net-name, iter=16384, out=16)`
/// per Thread spec §8.4.1.2.2.
pub fn generate_pskc(passphrase: &str, network_name: &str, xpan: &[u8; 8]) -> Result<[u8; PSKC_LEN]> {
    let mut salt = Vec::with_capacity(6 + 8 + network_name.len());
    salt.extend_from_slice(b"Thread");
    salt.extend_from_slice(xpan);
    salt.extend_from_slice(network_name.as_bytes());

    let mut out = [0u8; PSKC_LEN];
    pbkdf2::<Cmac<aes::Aes128>>(passphrase.as_bytes(), &salt, PSKC_ITERATIONS, &mut out)
        .map_err(|e| CommissionerError::security(format!("PSKc derivation failed: {e}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joiner_id_vector() {
        let id = compute_joiner_id(0x0000_0000_0000_0001);
        assert_eq!(id, [0x7a, 0xff, 0x31, 0x94, 0x15, 0xc7, 0xfb, 0xf4]);
    }

    #[test]
    fn pskc_vector() {
        let xpan: [u8; 8] = [0, 1, 2, 3, 4, 5, 6, 7];
        let pskc = generate_pskc("12SECRETPASSWORD34", "Test Network", &xpan).expect("derives");
        assert_eq!(
            pskc,
            [0xc3, 0xf5, 0x93, 0x68, 0x44, 0x5a, 0x1b, 0x61, 0x06, 0xbe, 0x42, 0x0a, 0x70, 0x6d, 0x4c, 0xc9]
        );
    }

    #[test]
    fn proxy_mode_detected_from_empty_pskd() {
        let joiner = Joiner::new(JoinerType::MeshCop, 1, String::new(), String::new());
        assert!(joiner.is_proxy_mode());
    }
}
