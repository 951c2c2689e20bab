// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::{Context, Result};
use thread_commissioner::{
    cfg::{cli::resolve_config_path, config::CommissionerConfig, logger::init_logger},
    coap::engine::{CoapEngine, DatagramTransport},
    commissioner::state_machine::CommissionerStateMachine,
    error::CommissionerError,
};
use tokio::net::UdpSocket;
use tracing::info;

/// Plain connected-UDP transport, used before a DTLS session is negotiated
/// or when probing a border agent that only exposes unencrypted CoAP
/// (non-production setups).
struct UdpTransport {
    socket: UdpSocket,
}

impl DatagramTransport for UdpTransport {
    async fn send_datagram(&self, bytes: &[u8]) -> thread_commissioner::error::Result<()> {
        self.socket.send(bytes).await.map_err(|e| CommissionerError::unknown(format!("UDP send failed: {e}")))?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = init_logger("tests/config_logger.yaml").context("failed to init logger")?;

    let cfg_path =
        resolve_config_path("commissioner.yaml").context("failed to resolve commissioner config path")?;
    let cfg = CommissionerConfig::load_from_file(cfg_path).context("failed to load commissioner config")?;

    let socket = UdpSocket::bind("0.0.0.0:0").await.context("failed to bind probe UDP socket")?;
    socket.connect("127.0.0.1:61631").await.context("failed to target border agent")?;
    let transport = Arc::new(UdpTransport { socket });

    let engine = Arc::new(CoapEngine::new(transport));
    let machine = CommissionerStateMachine::new(cfg, engine);

    machine.mark_connected().await.context("connect")?;
    info!(state = ?machine.state().await, "connected to border agent");

    match machine.petition().await {
        Ok(()) => info!(session_id = ?machine.session_id().await, "petitioned successfully"),
        Err(e) => info!(error = %e, "petition failed"),
    }

    Ok(())
}
