// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! End-to-end petition/keep-alive/resign flow against a loopback transport
//! that plays the part of a border agent.

use std::{sync::Arc, time::Duration};

use thread_commissioner::{
    cfg::config::CommissionerConfig,
    coap::{
        engine::{CoapEngine, DatagramTransport},
        message::{Code, Message, MessageType},
    },
    commissioner::{state_machine::{CommissionerStateMachine, State}, uris},
    error::Result,
    tlv::codec::{MeshCopType, Scope, Tlv},
};
use tokio::sync::mpsc;

/// Captures every datagram sent by the engine onto an unbounded channel so
/// the test can play border-agent responder without a real socket.
struct CapturingTransport {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl DatagramTransport for CapturingTransport {
    async fn send_datagram(&self, bytes: &[u8]) -> Result<()> {
        let _ = self.tx.send(bytes.to_vec());
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

fn state_tlv_payload(accept: bool, session_id: u16) -> Vec<u8> {
    let mut payload = Vec::new();
    Tlv::new(Scope::MeshCop, MeshCopType::State as u8, vec![if accept { 1 } else { 0 }]).serialize(&mut payload);
    Tlv::new(Scope::MeshCop, MeshCopType::CommissionerSessionId as u8, session_id.to_be_bytes().to_vec())
        .serialize(&mut payload);
    payload
}

#[tokio::test]
async fn petition_accept_then_keep_alive_then_resign() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let engine = Arc::new(CoapEngine::new(Arc::new(CapturingTransport { tx })));
    let machine = Arc::new(CommissionerStateMachine::new(base_config(), engine.clone()));

    machine.mark_connected().await.expect("connects from Disabled");
    assert_eq!(machine.state().await, State::Connected);

    let m = machine.clone();
    let petition = tokio::spawn(async move { m.petition().await });

    let sent = rx.recv().await.expect("petition request sent");
    let request = Message::decode(&sent).expect("valid COAP_PET.req");
    assert_eq!(request.path(), uris::PETITION);
    let response = Message::new(MessageType::Acknowledgement, Code::CHANGED, request.message_id, request.token.clone())
        .with_payload(state_tlv_payload(true, 0xABCD));
    engine.handle_incoming(response);

    petition.await.expect("task completes").expect("petition accepted");
    assert_eq!(machine.state().await, State::Active);
    assert_eq!(machine.session_id().await, Some(0xABCD));

    let m2 = machine.clone();
    let keep_alive = tokio::spawn(async move { m2.send_keep_alive(true).await });
    let sent = rx.recv().await.expect("keep-alive request sent");
    let request = Message::decode(&sent).expect("valid COMM_KA.req");
    assert_eq!(request.path(), uris::KEEP_ALIVE);
    let response = Message::new(MessageType::Acknowledgement, Code::CHANGED, request.message_id, request.token.clone())
        .with_payload(state_tlv_payload(true, 0xABCD));
    engine.handle_incoming(response);
    keep_alive.await.expect("task completes").expect("keep-alive accepted");

    let m3 = machine.clone();
    let resign = tokio::spawn(async move { m3.resign().await });
    let sent = rx.recv().await.expect("resigning keep-alive sent");
    let request = Message::decode(&sent).expect("valid resigning COMM_KA.req");
    let response = Message::new(MessageType::Acknowledgement, Code::CHANGED, request.message_id, request.token.clone())
        .with_payload(state_tlv_payload(true, 0xABCD));
    engine.handle_incoming(response);
    resign.await.expect("task completes").expect("resign succeeds");

    assert_eq!(machine.state().await, State::Disabled);
    assert_eq!(machine.session_id().await, None);
}

#[tokio::test]
async fn petition_rejected_surfaces_active_commissioner_id_and_returns_to_disabled() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let engine = Arc::new(CoapEngine::new(Arc::new(CapturingTransport { tx })));
    let machine = Arc::new(CommissionerStateMachine::new(base_config(), engine.clone()));
    machine.mark_connected().await.expect("connects");

    let m = machine.clone();
    let petition = tokio::spawn(async move { m.petition().await });

    let sent = rx.recv().await.expect("petition request sent");
    let request = Message::decode(&sent).expect("valid request");

    let mut payload = Vec::new();
    Tlv::new(Scope::MeshCop, MeshCopType::State as u8, vec![0]).serialize(&mut payload);
    Tlv::new(Scope::MeshCop, MeshCopType::CommissionerId as u8, b"OtherCommissioner".to_vec()).serialize(&mut payload);
    let response = Message::new(MessageType::Acknowledgement, Code::CHANGED, request.message_id, request.token.clone())
        .with_payload(payload);
    engine.handle_incoming(response);

    let result = petition.await.expect("task completes");
    let err = result.expect_err("rejected petition is an error");
    assert!(err.to_string().contains("OtherCommissioner"));
    assert_eq!(machine.state().await, State::Disabled);
}

#[tokio::test(start_paused = true)]
async fn petition_timeout_when_border_agent_never_responds() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let engine = Arc::new(CoapEngine::new(Arc::new(CapturingTransport { tx })));
    let machine = Arc::new(CommissionerStateMachine::new(base_config(), engine));
    machine.mark_connected().await.expect("connects");

    let m = machine.clone();
    let petition = tokio::spawn(async move { m.petition().await });
    tokio::time::advance(Duration::from_secs(300)).await;

    let result = petition.await.expect("task completes");
    assert!(result.unwrap_err().is_timeout());
    assert_eq!(machine.state().await, State::Connected);
}
