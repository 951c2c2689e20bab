// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Fetching and caching the active operational dataset through the state
//! machine, exercising the dataset TLV codec and merge semantics together
//! rather than in isolation.

use std::{sync::Arc, time::Duration};

use thread_commissioner::{
    cfg::config::CommissionerConfig,
    coap::{
        engine::{CoapEngine, DatagramTransport},
        message::{Code, Message, MessageType},
    },
    commissioner::{state_machine::CommissionerStateMachine, uris},
    error::Result,
    tlv::dataset::{ActiveDataset, ActiveFlags},
};
use tokio::sync::mpsc;

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

#[tokio::test]
async fn get_active_dataset_merges_into_the_cached_copy() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let engine = Arc::new(CoapEngine::new(Arc::new(CapturingTransport { tx })));
    let machine = Arc::new(CommissionerStateMachine::new(base_config(), engine.clone()));
    machine.mark_connected().await.expect("connects");

    let remote = ActiveDataset {
        present_flags: ActiveFlags::CHANNEL | ActiveFlags::PAN_ID | ActiveFlags::NETWORK_NAME,
        channel: 15,
        pan_id: 0x1234,
        network_name: "OpenThread".into(),
        ..Default::default()
    };

    let m = machine.clone();
    let fetch = tokio::spawn(async move { m.get_active_dataset().await });
    let sent = rx.recv().await.expect("GET request sent");
    let request = Message::decode(&sent).expect("valid MGMT_ACTIVE_GET.req");
    assert_eq!(request.path(), uris::MGMT_ACTIVE_GET);
    let response = Message::new(MessageType::Acknowledgement, Code::CONTENT, request.message_id, request.token.clone())
        .with_payload(remote.encode());
    engine.handle_incoming(response);

    let fetched = fetch.await.expect("task completes").expect("fetch succeeds");
    assert_eq!(fetched.channel, 15);
    assert_eq!(fetched.pan_id, 0x1234);
    assert_eq!(fetched.network_name, "OpenThread");
    assert!(fetched.present_flags.contains(ActiveFlags::CHANNEL | ActiveFlags::PAN_ID | ActiveFlags::NETWORK_NAME));

    // A second, partial fetch must merge into (not replace) the cached fields.
    let extended_pan_id = ActiveDataset {
        present_flags: ActiveFlags::EXTENDED_PAN_ID,
        extended_pan_id: [0xAA; 8],
        ..Default::default()
    };
    let m2 = machine.clone();
    let fetch2 = tokio::spawn(async move { m2.get_active_dataset().await });
    let sent = rx.recv().await.expect("second GET request sent");
    let request = Message::decode(&sent).expect("valid MGMT_ACTIVE_GET.req");
    let response = Message::new(MessageType::Acknowledgement, Code::CONTENT, request.message_id, request.token.clone())
        .with_payload(extended_pan_id.encode());
    engine.handle_incoming(response);

    let merged = fetch2.await.expect("task completes").expect("fetch succeeds");
    assert_eq!(merged.channel, 15, "earlier channel must survive the merge");
    assert_eq!(merged.pan_id, 0x1234, "earlier pan id must survive the merge");
    assert_eq!(merged.extended_pan_id, [0xAA; 8]);
}

#[tokio::test]
async fn set_active_dataset_rejects_incomplete_mandatory_fields() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let engine = Arc::new(CoapEngine::new(Arc::new(CapturingTransport { tx })));
    let machine = CommissionerStateMachine::new(base_config(), engine);
    machine.mark_connected().await.expect("connects");

    // set_active_dataset requires Active, not merely Connected.
    let dataset = ActiveDataset { present_flags: ActiveFlags::ACTIVE_TIMESTAMP, ..Default::default() };
    let err = machine.set_active_dataset(&dataset).await.expect_err("Connected is not enough to write");
    assert!(err.to_string().contains("Active"));
}
