// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! End-to-end UDP-proxy flow: derive an anycast-locator address from a
//! freshly-fetched mesh-local prefix, tunnel a CoAP diagnostic GET to it
//! through `UDP_TX.ntf`, and decode the `UDP_RX.ntf` reply.

use thread_commissioner::{
    coap::message::{Code, Message, MessageType},
    commissioner::uris,
    transport::udp_proxy::UdpProxyClient,
};

#[tokio::test]
async fn tunnels_a_diagnostic_get_through_a_freshly_fetched_prefix() {
    let proxy = UdpProxyClient::new();
    assert_eq!(proxy.mesh_local_prefix().await, None);

    // Simulates the lazy fetch of ActiveDataset::mesh_local_prefix once the
    // commissioner has petitioned: the proxy client doesn't fetch it itself
    // (see DESIGN.md), the caller feeds it in once known.
    let prefix = [0xFD, 0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x00, 0x01];
    proxy.set_mesh_local_prefix(prefix).await.expect("valid ULA prefix");
    assert_eq!(proxy.mesh_local_prefix().await, Some(prefix));

    let leader_aloc: u16 = 0xFC00;
    let leader_addr = UdpProxyClient::anycast_locator_address(&prefix, leader_aloc);
    assert_eq!(leader_addr.to_string(), "fdde:adbe:ef00:1:0:ff:fe00:fc00");

    let request = Message::new(MessageType::Confirmable, Code::GET, 42, vec![7, 7]).with_path(uris::DIAG_GET_QUERY);
    let encoded_request = request.encode();
    let udp_tx = UdpProxyClient::encode_udp_tx(61631, &encoded_request);

    // Border agent hands the opaque payload to the diagnostic target and
    // relays its reply back as UDP_RX.ntf, addressed to our source port.
    let response = Message::new(MessageType::Acknowledgement, Code::CONTENT, 42, vec![7, 7])
        .with_payload(vec![0xAA, 0xBB]);
    let encoded_response = response.encode();
    let mut udp_rx = Vec::with_capacity(4 + encoded_response.len());
    udp_rx.extend_from_slice(&61631u16.to_be_bytes());
    udp_rx.extend_from_slice(&61631u16.to_be_bytes());
    udp_rx.extend_from_slice(&encoded_response);

    let (src_port, dst_port, coap_bytes) = UdpProxyClient::decode_udp_rx(&udp_rx).expect("valid UDP_RX.ntf");
    assert_eq!(src_port, 61631);
    assert_eq!(dst_port, 61631);
    let decoded = Message::decode(coap_bytes).expect("valid CoAP response");
    assert_eq!(decoded.code, Code::CONTENT);
    assert_eq!(decoded.payload, vec![0xAA, 0xBB]);
}

#[tokio::test]
async fn clearing_the_prefix_forces_a_refetch_before_the_next_tunnel() {
    let proxy = UdpProxyClient::new();
    proxy.set_mesh_local_prefix([0xFD; 8]).await.expect("valid prefix");
    assert!(proxy.mesh_local_prefix().await.is_some());

    proxy.clear_mesh_local_prefix().await;
    assert_eq!(proxy.mesh_local_prefix().await, None);
}
