// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The closed set of transports a CoAP engine can be bound to: a plain UDP
//! socket, a DTLS secure session, a joiner relay tunnel, or a UDP-proxy
//! tunnel. `enum_dispatch` generates the trait impl over the enum so engine
//! code can hold one `Endpoint` value without a trait object.

use enum_dispatch::enum_dispatch;

use crate::{
    address::Address,
    transport::{joiner_session::RelaySocket, secure_session::SecureSession, udp_proxy::UdpProxyClient},
};

/// Peer-identity surface common to every transport kind. Actual datagram
/// I/O is transport-specific (plain socket read/write, DTLS
/// encrypt-then-send, relay-notification queuing) and lives on the
/// concrete types as async methods, since `enum_dispatch` traits must stay
/// synchronous.
#[enum_dispatch]
pub trait EndpointInfo {
    fn peer_addr(&self) -> &Address;
    fn peer_port(&self) -> u16;
    fn kind(&self) -> EndpointKind;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Plain,
    Secure,
    JoinerRelay,
    UdpProxy,
}

/// A bare UDP destination with no session state of its own, used before a
/// secure session has been negotiated (e.g. during discovery).
#[derive(Debug, Clone)]
pub struct PlainEndpoint {
    pub peer_addr: Address,
    pub peer_port: u16,
}

impl EndpointInfo for PlainEndpoint {
    fn peer_addr(&self) -> &Address {
        &self.peer_addr
    }

    fn peer_port(&self) -> u16 {
        self.peer_port
    }

    fn kind(&self) -> EndpointKind {
        EndpointKind::Plain
    }
}

impl EndpointInfo for SecureSession {
    fn peer_addr(&self) -> &Address {
        SecureSession::peer_addr(self)
    }

    fn peer_port(&self) -> u16 {
        SecureSession::peer_port(self)
    }

    fn kind(&self) -> EndpointKind {
        EndpointKind::Secure
    }
}

/// Wraps a joiner's `RelaySocket` with the peer identity the relay
/// notifications carry, so it can stand in as a CoAP transport.
pub struct JoinerRelayEndpoint {
    pub relay: RelaySocket,
    pub peer_addr: Address,
    pub peer_port: u16,
}

impl EndpointInfo for JoinerRelayEndpoint {
    fn peer_addr(&self) -> &Address {
        &self.peer_addr
    }

    fn peer_port(&self) -> u16 {
        self.peer_port
    }

    fn kind(&self) -> EndpointKind {
        EndpointKind::JoinerRelay
    }
}

/// Wraps a `UdpProxyClient` with the destination the tunnel currently
/// targets (an anycast-locator-derived address, or an explicit peer).
pub struct UdpProxyEndpoint {
    pub proxy: UdpProxyClient,
    pub peer_addr: Address,
    pub peer_port: u16,
}

impl EndpointInfo for UdpProxyEndpoint {
    fn peer_addr(&self) -> &Address {
        &self.peer_addr
    }

    fn peer_port(&self) -> u16 {
        self.peer_port
    }

    fn kind(&self) -> EndpointKind {
        EndpointKind::UdpProxy
    }
}

#[enum_dispatch(EndpointInfo)]
pub enum Endpoint {
    Plain(PlainEndpoint),
    Secure(SecureSession),
    JoinerRelay(JoinerRelayEndpoint),
    UdpProxy(UdpProxyEndpoint),
}
