// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! CoAP exchange engine: request/response matching by token, confirmable
//! retransmission with exponential backoff, and resource dispatch for
//! inbound requests. The transport is left abstract so the same engine
//! drives a plain UDP socket, a DTLS secure session, or a tunnelled
//! endpoint (joiner relay, UDP proxy) interchangeably.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use dashmap::DashMap;
use rand::Rng;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::{
    coap::message::{Code, Message, MessageType},
    error::{CommissionerError, Result},
    utils::{generate_message_id, generate_token},
};

pub const ACK_TIMEOUT: Duration = Duration::from_secs(2);
pub const ACK_RANDOM_FACTOR_NUM: u32 = 3;
pub const ACK_RANDOM_FACTOR_DEN: u32 = 2;
pub const MAX_RETRANSMIT: u32 = 4;
pub const MAX_LATENCY: Duration = Duration::from_secs(100);
pub const PROCESSING_DELAY: Duration = ACK_TIMEOUT;
/// `ACK_TIMEOUT * (2^MAX_RETRANSMIT - 1) * ACK_RANDOM_FACTOR`, the worst-case
/// span of the retransmission schedule itself.
pub const MAX_TRANSMIT_SPAN: Duration = Duration::from_secs(
    ACK_TIMEOUT.as_secs() * ((1u64 << MAX_RETRANSMIT) - 1) * ACK_RANDOM_FACTOR_NUM as u64 / ACK_RANDOM_FACTOR_DEN as u64,
);
pub const EXCHANGE_LIFETIME: Duration =
    Duration::from_secs(MAX_TRANSMIT_SPAN.as_secs() + 2 * MAX_LATENCY.as_secs() + PROCESSING_DELAY.as_secs());

/// What an engine sends bytes over. Kept as a plain async trait (not
/// `enum_dispatch`, which requires synchronous methods) so a single engine
/// implementation works over any of the transport kinds in
/// `crate::transport::endpoint`.
pub trait DatagramTransport: Send + Sync + 'static {
    async fn send_datagram(&self, bytes: &[u8]) -> Result<()>;
}

type ResourceHandler = Arc<dyn Fn(&Message) -> Message + Send + Sync>;

struct PendingExchange {
    token: Vec<u8>,
    responder: Option<oneshot::Sender<Result<Message>>>,
    /// Set once a bare ACK arrives for this exchange: retransmission stops,
    /// but the exchange stays pending for the separate response.
    acknowledged: Arc<AtomicBool>,
}

/// A previously-sent response, kept around so a retransmitted (duplicate)
/// request is answered identically instead of re-invoking the resource
/// handler.
struct CachedResponse {
    response: Message,
    expires_at: tokio::time::Instant,
}

/// Tracks outstanding confirmable exchanges and dispatches inbound requests
/// to registered resources. One engine instance per logical CoAP endpoint;
/// the joiner session and UDP-proxy tunnel each run their own nested
/// instance over their respective transports.
pub struct CoapEngine<T: DatagramTransport> {
    transport: Arc<T>,
    pending: DashMap<u16, PendingExchange>,
    responses: DashMap<u16, CachedResponse>,
    resources: DashMap<String, ResourceHandler>,
    cancel: CancellationToken,
}

impl<T: DatagramTransport> CoapEngine<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            pending: DashMap::new(),
            responses: DashMap::new(),
            resources: DashMap::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn register_resource(&self, path: &str, handler: ResourceHandler) {
        self.resources.insert(path.to_string(), handler);
    }

    /// Sends `msg`, assigning a fresh message ID and token if unset, and
    /// waits for the matching response. Confirmable messages are retried
    /// per the exponential-backoff schedule until `MAX_RETRANSMIT` is
    /// exhausted, at which point the exchange fails with `ErrorCode::Timeout`.
    pub async fn request(&self, mut msg: Message) -> Result<Message> {
        if msg.token.is_empty() {
            msg.token = generate_token(8);
        }
        if msg.message_id == 0 {
            msg.message_id = generate_message_id();
        }
        let message_id = msg.message_id;
        let confirmable = msg.msg_type == MessageType::Confirmable;

        let (tx, rx) = oneshot::channel();
        let acknowledged = Arc::new(AtomicBool::new(false));
        self.pending.insert(
            message_id,
            PendingExchange { token: msg.token.clone(), responder: Some(tx), acknowledged: Arc::clone(&acknowledged) },
        );

        let encoded = msg.encode();
        let result = if confirmable {
            self.send_with_retransmission(message_id, &encoded, rx, acknowledged).await
        } else {
            self.transport.send_datagram(&encoded).await?;
            rx.await.map_err(|_| CommissionerError::cancelled("exchange dropped before a response arrived"))?
        };
        self.pending.remove(&message_id);
        result
    }

    async fn send_with_retransmission(
        &self,
        message_id: u16,
        encoded: &[u8],
        mut rx: oneshot::Receiver<Result<Message>>,
        acknowledged: Arc<AtomicBool>,
    ) -> Result<Message> {
        let start = tokio::time::Instant::now();
        let mut timeout = initial_timeout();
        for attempt in 0..=MAX_RETRANSMIT {
            if acknowledged.load(Ordering::SeqCst) {
                break;
            }
            self.transport.send_datagram(encoded).await?;
            tokio::select! {
                res = &mut rx => {
                    return res.map_err(|_| CommissionerError::cancelled("exchange dropped before a response arrived"));
                }
                _ = self.cancel.cancelled() => {
                    return Err(CommissionerError::cancelled("engine shut down while awaiting a response"));
                }
                _ = tokio::time::sleep(timeout) => {
                    if acknowledged.load(Ordering::SeqCst) || attempt == MAX_RETRANSMIT {
                        break;
                    }
                    timeout *= 2;
                }
            }
        }

        // Either the schedule is exhausted or the peer has acknowledged the
        // request and a separate response is expected: keep waiting, without
        // retransmitting, until the whole exchange ages out.
        let remaining = EXCHANGE_LIFETIME.saturating_sub(start.elapsed());
        tokio::select! {
            res = &mut rx => {
                return res.map_err(|_| CommissionerError::cancelled("exchange dropped before a response arrived"));
            }
            _ = self.cancel.cancelled() => {
                return Err(CommissionerError::cancelled("engine shut down while awaiting a response"));
            }
            _ = tokio::time::sleep(remaining) => {}
        }
        self.pending.remove(&message_id);
        Err(CommissionerError::timeout(format!("no response to message id {message_id} after {} retransmits", MAX_RETRANSMIT)))
    }

    /// Sends `msg` over the transport without tracking any exchange for it
    /// and without waiting for a reply — the UDP-proxy tunnel's `UDP_TX.ntf`
    /// is sent this way: the tunnel itself is fire-and-forget, the inner
    /// request it carries gets its own reliability from a nested engine.
    pub async fn send_notification(&self, mut msg: Message) -> Result<()> {
        if msg.token.is_empty() {
            msg.token = generate_token(8);
        }
        if msg.message_id == 0 {
            msg.message_id = generate_message_id();
        }
        self.transport.send_datagram(&msg.encode()).await
    }

    /// Feeds a decoded inbound message into the engine. Responses (and
    /// empty ACK/RST) are matched against outstanding exchanges by token;
    /// requests are dispatched to a registered resource, returning the
    /// response the caller should send back (`4.04` when no resource
    /// matches the path). A request retransmitted with the same message id
    /// within `EXCHANGE_LIFETIME` is answered from the response cache rather
    /// than re-invoking the handler.
    pub fn handle_incoming(&self, msg: Message) -> Option<Message> {
        if msg.code.is_request() {
            self.purge_expired_responses();
            if let Some(cached) = self.responses.get(&msg.message_id) {
                return Some(cached.response.clone());
            }
            let path = msg.path();
            let response = match self.resources.get(&path) {
                Some(handler) => handler(&msg),
                None => Message::new(MessageType::Acknowledgement, Code::NOT_FOUND, msg.message_id, msg.token.clone()),
            };
            self.responses.insert(
                msg.message_id,
                CachedResponse { response: response.clone(), expires_at: tokio::time::Instant::now() + EXCHANGE_LIFETIME },
            );
            return Some(response);
        }

        if msg.code.is_empty() {
            // Bare ACK/RST: stop retransmission but don't resolve the
            // exchange yet if a separate response is still expected.
            match msg.msg_type {
                MessageType::Reset => self.resolve(&msg.token, Err(CommissionerError::rejected("peer reset the exchange"))),
                MessageType::Acknowledgement => self.mark_acknowledged(&msg.token),
                _ => {},
            }
            return None;
        }

        self.resolve(&msg.token, Ok(msg));
        None
    }

    fn mark_acknowledged(&self, token: &[u8]) {
        if let Some(entry) = self.pending.iter().find(|e| e.value().token == token) {
            entry.value().acknowledged.store(true, Ordering::SeqCst);
        }
    }

    fn purge_expired_responses(&self) {
        let now = tokio::time::Instant::now();
        self.responses.retain(|_, cached| cached.expires_at > now);
    }

    fn resolve(&self, token: &[u8], result: Result<Message>) {
        let key = self.pending.iter().find(|e| e.value().token == token).map(|e| *e.key());
        let Some(key) = key else { return };
        let Some((_, mut entry)) = self.pending.remove(&key) else { return };
        if let Some(responder) = entry.responder.take() {
            let _ = responder.send(result);
        }
    }

    /// Finalizes every outstanding exchange with `ErrorCode::Cancelled` and
    /// stops any in-flight retransmission loops.
    pub fn cancel_requests(&self) {
        self.cancel.cancel();
        for mut entry in self.pending.iter_mut() {
            if let Some(responder) = entry.responder.take() {
                let _ = responder.send(Err(CommissionerError::cancelled("exchange cancelled")));
            }
        }
        self.pending.clear();
    }
}

/// `ACK_TIMEOUT` to `ACK_TIMEOUT * ACK_RANDOM_FACTOR`, uniformly at random.
fn initial_timeout() -> Duration {
    let lo = ACK_TIMEOUT.as_millis() as u64;
    let hi = lo * ACK_RANDOM_FACTOR_NUM as u64 / ACK_RANDOM_FACTOR_DEN as u64;
    Duration::from_millis(rand::rng().random_range(lo..=hi))
}
