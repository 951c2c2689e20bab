// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Confirms the confirmable-exchange retransmission schedule: exactly
//! `MAX_RETRANSMIT + 1` send attempts with a doubling inter-attempt delay,
//! ending in a single `Timeout` when nothing ever answers.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use thread_commissioner::{
    coap::{
        engine::{ACK_TIMEOUT, CoapEngine, DatagramTransport, MAX_RETRANSMIT},
        message::{Code, Message, MessageType},
    },
    error::Result,
};
use tokio::sync::Mutex;

/// Drops every datagram, recording the paused-clock instant of each send.
struct DroppingTransport {
    count: AtomicUsize,
    sent_at: Mutex<Vec<Duration>>,
    start: tokio::time::Instant,
}

impl DatagramTransport for DroppingTransport {
    async fn send_datagram(&self, _bytes: &[u8]) -> Result<()> {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.sent_at.lock().await.push(self.start.elapsed());
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn confirmable_exchange_retransmits_four_times_then_times_out() {
    let transport = Arc::new(DroppingTransport {
        count: AtomicUsize::new(0),
        sent_at: Mutex::new(Vec::new()),
        start: tokio::time::Instant::now(),
    });
    let engine = Arc::new(CoapEngine::new(Arc::clone(&transport)));

    let request_engine = Arc::clone(&engine);
    let request = tokio::spawn(async move {
        request_engine.request(Message::new(MessageType::Confirmable, Code::GET, 11, vec![4, 2])).await
    });

    // The final attempt's backoff window can reach ACK_TIMEOUT * 3/2 * 2^(n-1);
    // advancing well past the worst case drains the whole schedule.
    let worst_case_total: Duration =
        (0..=MAX_RETRANSMIT).map(|n| ACK_TIMEOUT * 3 / 2 * (1u32 << n)).sum::<Duration>() + Duration::from_secs(1);
    tokio::time::advance(worst_case_total).await;

    let result = request.await.expect("task completes");
    let err = result.expect_err("no response ever arrives");
    assert!(err.is_timeout());
    assert_eq!(transport.count.load(Ordering::SeqCst) as u32, MAX_RETRANSMIT + 1);

    let sent_at = transport.sent_at.lock().await;
    assert_eq!(sent_at.len(), (MAX_RETRANSMIT + 1) as usize);
    for window in sent_at.windows(2) {
        assert!(window[1] - window[0] >= ACK_TIMEOUT, "each retransmission gap must be at least ACK_TIMEOUT");
    }
}
