// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Dispatching `RLY_RX.ntf` relay notifications to the right joiner session
//! by joiner id, and the caller-driven session timeout.

use std::{collections::HashMap, sync::Arc, time::Duration};

use thread_commissioner::transport::joiner_session::{JoinerSession, SessionState, JOINER_TIMEOUT_SECS};

struct JoinerSessionManager {
    sessions: HashMap<[u8; 8], Arc<JoinerSession>>,
}

impl JoinerSessionManager {
    fn new() -> Self {
        Self { sessions: HashMap::new() }
    }

    fn admit(&mut self, joiner_id: [u8; 8], pskd: String) -> Arc<JoinerSession> {
        let session = Arc::new(JoinerSession::new(joiner_id, pskd));
        self.sessions.insert(joiner_id, session.clone());
        session
    }

    async fn dispatch_rly_rx(&self, joiner_id: [u8; 8], payload: Vec<u8>) {
        if let Some(session) = self.sessions.get(&joiner_id) {
            session.relay().push_rly_rx(payload).await;
        }
    }
}

#[tokio::test]
async fn relay_notifications_are_routed_to_the_matching_session_only() {
    let mut manager = JoinerSessionManager::new();
    let session_a = manager.admit([1; 8], "PSKDAAA".into());
    let session_b = manager.admit([2; 8], "PSKDBBB".into());

    manager.dispatch_rly_rx([1; 8], vec![0xDE, 0xAD]).await;
    manager.dispatch_rly_rx([2; 8], vec![0xBE, 0xEF]).await;

    assert_eq!(session_a.relay().pop_received().await, Some(vec![0xDE, 0xAD]));
    assert_eq!(session_a.relay().pop_received().await, None);
    assert_eq!(session_b.relay().pop_received().await, Some(vec![0xBE, 0xEF]));
    assert_eq!(session_b.relay().pop_received().await, None);
}

#[tokio::test]
async fn dispatch_to_unknown_joiner_id_is_silently_dropped() {
    let mut manager = JoinerSessionManager::new();
    let session = manager.admit([1; 8], "PSKDAAA".into());
    manager.dispatch_rly_rx([9; 8], vec![1, 2, 3]).await;
    assert_eq!(session.relay().pop_received().await, None);
}

#[tokio::test(start_paused = true)]
async fn session_times_out_after_the_documented_window_once_connected() {
    let session = JoinerSession::new([3; 8], "PSKDCCC".into());
    session.mark_connected().await;
    assert_eq!(session.state().await, SessionState::Connected);

    tokio::time::advance(Duration::from_secs(JOINER_TIMEOUT_SECS + 1)).await;
    // The module leaves timer-driving to the caller; simulate the
    // commissioner core's periodic sweep firing once the window elapses.
    session.mark_timed_out().await;
    assert_eq!(session.state().await, SessionState::TimedOut);
}
