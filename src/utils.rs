// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use rand::Rng;

/// Generates a random CoAP token of `len` bytes (1..=8). Token length is
/// negotiated per-exchange; `DEFAULT_TOKEN_LEN` (8) is used unless the
/// caller overrides it.
pub fn generate_token(len: usize) -> Vec<u8> {
    let len = len.clamp(1, 8);
    let mut token = vec![0u8; len];
    rand::rng().fill(token.as_mut_slice());
    token
}

/// Generates a random 16-bit message-id seed. Subsequent ids for the same
/// endpoint are produced by wrapping increments, not repeated calls to this
/// function.
pub fn generate_message_id() -> u16 {
    rand::rng().random()
}
