// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Binary TLV codec for all on-wire Thread management structures, and the
//! dataset/steering/joiner derivations built on top of it.

pub mod channel_mask;
pub mod child_table;
pub mod codec;
pub mod connectivity;
pub mod dataset;
pub mod joiner;
pub mod network_data;
pub mod route64;
pub mod security_policy;
pub mod steering;

pub use codec::{Scope, Tlv, TlvList, TlvSet};
