// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

pub mod address;
pub mod cfg;
pub mod coap;
pub mod commissioner;
pub mod error;
pub mod tlv;
pub mod transport;
pub mod utils;
