// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod config;
pub mod coordinator;
pub mod credential;
pub mod error;
pub mod session;
pub mod test_support;
pub mod transport;
