// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Democrite CLI

pub mod board;
pub mod config;
pub mod sequence;

pub use self::board::BoardCommand;
pub use self::config::ConfigCommand;
pub use self::sequence::SequenceCommand;
