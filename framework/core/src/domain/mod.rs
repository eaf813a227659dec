// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod blackboard;
pub mod clock;
pub mod config;
pub mod events;
pub mod repository;
pub mod sequence;
