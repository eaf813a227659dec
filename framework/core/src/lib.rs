// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # democrite-core
//!
//! Blackboard coordination engine and resumable sequence executor.
//!
//! | Layer | Contents |
//! |-------|----------|
//! | `domain` | rules, validators, registries, board and thread state, repository traits, configuration |
//! | `application` | board actors, storage controller, board provider, sequence executor, repository factories |
//! | `infrastructure` | event bus, in-memory and PostgreSQL repositories, repository cache |

pub mod application;
pub mod domain;
pub mod infrastructure;
