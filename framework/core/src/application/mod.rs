// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Application Layer
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | `blackboard_service` | per-board actor running the command pipeline |
//! | `blackboard_provider` | board identity registry and actor lifecycle |
//! | `storage_controller` | resolution of limit issues into commands |
//! | `sequence_executor` | step loop, checkpoints and stage handlers |
//! | `repository_factory` | backend selection |
//! | `node` | wiring from configuration |

pub mod blackboard_provider;
pub mod blackboard_service;
pub mod node;
pub mod repository_factory;
pub mod sequence_executor;
pub mod storage_controller;

pub use blackboard_provider::BlackboardProvider;
pub use blackboard_service::{BlackboardHandle, BlackboardRuntime};
pub use node::DemocriteNode;
pub use sequence_executor::{ExecutionOptions, SequenceExecutorService, StageContext, StageHandler, StageHandlerRegistry};
pub use storage_controller::{BlackboardStorageController, DefaultStorageController};
