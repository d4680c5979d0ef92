// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Tool Registry & Execution Pipeline.
//!
//! Defines the [`Tool`] trait that tool implementations satisfy, the
//! [`ToolRegistry`] that holds them and dispatches calls, and a handful of
//! demonstration tools under [`builtin`] used to exercise the pipeline.
//! Individual tool business logic beyond these demonstrations is out of
//! scope here; real deployments register their own [`Tool`] implementations.

pub mod builtin;
pub mod events;
pub mod registry;
pub mod tool;

pub use events::ToolEvent;
pub use registry::{RecoveryStep, ToolRegistry, ToolSchema};
pub use tool::{ErrorHandler, Tool, ToolResult};

pub use builtin::{AdderTool, CodeRunnerTool, EchoTool, PackageInstallerTool, ReaderTool};
