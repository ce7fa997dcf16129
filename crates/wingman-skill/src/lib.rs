// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tools for the Wingman agent runtime.
//!
//! Defines the [`Tool`] trait, the [`ToolRegistry`] that dispatches model
//! tool calls, the built-in tools (shell, files, HTTP) and the [`Sandbox`]
//! that contains them.

pub mod builtin;
pub mod registry;
pub mod sandbox;
pub mod tool;

pub use builtin::register_builtins;
pub use registry::{truncate_result, ToolRegistry};
pub use sandbox::{Sandbox, ToolContext};
pub use tool::{required_str, FnTool, Tool, ToolOutput};
