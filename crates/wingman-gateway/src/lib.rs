// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/WebSocket gateway for Wingman.
//!
//! Serves the JSON frame protocol over `GET /ws`, a small REST surface
//! under `/api`, and long-running projects that advance one step per
//! request.

pub mod handlers;
pub mod jobs;
pub mod project;
pub mod protocol;
pub mod rooms;
pub mod server;
pub mod ws;

pub use jobs::{JobGuard, JobLatch};
pub use project::{ProjectManager, ProjectState, ProjectStatus, ProjectStep, StepStatus};
pub use protocol::{ClientFrame, ServerFrame};
pub use rooms::RoomRegistry;
pub use server::{router, start_server, GatewayState, ServerConfig};
