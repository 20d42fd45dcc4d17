// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>
#![allow(clippy::too_many_arguments)]

pub mod app;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use infrastructure::network;
pub use services::strategy;
