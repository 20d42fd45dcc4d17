// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

pub mod amm;
pub mod bundles;
pub mod decode;
pub mod engine;
pub mod pairs;
pub mod pipeline;
pub mod routers;
pub mod solver;
pub mod stats;
pub mod work_queue;

#[cfg(test)]
pub(crate) mod fixtures;
