// SPDX-FileCopyrightText: 2023-2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

//! bringup is primarily an application and not a library. The semver
//! versioning covers the CLI and the output layout only. All Rust APIs can
//! change at any time, even in patch releases.
//!
//! The CLI source files use concrete tool implementations, while the
//! "library"-style source files take the external tools as trait objects so
//! they can be replaced in tests.

pub mod artifact;
pub mod cli;
pub mod config;
pub mod context;
pub mod convert;
pub mod format;
pub mod fsextract;
pub mod kernel;
pub mod locate;
pub mod pipeline;
pub mod report;
pub mod signals;
pub mod strategy;
pub mod stream;
pub mod tool;
pub mod util;
