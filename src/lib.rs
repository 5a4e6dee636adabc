// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Dermascan: skin lesion classification with analysis history
//!
//! Uploaded images are classified by an external model, every prediction is
//! persisted in a local SQLite database next to a fixed disease catalog, and
//! individual analyses can be exported as JSON or PDF reports.

pub mod config;
pub mod db;
pub mod error;
pub mod inference;
pub mod report;
pub mod uploads;
pub mod web;

pub use config::AppConfig;
pub use error::{DermaError, Result};
