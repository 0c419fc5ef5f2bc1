//! Spreadsheet mirror for published schedules.
//!
//! A month's workbook holds one worksheet per day plus a running incidence
//! log. [`Synchronizer`] discovers or creates each level in order and then
//! upserts rows by natural key, so re-running a sync is always safe.
//!
//! The workbook service is reached through [`SpreadsheetApi`]; [`GraphClient`]
//! speaks the Microsoft Graph workbook API and [`MemoryWorkbook`] keeps
//! everything in process.

pub mod api;
pub mod config;
pub mod error;
pub mod graph;
pub mod layout;
pub mod memory;
pub mod sync;

pub use api::SpreadsheetApi;
pub use config::WorkbookConfig;
pub use error::{Error, Result};
pub use graph::GraphClient;
pub use memory::MemoryWorkbook;
pub use sync::{SyncReport, SyncStep, Synchronizer};
