//! # stockcount: Warehouse Inventory Counting Service
//!
//! Workers count bins inside counting sessions; team leaders reconcile the
//! counts against book quantities; admins watch per-day performance and the
//! audit trail.
//!
//! - [`hierarchy`], [`performance`], [`recorder`], [`credentials`]: pure rules
//! - [`db`]: PostgreSQL storage
//! - [`api`]: the Axum HTTP surface
//! - [`config`], [`error`], [`prom_metrics`]: process plumbing

pub mod api;
pub mod config;
pub mod credentials;
pub mod db;
pub mod error;
pub mod hierarchy;
pub mod performance;
pub mod prom_metrics;
pub mod recorder;
