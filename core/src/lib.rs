//! Merchant risk early-warning core.
//!
//! Monthly merchant panels in; per merchant-month risk components, a blended
//! probability and an alert label out. Everything is a pure batch transform:
//! no I/O, no global state. The runner in `tools/` owns files and storage.

pub mod error;
pub mod types;
pub mod config;

pub mod stats;
pub mod normalizer;
pub mod panel;
pub mod joiner;
pub mod series;

pub mod component;
pub mod sales_risk;
pub mod customer_risk;
pub mod market_risk;
pub mod aggregate;

pub mod ensemble;
pub mod calibration;
pub mod alerting;
pub mod pipeline;

pub mod explain;
pub mod benchmark;

pub mod rng;
pub mod synth;

pub use config::RiskConfig;
pub use error::{RiskError, RiskResult};
pub use pipeline::{run, OutputRow, OutputTable};
