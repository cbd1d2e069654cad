//! Surfer-count forecasting for a river surf spot.
//!
//! A prediction combines a historical baseline, a rule-based adjustment
//! factor and an external ML service. When the ML service is warming up the
//! rule-based estimate is served instead, flagged as degraded.

pub mod api;
pub mod config;
pub mod error;
pub mod history;
pub mod prediction;
pub mod state;
