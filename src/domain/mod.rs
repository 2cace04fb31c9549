//! Core domain types and logic.

pub mod panel;
pub mod features;
pub mod universe;
pub mod scoring;
pub mod weights;
pub mod turnover;
pub mod backtest;
pub mod performance;
pub mod blotter;
pub mod config_validation;
pub mod error;
