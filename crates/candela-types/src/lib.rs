//! Core types for the candela candle aggregation service.
//!
//! This crate provides the fundamental data structures used throughout candela:
//!
//! - [`Tick`] - A bid/ask quote for one symbol at one point in time
//! - [`Candle`] / [`CandleKey`] - OHLCV summary of one bucket and its identity
//! - [`Interval`] - Candle bucket width and late-tick alignment
//! - [`ShutdownSignal`] / [`HealthSink`] - Runtime state shared by the service
//! - [`CandelaError`] - Error taxonomy of the aggregation core

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/candela/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod candle;
mod error;
mod interval;
mod runtime;
mod tick;

pub use candle::{Candle, CandleKey};
pub use error::{CandelaError, Result};
pub use interval::{DEFAULT_LATE_TOLERANCE_PCT, Interval, UnsupportedInterval};
pub use runtime::{HealthSink, NoopHealthSink, ShutdownSignal};
pub use tick::{InvalidTick, Tick};
