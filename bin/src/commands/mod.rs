//! CLI command implementations.

pub(crate) mod history;
pub(crate) mod intervals;
pub(crate) mod run;
