//! HTTP request handlers.

pub mod common;
pub mod datasets;

pub use common::*;
pub use datasets::*;
