//! Reusable rendering helpers.

pub mod fmt;
pub mod time_bar;
