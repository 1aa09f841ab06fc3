//! Command-line surface: option overrides and report rendering.
pub mod overrides;
pub mod report;
