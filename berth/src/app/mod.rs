//! Application wiring for the API service

pub mod options;
pub mod run;
