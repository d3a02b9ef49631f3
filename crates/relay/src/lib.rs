//! The relay: a small HTTP service that holds the upstream credential and
//! forwards validated chat requests to the model API.

pub mod api;
pub mod cli;
pub mod credential;
pub mod limiter;
pub mod origin;
pub mod state;
pub mod telemetry;
pub mod upstream;
pub mod validate;
