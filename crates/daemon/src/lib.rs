//! Weather relay daemon: polls the provider on per-resource schedules and serves the
//! last good body for each resource over HTTP.

pub mod config;
pub mod http;
pub mod poller;
pub mod upstream;
