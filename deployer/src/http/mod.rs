//! HTTP clients for the upstream platforms

pub mod client;
pub mod github;
pub mod render;
