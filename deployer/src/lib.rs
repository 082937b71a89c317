//! Deployer Library
//!
//! Core modules for the static site deployer.

pub mod app;
pub mod authn;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod models;
pub mod ratelimit;
pub mod server;
pub mod storage;
pub mod utils;
pub mod workers;
