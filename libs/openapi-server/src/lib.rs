//! Deployer API wire models

pub mod models;
