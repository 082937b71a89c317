//! Upstream platform wire models

pub mod models;
