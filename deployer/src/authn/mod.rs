//! Platform credential storage and encryption

pub mod credentials;
pub mod encryption;
