//! Background workers

pub mod maintenance;
pub mod status_poller;
