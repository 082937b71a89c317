//! Deployment module

pub mod fsm;
pub mod naming;
pub mod orchestrator;
pub mod repository;
pub mod saga;
pub mod site;
