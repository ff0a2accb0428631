//! Port traits: the narrow interfaces the simulation core consumes.

pub mod config_port;
pub mod data_port;
pub mod ledger_port;
pub mod report_port;
