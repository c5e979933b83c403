//! The update transaction

pub mod fsm;
pub mod gate;
pub mod lock;
pub mod orchestrator;
pub mod plan;
