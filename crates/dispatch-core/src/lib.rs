pub mod assign;
pub mod audit;
pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod escalation;
pub mod filter;
pub mod io;
pub mod paths;
pub mod roster;
pub mod state;
pub mod store;
pub mod ticket;
pub mod transport;
pub mod watchdog;

pub use dispatcher::{CycleReport, Dispatcher, TicketOutcome};
pub use error::{DispatchError, Result};
