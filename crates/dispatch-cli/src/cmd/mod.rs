pub mod classify;
pub mod config;
pub mod init;
pub mod run;
pub mod state;
pub mod stats;
pub mod watchdog;
