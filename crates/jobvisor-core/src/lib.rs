//! Jobvisor Core - Platform-independent supervision of external analysis jobs
//!
//! This crate provides the process handle and command builder contracts, the
//! lifecycle callback sink, configuration and error types, and the
//! cancellable supervisor that runs one job at a time on top of them.

pub mod callbacks;
pub mod command;
pub mod config;
pub mod drain;
pub mod error;
pub mod fields;
pub mod process;
pub mod supervisor;

pub use callbacks::*;
pub use command::*;
pub use config::*;
pub use error::*;
pub use fields::FieldTrie;
pub use process::*;
pub use supervisor::Supervisor;
