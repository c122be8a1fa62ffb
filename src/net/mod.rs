//! Network channels: UDP tracking data and TCP commands.
//!
//! The data path and the command path are independent. [`data::DataChannel`]
//! decouples variable-rate datagram arrival from a single consumer with
//! freshest-sample semantics; [`command::CommandChannel`] runs a synchronous
//! request/response exchange on the caller's task.

pub mod command;
pub mod data;

pub use command::{CommandChannel, Response};
pub use data::DataChannel;
