//! Connection hub and wire protocol.
//!
//! One logical mailbox per authenticated connection, one single-writer
//! actor per table. Inbound envelopes parse into a closed tagged union;
//! the hub authenticates, routes table-bound commands to the addressed
//! room, and fans per-viewer snapshots back out. A background ticker
//! drives turn timeouts and tombstone sweeps.
//!
//! ## Pieces
//!
//! - [`ClientMessage`] / [`ServerMessage`] — the JSON envelope taxonomy
//! - [`Mailbox`] — a connected user's outbound channel
//! - [`Room`] — per-table actor owning a [`Table`](hg_table::Table)
//! - [`Hub`] — registry of connections and rooms, auth, lobby fan-out
mod command;
mod hub;
mod mailbox;
mod protocol;
mod room;

pub use command::*;
pub use hub::*;
pub use mailbox::*;
pub use protocol::*;
pub use room::*;
