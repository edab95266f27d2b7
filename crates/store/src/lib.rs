//! Durable stores behind narrow interfaces.
//!
//! The hub owns no storage of its own: it is handed trait objects for
//! the user directory, the active poker night, the append-only chip
//! ledger, and table snapshot backups. Production wires the
//! [`Postgres`] implementation; tests wire [`Memory`]. Nothing in here
//! is a process-wide global.
//!
//! ## Connectivity
//!
//! - [`db()`] — Establishes a database connection from `DB_URL`
//!
//! ## Interfaces
//!
//! - [`Users`] — register / login / lookup
//! - [`Nights`] — the active session (one poker night)
//! - [`Ledger`] — append-only chip movements and standings
//! - [`Snapshots`] — full-table JSON backups for restore on boot
mod error;
mod ledger;
mod memory;
mod nights;
mod postgres;
mod snapshots;
mod users;

pub use error::*;
pub use ledger::*;
pub use memory::*;
pub use nights::*;
pub use postgres::*;
pub use snapshots::*;
pub use users::*;

use std::sync::Arc;
use tokio_postgres::Client;

/// Everything the hub needs from durable storage, as one handle.
pub trait Store: Users + Nights + Ledger + Snapshots {}
impl<T> Store for T where T: Users + Nights + Ledger + Snapshots {}

/// Establishes a database connection.
///
/// Connects to PostgreSQL using the given URL and spawns the connection
/// driver. Returns an `Arc<Client>` suitable for sharing across tasks.
pub async fn db(url: &str) -> anyhow::Result<Arc<Client>> {
    log::info!("[store] connecting to database");
    let tls = tokio_postgres::tls::NoTls;
    let (client, connection) = tokio_postgres::connect(url, tls).await?;
    tokio::spawn(connection);
    client
        .execute("SET client_min_messages TO WARNING", &[])
        .await?;
    Ok(Arc::new(client))
}

/// Table for registered user accounts.
#[rustfmt::skip]
pub const USERS:        &str = "users";
/// Table for poker nights (ledger-scoped sessions of play).
#[rustfmt::skip]
pub const NIGHTS:       &str = "game_sessions";
/// Table for chip movements (buy-ins, cash-outs, adjustments).
#[rustfmt::skip]
pub const LEDGER:       &str = "ledger_transactions";
/// Table for full table-state backups.
#[rustfmt::skip]
pub const TABLE_STATES: &str = "table_states";
