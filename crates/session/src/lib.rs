//! Disconnect tombstones and the reconnect decision.
//!
//! When a seated player's connection drops, the hub writes a
//! [`Tombstone`] carrying enough state to restore them, stamped with a
//! grace deadline. A timely re-authentication clears the tombstone and
//! the player resumes their seat, cards intact; the sweeper reaps
//! expired tombstones so the hub can fold and unseat the absentee.
//!
//! [`try_reconnect`](Sessions::try_reconnect) and
//! [`sweep`](Sessions::sweep) are mutually atomic: a user reconnects
//! exactly once or is swept, never both.
use hg_cards::Hole;
use hg_core::Chips;
use hg_core::ID;
use hg_core::Member;
use hg_core::Seat;
use hg_table::Table;
use std::collections::HashMap;
use std::time::Duration;
use std::time::Instant;
use tokio::sync::Mutex;

/// A disconnected-with-grace marker for one seated player.
#[derive(Debug, Clone)]
pub struct Tombstone {
    pub user: ID<Member>,
    pub username: String,
    pub table: ID<Table>,
    pub seat: Seat,
    pub chips: Chips,
    pub hole: Option<Hole>,
    pub disconnected_at: Instant,
    pub deadline: Instant,
}

impl Tombstone {
    /// Stamps a tombstone whose grace window starts now.
    pub fn new(
        user: ID<Member>,
        username: String,
        table: ID<Table>,
        seat: Seat,
        chips: Chips,
        hole: Option<Hole>,
        grace: Duration,
    ) -> Self {
        let now = Instant::now();
        Self {
            user,
            username,
            table,
            seat,
            chips,
            hole,
            disconnected_at: now,
            deadline: now + grace,
        }
    }
    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// The narrow persistence interface for reconnect state.
#[async_trait::async_trait]
pub trait Sessions: Send + Sync {
    /// Upserts the user's tombstone.
    async fn save(&self, tombstone: Tombstone);
    /// Reads a user's live tombstone without consuming it.
    async fn lookup(&self, user: ID<Member>) -> Option<Tombstone>;
    /// True iff a live tombstone existed for this user at this table;
    /// the tombstone is atomically consumed.
    async fn try_reconnect(&self, user: ID<Member>, table: ID<Table>) -> bool;
    /// Returns and deletes every tombstone at this table whose deadline
    /// has passed.
    async fn sweep(&self, table: ID<Table>) -> Vec<Tombstone>;
}

/// In-memory tombstone store.
///
/// One mutex over the map makes save-then-reconnect observe the save and
/// makes reconnect and sweep mutually exclusive.
#[derive(Debug, Default)]
pub struct MemorySessions {
    tombstones: Mutex<HashMap<ID<Member>, Tombstone>>,
}

#[async_trait::async_trait]
impl Sessions for MemorySessions {
    async fn save(&self, tombstone: Tombstone) {
        log::debug!(
            "[session] tombstone for {} at table {}",
            tombstone.username,
            tombstone.table
        );
        self.tombstones
            .lock()
            .await
            .insert(tombstone.user, tombstone);
    }

    async fn lookup(&self, user: ID<Member>) -> Option<Tombstone> {
        self.tombstones
            .lock()
            .await
            .get(&user)
            .filter(|t| !t.expired())
            .cloned()
    }

    async fn try_reconnect(&self, user: ID<Member>, table: ID<Table>) -> bool {
        let mut tombstones = self.tombstones.lock().await;
        match tombstones.get(&user) {
            Some(t) if t.table == table && !t.expired() => {
                tombstones.remove(&user);
                log::info!("[session] {} reconnected in time", user);
                true
            }
            _ => false,
        }
    }

    async fn sweep(&self, table: ID<Table>) -> Vec<Tombstone> {
        let mut tombstones = self.tombstones.lock().await;
        let expired = tombstones
            .values()
            .filter(|t| t.table == table && t.expired())
            .map(|t| t.user)
            .collect::<Vec<ID<Member>>>();
        expired
            .iter()
            .filter_map(|u| tombstones.remove(u))
            .inspect(|t| log::info!("[session] grace expired for {}", t.username))
            .collect()
    }
}
