use super::protocol::ServerMessage;
use hg_core::Chips;
use hg_core::ID;
use hg_core::Member;
use hg_core::Seat;
use hg_table::Action;
use hg_table::TableSummary;
use tokio::sync::oneshot;

/// Where a room's answer goes.
pub type Reply = oneshot::Sender<ServerMessage>;

/// Which admin chip operation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipOp {
    Give,
    Take,
    Set,
}

/// Everything a room can be asked to do.
///
/// One room task consumes these in order, so all mutation of a table is
/// serialized; commands for different tables run in parallel.
#[derive(Debug)]
pub enum Command {
    Join {
        user: ID<Member>,
        username: String,
        seat: Option<Seat>,
        reply: Reply,
    },
    Leave {
        user: ID<Member>,
        reply: Reply,
    },
    StandUp {
        user: ID<Member>,
        reply: Reply,
    },
    Act {
        user: ID<Member>,
        action: Action,
        reply: Reply,
    },
    Start {
        reply: Reply,
    },
    Chat {
        username: String,
        text: String,
    },
    Chips {
        op: ChipOp,
        admin: ID<Member>,
        target: String,
        amount: Chips,
        reply: Reply,
    },
    /// Socket dropped for a seated player or spectator.
    Disconnected {
        user: ID<Member>,
    },
    /// Timely reconnect; the room restores the player and resends state.
    Reconnected {
        user: ID<Member>,
    },
    /// Grace expired for these users: fold, unseat, announce.
    Sweep {
        users: Vec<ID<Member>>,
    },
    /// 1 Hz heartbeat for turn timeouts.
    Tick,
    /// Attempt the scheduled next hand.
    AutoStart,
    Describe {
        reply: oneshot::Sender<TableSummary>,
    },
    /// Stop the room task. Server shutdown persists a final snapshot;
    /// table deletion does not.
    Shutdown {
        persist: bool,
        ack: Option<oneshot::Sender<()>>,
    },
}
