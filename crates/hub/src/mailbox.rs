use super::protocol::ServerMessage;
use hg_auth::Role;
use hg_core::ID;
use hg_core::Member;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::sync::mpsc::UnboundedSender;

/// One authenticated connection's outbound channel.
///
/// Authenticating on a new socket displaces the previous mailbox; the
/// old writer sees its channel close and shuts the old socket down.
#[derive(Debug, Clone)]
pub struct Mailbox {
    pub user: ID<Member>,
    pub username: String,
    pub role: Role,
    tx: UnboundedSender<ServerMessage>,
}

impl Mailbox {
    pub fn new(
        user: ID<Member>,
        username: String,
        role: Role,
        tx: UnboundedSender<ServerMessage>,
    ) -> Self {
        Self {
            user,
            username,
            role,
            tx,
        }
    }
    pub fn send(&self, message: ServerMessage) {
        if self.tx.send(message).is_err() {
            log::debug!("[hub] mailbox for {} is closed", self.username);
        }
    }
    /// True if this mailbox writes to the given connection.
    pub fn is(&self, tx: &UnboundedSender<ServerMessage>) -> bool {
        self.tx.same_channel(tx)
    }
}

/// Read-mostly registry of live mailboxes, shared with every room.
pub type Connections = Arc<RwLock<HashMap<ID<Member>, Mailbox>>>;

/// Sends to one user if connected.
pub async fn send_to(connections: &Connections, user: ID<Member>, message: ServerMessage) {
    if let Some(mailbox) = connections.read().await.get(&user) {
        mailbox.send(message);
    }
}
