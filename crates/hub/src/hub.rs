use super::command::ChipOp;
use super::command::Command;
use super::mailbox::Connections;
use super::mailbox::Mailbox;
use super::protocol::ClientMessage;
use super::protocol::ErrorCode;
use super::protocol::ServerMessage;
use super::protocol::parse;
use super::room::Room;
use super::room::RoomHandle;
use hg_auth::Crypto;
use hg_auth::Role;
use hg_core::Config;
use hg_core::ID;
use hg_core::Member;
use hg_core::TICK_PERIOD;
use hg_session::Sessions;
use hg_store::Ledger;
use hg_store::Nights;
use hg_store::Snapshots;
use hg_store::Store;
use hg_store::StoreError;
use hg_store::Users;
use hg_table::Action;
use hg_table::Table;
use hg_table::TableOptions;
use hg_table::TableSummary;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;

/// Who is on the other end of an authenticated connection.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user: ID<Member>,
    pub username: String,
    pub role: Role,
}

/// The connection hub.
///
/// Holds the mailbox registry, the room registry, and the store handles,
/// all injected at construction. Inbound frames flow through
/// [`process`](Self::process); table-bound work is forwarded to the
/// addressed room and awaited, everything else is handled inline.
pub struct Hub {
    config: Config,
    crypto: Crypto,
    connections: Connections,
    rooms: RwLock<HashMap<ID<Table>, RoomHandle>>,
    at_table: RwLock<HashMap<ID<Member>, ID<Table>>>,
    sessions: Arc<dyn Sessions>,
    store: Arc<dyn Store>,
}

/// Construction and lifecycle.
impl Hub {
    pub async fn new(
        config: Config,
        store: Arc<dyn Store>,
        sessions: Arc<dyn Sessions>,
    ) -> Arc<Self> {
        let crypto = Crypto::new(config.jwt_secret.as_bytes());
        let hub = Arc::new(Self {
            config,
            crypto,
            connections: Connections::default(),
            rooms: RwLock::new(HashMap::new()),
            at_table: RwLock::new(HashMap::new()),
            sessions,
            store,
        });
        hub.restore_tables().await;
        hub
    }

    /// Brings persisted tables back after a restart.
    async fn restore_tables(&self) {
        let snapshots = match self.store.load_tables().await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                log::warn!("[hub] could not load table backups: {}", e);
                return;
            }
        };
        for (id, snapshot) in snapshots {
            match Table::restore(snapshot) {
                Ok(table) => {
                    log::info!("[hub] restored table {} ({})", table.name(), id);
                    self.adopt(table).await;
                }
                Err(e) => log::error!("[hub] failed to restore table {}: {}", id, e),
            }
        }
    }

    async fn adopt(&self, table: Table) -> RoomHandle {
        let handle = Room::spawn(
            table,
            Arc::clone(&self.connections),
            Arc::clone(&self.sessions),
            Arc::clone(&self.store),
            Duration::from_secs(self.config.reconnect_grace_seconds),
            self.config.default_time_bank_seconds,
        );
        self.rooms.write().await.insert(handle.id, handle.clone());
        handle
    }

    /// Starts the 1 Hz heartbeat driving turn timeouts and sweeps.
    pub fn spawn_ticker(self: &Arc<Self>) {
        let hub = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_PERIOD);
            loop {
                interval.tick().await;
                let handles = hub.handles().await;
                for handle in handles {
                    handle.send(Command::Tick);
                    let swept = hub.sessions.sweep(handle.id).await;
                    if !swept.is_empty() {
                        let users = swept.iter().map(|t| t.user).collect::<Vec<ID<Member>>>();
                        let mut at_table = hub.at_table.write().await;
                        for user in users.iter() {
                            at_table.remove(user);
                        }
                        drop(at_table);
                        handle.send(Command::Sweep { users });
                    }
                }
            }
        });
    }

    /// Stops every room, waiting for final snapshots to land.
    pub async fn shutdown(&self) {
        let handles = self.handles().await;
        for handle in handles {
            let (tx, rx) = oneshot::channel();
            handle.send(Command::Shutdown {
                persist: true,
                ack: Some(tx),
            });
            let _ = rx.await;
        }
        self.rooms.write().await.clear();
        log::info!("[hub] shutdown complete");
    }

    async fn handles(&self) -> Vec<RoomHandle> {
        self.rooms.read().await.values().cloned().collect()
    }
}

/// Frame processing.
impl Hub {
    /// Handles one inbound frame for a connection.
    ///
    /// `identity` is this connection's auth state; `tx` is its outbound
    /// channel. The returned message, if any, is the handler's reply;
    /// broadcasts triggered along the way flow through mailboxes.
    pub async fn process(
        &self,
        identity: &mut Option<Identity>,
        tx: &UnboundedSender<ServerMessage>,
        raw: &str,
    ) -> Option<ServerMessage> {
        let message = match parse(raw) {
            Ok(message) => message,
            Err(reply) => return Some(reply),
        };
        match message {
            ClientMessage::Register { username, password } => {
                Some(self.register(&username, &password).await)
            }
            ClientMessage::Login { username, password } => {
                Some(self.login(&username, &password).await)
            }
            ClientMessage::RefreshToken { refresh_token } => {
                Some(match self.crypto.refresh(&refresh_token) {
                    Ok(access_token) => ServerMessage::TokenRefreshed { access_token },
                    Err(e) => ServerMessage::error(ErrorCode::RefreshFailed, e.to_string()),
                })
            }
            ClientMessage::Auth { token } => Some(self.auth(identity, tx, &token).await),
            other => {
                let Some(who) = identity.clone() else {
                    return Some(ServerMessage::error(
                        ErrorCode::AuthRequired,
                        "not authenticated; send auth first",
                    ));
                };
                self.dispatch(&who, other).await
            }
        }
    }

    async fn dispatch(&self, who: &Identity, message: ClientMessage) -> Option<ServerMessage> {
        match message {
            ClientMessage::Ping => Some(ServerMessage::Pong),
            ClientMessage::JoinTable { table_id, seat } => {
                Some(self.join_table(who, &table_id, seat).await)
            }
            ClientMessage::LeaveTable => Some(self.leave_table(who).await),
            ClientMessage::StandUp => {
                let reply = self
                    .command_my_room(who, |reply| Command::StandUp {
                        user: who.user,
                        reply,
                    })
                    .await;
                if reply.code().is_none() {
                    self.broadcast_lobby().await;
                }
                Some(reply)
            }
            ClientMessage::Action { kind, amount } => Some(
                self.command_my_room(who, |reply| Command::Act {
                    user: who.user,
                    action: Action::from((kind, amount)),
                    reply,
                })
                .await,
            ),
            ClientMessage::Chat { text } => {
                match self.my_room(who).await {
                    Some(room) => {
                        room.send(Command::Chat {
                            username: who.username.clone(),
                            text,
                        });
                        None
                    }
                    None => Some(ServerMessage::error(ErrorCode::NotAtTable, "not at a table")),
                }
            }
            ClientMessage::StartGame => {
                Some(self.command_my_room(who, |reply| Command::Start { reply }).await)
            }
            ClientMessage::CreateTable {
                name,
                small_blind,
                big_blind,
                min_players,
                max_players,
            } => Some(match who.role.is_admin() {
                false => ServerMessage::error(ErrorCode::NotAdmin, "only admins create tables"),
                true => {
                    self.create_table(name, small_blind, big_blind, min_players, max_players)
                        .await
                }
            }),
            ClientMessage::DeleteTable { table_id } => Some(match who.role.is_admin() {
                false => ServerMessage::error(ErrorCode::NotAdmin, "only admins delete tables"),
                true => self.delete_table(&table_id).await,
            }),
            ClientMessage::GiveChips { player, amount } => {
                Some(self.chip_op(who, ChipOp::Give, player, amount).await)
            }
            ClientMessage::TakeChips { player, amount } => {
                Some(self.chip_op(who, ChipOp::Take, player, amount).await)
            }
            ClientMessage::SetChips { player, amount } => {
                Some(self.chip_op(who, ChipOp::Set, player, amount).await)
            }
            ClientMessage::GetLedger => Some(match who.role.is_admin() {
                false => ServerMessage::error(ErrorCode::NotAdmin, "only admins read the ledger"),
                true => self.ledger().await,
            }),
            ClientMessage::GetStandings => Some(self.standings().await),
            ClientMessage::EndSession => Some(match who.role.is_admin() {
                false => ServerMessage::error(ErrorCode::NotAdmin, "only admins end the session"),
                true => self.end_session().await,
            }),
            ClientMessage::Register { .. }
            | ClientMessage::Login { .. }
            | ClientMessage::RefreshToken { .. }
            | ClientMessage::Auth { .. } => unreachable!("handled before dispatch"),
        }
    }
}

/// Authentication.
impl Hub {
    pub async fn register(&self, username: &str, password: &str) -> ServerMessage {
        match self.store.register(username, password).await {
            Ok(account) => match self.crypto.issue(account.id, &account.username, account.role) {
                Ok(pair) => ServerMessage::AuthSuccess {
                    user_id: account.id.to_string(),
                    username: account.username,
                    role: account.role.to_string(),
                    access_token: Some(pair.access_token),
                    refresh_token: Some(pair.refresh_token),
                },
                Err(e) => ServerMessage::error(ErrorCode::ServerError, e.to_string()),
            },
            Err(StoreError::Conflict) => {
                ServerMessage::error(ErrorCode::AuthFailed, "username already taken")
            }
            Err(e) => ServerMessage::error(ErrorCode::ServerError, e.to_string()),
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> ServerMessage {
        match self.store.login(username, password).await {
            Ok(account) => match self.crypto.issue(account.id, &account.username, account.role) {
                Ok(pair) => ServerMessage::AuthSuccess {
                    user_id: account.id.to_string(),
                    username: account.username,
                    role: account.role.to_string(),
                    access_token: Some(pair.access_token),
                    refresh_token: Some(pair.refresh_token),
                },
                Err(e) => ServerMessage::error(ErrorCode::ServerError, e.to_string()),
            },
            Err(StoreError::BadCredentials) => {
                ServerMessage::error(ErrorCode::AuthFailed, "invalid username or password")
            }
            Err(e) => ServerMessage::error(ErrorCode::ServerError, e.to_string()),
        }
    }

    pub fn refresh(&self, token: &str) -> Result<String, hg_auth::AuthError> {
        self.crypto.refresh(token)
    }

    pub fn crypto(&self) -> &Crypto {
        &self.crypto
    }

    /// Binds this connection to the token's identity, displacing any
    /// previous socket, then resolves a pending reconnect if one exists.
    async fn auth(
        &self,
        identity: &mut Option<Identity>,
        tx: &UnboundedSender<ServerMessage>,
        token: &str,
    ) -> ServerMessage {
        let claims = match self.crypto.authenticate(token) {
            Ok(claims) => claims,
            Err(e) => return ServerMessage::error(ErrorCode::AuthFailed, e.to_string()),
        };
        let who = Identity {
            user: claims.user(),
            username: claims.name.clone(),
            role: claims.role,
        };
        self.connections.write().await.insert(
            who.user,
            Mailbox::new(who.user, who.username.clone(), who.role, tx.clone()),
        );
        *identity = Some(who.clone());
        log::info!("[hub] {} authenticated", who.username);
        self.resume(&who).await;
        ServerMessage::AuthSuccess {
            user_id: who.user.to_string(),
            username: who.username,
            role: who.role.to_string(),
            access_token: None,
            refresh_token: None,
        }
    }

    /// Clears a live tombstone and restores the player at their table.
    async fn resume(&self, who: &Identity) {
        let Some(tombstone) = self.sessions.lookup(who.user).await else {
            return;
        };
        let Some(room) = self.rooms.read().await.get(&tombstone.table).cloned() else {
            return;
        };
        if self.sessions.try_reconnect(who.user, tombstone.table).await {
            self.at_table.write().await.insert(who.user, tombstone.table);
            room.send(Command::Reconnected { user: who.user });
        }
    }

    /// True when a newer socket has taken over this connection's user.
    /// The transport uses this to close the stale socket.
    pub async fn displaced(
        &self,
        identity: &Option<Identity>,
        tx: &UnboundedSender<ServerMessage>,
    ) -> bool {
        match identity {
            Some(who) => self
                .connections
                .read()
                .await
                .get(&who.user)
                .map(|mailbox| !mailbox.is(tx))
                .unwrap_or(false),
            None => false,
        }
    }

    /// Tears down a closing connection: drop the mailbox (unless a newer
    /// socket displaced it), and tombstone the user if they were seated.
    pub async fn disconnect(
        &self,
        identity: &Option<Identity>,
        tx: &UnboundedSender<ServerMessage>,
    ) {
        let Some(who) = identity else {
            return;
        };
        {
            let mut connections = self.connections.write().await;
            match connections.get(&who.user) {
                Some(mailbox) if mailbox.is(tx) => {
                    connections.remove(&who.user);
                }
                _ => return,
            }
        }
        log::info!("[hub] {} disconnected", who.username);
        let table = self.at_table.write().await.remove(&who.user);
        if let Some(table) = table {
            if let Some(room) = self.rooms.read().await.get(&table).cloned() {
                room.send(Command::Disconnected { user: who.user });
            }
        }
    }
}

/// Table membership and routing.
impl Hub {
    async fn my_room(&self, who: &Identity) -> Option<RoomHandle> {
        let table = self.at_table.read().await.get(&who.user).copied()?;
        self.rooms.read().await.get(&table).cloned()
    }

    async fn command_my_room<F>(&self, who: &Identity, command: F) -> ServerMessage
    where
        F: FnOnce(oneshot::Sender<ServerMessage>) -> Command,
    {
        let Some(room) = self.my_room(who).await else {
            return ServerMessage::error(ErrorCode::NotAtTable, "not at a table");
        };
        let (tx, rx) = oneshot::channel();
        room.send(command(tx));
        rx.await
            .unwrap_or_else(|_| ServerMessage::error(ErrorCode::ServerError, "room unavailable"))
    }

    async fn join_table(
        &self,
        who: &Identity,
        table_id: &str,
        seat: Option<hg_core::Seat>,
    ) -> ServerMessage {
        let Some(id) = ID::<Table>::parse(table_id) else {
            return ServerMessage::error(ErrorCode::TableNotFound, "no such table");
        };
        let Some(room) = self.rooms.read().await.get(&id).cloned() else {
            return ServerMessage::error(ErrorCode::TableNotFound, "no such table");
        };
        // one table at a time: leaving the previous one first
        let previous = self.at_table.read().await.get(&who.user).copied();
        if let Some(old) = previous.filter(|old| *old != id) {
            if let Some(old_room) = self.rooms.read().await.get(&old).cloned() {
                let (tx, rx) = oneshot::channel();
                old_room.send(Command::Leave {
                    user: who.user,
                    reply: tx,
                });
                let _ = rx.await;
            }
        }
        let (tx, rx) = oneshot::channel();
        room.send(Command::Join {
            user: who.user,
            username: who.username.clone(),
            seat,
            reply: tx,
        });
        let reply = rx
            .await
            .unwrap_or_else(|_| ServerMessage::error(ErrorCode::ServerError, "room unavailable"));
        if reply.code().is_none() {
            self.at_table.write().await.insert(who.user, id);
            self.broadcast_lobby().await;
        }
        reply
    }

    async fn leave_table(&self, who: &Identity) -> ServerMessage {
        let reply = self
            .command_my_room(who, |reply| Command::Leave {
                user: who.user,
                reply,
            })
            .await;
        if reply.code().is_none() {
            self.at_table.write().await.remove(&who.user);
            self.broadcast_lobby().await;
        }
        reply
    }
}

/// Lobby and administration.
impl Hub {
    pub async fn create_table(
        &self,
        name: Option<String>,
        small_blind: Option<hg_core::Chips>,
        big_blind: Option<hg_core::Chips>,
        min_players: Option<usize>,
        max_players: Option<usize>,
    ) -> ServerMessage {
        let options = TableOptions {
            small_blind: small_blind.unwrap_or(1),
            big_blind: big_blind.unwrap_or(2),
            min_players: min_players.unwrap_or(self.config.min_players),
            max_players: max_players.unwrap_or(self.config.max_players),
            turn_time_seconds: self.config.default_turn_time_seconds,
            time_bank_replenish: self.config.time_bank_replenish_per_hand,
        };
        let table = Table::new(
            name.unwrap_or_else(|| String::from("cash game")),
            options,
        );
        let summary = table.summary();
        log::info!(
            "[hub] created table {} (blinds {}/{})",
            summary.name,
            options.small_blind,
            options.big_blind
        );
        self.adopt(table).await;
        self.broadcast_lobby().await;
        ServerMessage::TableCreated {
            table_id: summary.table_id,
            name: summary.name,
            small_blind: options.small_blind,
            big_blind: options.big_blind,
            min_players: options.min_players,
            max_players: options.max_players,
        }
    }

    pub async fn delete_table(&self, table_id: &str) -> ServerMessage {
        let Some(id) = ID::<Table>::parse(table_id) else {
            return ServerMessage::error(ErrorCode::TableNotFound, "no such table");
        };
        let Some(room) = self.rooms.read().await.get(&id).cloned() else {
            return ServerMessage::error(ErrorCode::TableNotFound, "no such table");
        };
        let (tx, rx) = oneshot::channel();
        room.send(Command::Describe { reply: tx });
        let occupied = rx.await.map(|s| s.players > 0).unwrap_or(false);
        if occupied {
            return ServerMessage::error(
                ErrorCode::TableHasPlayers,
                "cannot delete a table with players",
            );
        }
        self.rooms.write().await.remove(&id);
        let (tx, rx) = oneshot::channel();
        room.send(Command::Shutdown {
            persist: false,
            ack: Some(tx),
        });
        let _ = rx.await;
        if let Err(e) = self.store.delete_table(id).await {
            log::warn!("[hub] failed to delete table backup {}: {}", id, e);
        }
        log::info!("[hub] deleted table {}", id);
        self.broadcast_lobby().await;
        ServerMessage::TableDeleted {
            table_id: table_id.to_string(),
        }
    }

    async fn chip_op(
        &self,
        who: &Identity,
        op: ChipOp,
        target: String,
        amount: hg_core::Chips,
    ) -> ServerMessage {
        if !who.role.is_admin() {
            return ServerMessage::error(ErrorCode::NotAdmin, "only admins move chips");
        }
        self.command_my_room(who, |reply| Command::Chips {
            op,
            admin: who.user,
            target,
            amount,
            reply,
        })
        .await
    }

    async fn ledger(&self) -> ServerMessage {
        match self.night_entries().await {
            Ok((_, transactions)) => ServerMessage::Ledger { transactions },
            Err(e) => ServerMessage::error(ErrorCode::ServerError, e.to_string()),
        }
    }

    pub async fn standings(&self) -> ServerMessage {
        match self.night_entries().await {
            Ok((night, entries)) => ServerMessage::Standings {
                session_id: night.to_string(),
                players: hg_store::standings(&entries),
            },
            Err(e) => ServerMessage::error(ErrorCode::ServerError, e.to_string()),
        }
    }

    async fn end_session(&self) -> ServerMessage {
        match self.night_entries().await {
            Ok((night, entries)) => {
                let reply = ServerMessage::Standings {
                    session_id: night.to_string(),
                    players: hg_store::standings(&entries),
                };
                if let Err(e) = self.store.end(night).await {
                    return ServerMessage::error(ErrorCode::ServerError, e.to_string());
                }
                log::info!("[hub] ended poker night {}", night);
                reply
            }
            Err(e) => ServerMessage::error(ErrorCode::ServerError, e.to_string()),
        }
    }

    async fn night_entries(
        &self,
    ) -> Result<(ID<hg_core::Night>, Vec<hg_store::LedgerEntry>), StoreError> {
        let night = self.store.active().await?;
        let entries = self.store.entries(night).await?;
        Ok((night, entries))
    }

    /// Current lobby listing.
    pub async fn table_list(&self) -> Vec<TableSummary> {
        let mut tables = Vec::new();
        for handle in self.handles().await {
            let (tx, rx) = oneshot::channel();
            handle.send(Command::Describe { reply: tx });
            if let Ok(summary) = rx.await {
                tables.push(summary);
            }
        }
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        tables
    }

    /// Lobby deltas go to every connected user.
    pub async fn broadcast_lobby(&self) {
        let message = ServerMessage::TablesList {
            tables: self.table_list().await,
        };
        for mailbox in self.connections.read().await.values() {
            mailbox.send(message.clone());
        }
    }
}
