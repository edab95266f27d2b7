use super::command::ChipOp;
use super::command::Command;
use super::mailbox::Connections;
use super::mailbox::send_to;
use super::protocol::ErrorCode;
use super::protocol::ServerMessage;
use super::protocol::game_code;
use hg_core::AUTO_START_DELAY;
use hg_core::Chips;
use hg_core::ID;
use hg_core::Member;
use hg_core::Seat;
use hg_session::Sessions;
use hg_session::Tombstone;
use hg_store::Ledger;
use hg_store::LedgerEntry;
use hg_store::LedgerKind;
use hg_store::Nights;
use hg_store::Snapshots;
use hg_store::Store;
use hg_table::Action;
use hg_table::Table;
use hg_table::TableEvent;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::mpsc::unbounded_channel;

/// Address of a live room.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    pub id: ID<Table>,
    pub tx: UnboundedSender<Command>,
}

impl RoomHandle {
    pub fn send(&self, command: Command) {
        if self.tx.send(command).is_err() {
            log::warn!("[room] command dropped; room {} is gone", self.id);
        }
    }
}

/// The single writer for one table.
///
/// Owns the [`Table`] outright and consumes commands in arrival order,
/// so no two mutations of the same table ever interleave. After every
/// command the table's event channel is drained in emission order and
/// each event fans out as a broadcast plus fresh per-viewer snapshots.
pub struct Room {
    table: Table,
    commands: UnboundedReceiver<Command>,
    events: UnboundedReceiver<TableEvent>,
    self_tx: UnboundedSender<Command>,
    connections: Connections,
    spectators: BTreeSet<ID<Member>>,
    sessions: Arc<dyn Sessions>,
    store: Arc<dyn Store>,
    grace: Duration,
    default_bank: u64,
}

impl Room {
    /// Moves the table into its own task and returns its address.
    pub fn spawn(
        mut table: Table,
        connections: Connections,
        sessions: Arc<dyn Sessions>,
        store: Arc<dyn Store>,
        grace: Duration,
        default_bank: u64,
    ) -> RoomHandle {
        let (cmd_tx, cmd_rx) = unbounded_channel();
        let (event_tx, event_rx) = unbounded_channel();
        table.set_sink(event_tx);
        let id = table.id();
        let room = Room {
            table,
            commands: cmd_rx,
            events: event_rx,
            self_tx: cmd_tx.clone(),
            connections,
            spectators: BTreeSet::new(),
            sessions,
            store,
            grace,
            default_bank,
        };
        tokio::spawn(room.run());
        RoomHandle { id, tx: cmd_tx }
    }

    async fn run(mut self) {
        log::info!("[room] {} is open", self.table.name());
        while let Some(command) = self.commands.recv().await {
            if let Command::Shutdown { persist, ack } = command {
                if persist {
                    self.persist().await;
                }
                if let Some(ack) = ack {
                    let _ = ack.send(());
                }
                break;
            }
            self.handle(command).await;
            self.flush_events().await;
        }
        log::info!("[room] {} is closed", self.table.name());
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Join {
                user,
                username,
                seat,
                reply,
            } => {
                let message = self.join(user, username, seat).await;
                let _ = reply.send(message);
            }
            Command::Leave { user, reply } => {
                let message = self.leave(user).await;
                let _ = reply.send(message);
            }
            Command::StandUp { user, reply } => {
                let message = self.stand_up(user).await;
                let _ = reply.send(message);
            }
            Command::Act {
                user,
                action,
                reply,
            } => {
                let message = match self.table.act(user, action) {
                    Ok(()) => self.state_for(Some(user)),
                    Err(e) => ServerMessage::error(game_code(&e), e.to_string()),
                };
                let _ = reply.send(message);
            }
            Command::Start { reply } => {
                let message = match self.table.start_hand() {
                    Ok(()) => ServerMessage::GameStarted,
                    Err(e) => ServerMessage::error(ErrorCode::CannotStart, e.to_string()),
                };
                let _ = reply.send(message);
            }
            Command::Chat { username, text } => {
                self.announce(ServerMessage::ChatBroadcast {
                    username,
                    text,
                    timestamp: epoch_seconds(),
                })
                .await;
            }
            Command::Chips {
                op,
                admin,
                target,
                amount,
                reply,
            } => {
                let message = self.chips(op, admin, &target, amount).await;
                let _ = reply.send(message);
            }
            Command::Disconnected { user } => self.disconnected(user).await,
            Command::Reconnected { user } => self.reconnected(user).await,
            Command::Sweep { users } => self.sweep(users).await,
            Command::Tick => {
                let _ = self.table.poll_timeout();
            }
            Command::AutoStart => {
                if self.table.can_start_hand() {
                    let _ = self.table.start_hand();
                }
            }
            Command::Describe { reply } => {
                let _ = reply.send(self.table.summary());
            }
            Command::Shutdown { .. } => unreachable!("handled by the run loop"),
        }
    }
}

/// Membership.
impl Room {
    async fn join(
        &mut self,
        user: ID<Member>,
        username: String,
        seat: Option<Seat>,
    ) -> ServerMessage {
        let seated = self.table.seat_of(user);
        let disconnected = self
            .table
            .player(user)
            .map(|p| p.disconnected())
            .unwrap_or(false);
        match (seated, seat) {
            // still seated from before the drop: this join is a reconnect
            (Some(current), requested) if disconnected => {
                if let Some(want) = requested {
                    if want != current {
                        if let Err(e) = self.table.move_player(user, want) {
                            return ServerMessage::error(game_code(&e), e.to_string());
                        }
                    }
                }
                self.table.set_disconnected(user, false);
                self.spectators.remove(&user);
                self.sessions.try_reconnect(user, self.table.id()).await;
                self.announce_except(
                    user,
                    ServerMessage::PlayerReconnected {
                        user_id: user.to_string(),
                        username,
                    },
                )
                .await;
                self.fanout_states().await;
                self.state_for(Some(user))
            }
            // benign re-sync
            (Some(_), None) => {
                self.spectators.remove(&user);
                self.state_for(Some(user))
            }
            (Some(_), Some(_)) => ServerMessage::error(
                ErrorCode::AlreadySeated,
                "already seated; stand up first to change seats",
            ),
            // no seat requested: watch from the rail
            (None, None) => {
                self.spectators.insert(user);
                log::info!("[room] {} spectates {}", username, self.table.name());
                self.state_for(None)
            }
            (None, Some(want)) => {
                match self
                    .table
                    .seat_player(user, username.clone(), want, self.default_bank)
                {
                    Err(e) => ServerMessage::error(game_code(&e), e.to_string()),
                    Ok(()) => {
                        self.spectators.remove(&user);
                        self.announce(ServerMessage::PlayerJoined {
                            user_id: user.to_string(),
                            username,
                            seat: want,
                            chips: 0,
                        })
                        .await;
                        self.fanout_states().await;
                        if self.table.can_start_hand() {
                            let _ = self.table.start_hand();
                        }
                        self.state_for(Some(user))
                    }
                }
            }
        }
    }

    async fn leave(&mut self, user: ID<Member>) -> ServerMessage {
        if self.table.seat_of(user).is_some() {
            let player = self.table.unseat(user).expect("seated checked");
            self.announce(ServerMessage::PlayerLeft {
                user_id: user.to_string(),
                username: player.username().to_string(),
            })
            .await;
            self.fanout_states().await;
            return ServerMessage::LeftTable {
                table_id: self.table.id().to_string(),
            };
        }
        match self.spectators.remove(&user) {
            true => ServerMessage::LeftTable {
                table_id: self.table.id().to_string(),
            },
            false => ServerMessage::error(ErrorCode::NotAtTable, "not at a table"),
        }
    }

    async fn stand_up(&mut self, user: ID<Member>) -> ServerMessage {
        if self.table.seat_of(user).is_some() {
            let player = self.table.unseat(user).expect("seated checked");
            self.spectators.insert(user);
            self.announce(ServerMessage::PlayerLeft {
                user_id: user.to_string(),
                username: player.username().to_string(),
            })
            .await;
            self.fanout_states().await;
        }
        self.state_for(None)
    }
}

/// Connection lifecycle.
impl Room {
    async fn disconnected(&mut self, user: ID<Member>) {
        if self.spectators.remove(&user) {
            return;
        }
        let Some(player) = self.table.player(user) else {
            return;
        };
        let tombstone = Tombstone::new(
            user,
            player.username().to_string(),
            self.table.id(),
            player.seat(),
            player.chips(),
            player.hole(),
            self.grace,
        );
        let username = player.username().to_string();
        self.table.set_disconnected(user, true);
        self.sessions.save(tombstone).await;
        log::info!("[room] {} disconnected from {}", username, self.table.name());
        self.announce_except(
            user,
            ServerMessage::PlayerDisconnected {
                user_id: user.to_string(),
                username,
                grace_seconds: self.grace.as_secs(),
            },
        )
        .await;
        self.fanout_states().await;
    }

    async fn reconnected(&mut self, user: ID<Member>) {
        let Some(player) = self.table.player(user) else {
            return;
        };
        let username = player.username().to_string();
        self.table.set_disconnected(user, false);
        self.spectators.remove(&user);
        log::info!("[room] {} reconnected to {}", username, self.table.name());
        self.announce_except(
            user,
            ServerMessage::PlayerReconnected {
                user_id: user.to_string(),
                username,
            },
        )
        .await;
        self.fanout_states().await;
        send_to(&self.connections, user, self.state_for(Some(user))).await;
    }

    async fn sweep(&mut self, users: Vec<ID<Member>>) {
        for user in users {
            let Ok(player) = self.table.unseat(user) else {
                continue;
            };
            log::info!(
                "[room] grace expired; {} removed from {}",
                player.username(),
                self.table.name()
            );
            self.announce(ServerMessage::PlayerLeft {
                user_id: user.to_string(),
                username: player.username().to_string(),
            })
            .await;
        }
        self.fanout_states().await;
    }
}

/// Admin chip operations.
impl Room {
    async fn chips(
        &mut self,
        op: ChipOp,
        admin: ID<Member>,
        target: &str,
        amount: Chips,
    ) -> ServerMessage {
        let Some(player) = self.table.player_by_name(target) else {
            return ServerMessage::error(
                ErrorCode::PlayerNotFound,
                format!("{} is not at this table", target),
            );
        };
        let user = player.user();
        let username = player.username().to_string();
        let stack = player.chips();
        // validate, write the ledger, then mutate; the stack mutation
        // cannot fail once the entry is durable
        let (kind, recorded) = match op {
            ChipOp::Give => (LedgerKind::BuyIn, amount),
            ChipOp::Take => (LedgerKind::CashOut, amount),
            ChipOp::Set => (LedgerKind::Adjustment, amount - stack),
        };
        let valid = match op {
            ChipOp::Give => amount > 0,
            ChipOp::Take => amount > 0 && stack >= amount,
            ChipOp::Set => amount >= 0,
        };
        if !valid {
            return ServerMessage::error(ErrorCode::ChipError, "invalid chip amount");
        }
        let night = match self.store.active().await {
            Ok(night) => night,
            Err(e) => return ServerMessage::error(ErrorCode::ServerError, e.to_string()),
        };
        let entry = LedgerEntry::new(night, user, username.clone(), kind, recorded, Some(admin), None);
        if let Err(e) = self.store.record(entry).await {
            log::error!("[room] ledger write failed: {}", e);
            return ServerMessage::error(ErrorCode::ServerError, "ledger write failed");
        }
        let chips = match op {
            ChipOp::Give => self.table.give_chips(user, amount),
            ChipOp::Take => self.table.take_chips(user, amount),
            ChipOp::Set => self.table.set_stack(user, amount).map(|(_, new)| new),
        }
        .expect("validated above");
        let update = ServerMessage::ChipsUpdated {
            player: username,
            chips,
            action: kind.as_str().to_string(),
            amount,
        };
        self.announce(update.clone()).await;
        self.fanout_states().await;
        if op == ChipOp::Give && self.table.can_start_hand() {
            let _ = self.table.start_hand();
        }
        update
    }
}

/// Fan-out.
impl Room {
    fn state_for(&self, viewer: Option<ID<Member>>) -> ServerMessage {
        ServerMessage::GameState {
            view: self.table.view_for(viewer),
        }
    }

    fn audience(&self) -> Vec<ID<Member>> {
        self.table
            .seats()
            .values()
            .map(|p| p.user())
            .chain(self.spectators.iter().copied())
            .collect()
    }

    async fn announce(&self, message: ServerMessage) {
        for user in self.audience() {
            send_to(&self.connections, user, message.clone()).await;
        }
    }

    async fn announce_except(&self, except: ID<Member>, message: ServerMessage) {
        for user in self.audience().into_iter().filter(|u| *u != except) {
            send_to(&self.connections, user, message.clone()).await;
        }
    }

    /// Every seated player gets their private snapshot; every spectator
    /// the spectator snapshot.
    async fn fanout_states(&self) {
        let seated = self
            .table
            .seats()
            .values()
            .map(|p| p.user())
            .collect::<BTreeSet<ID<Member>>>();
        for user in seated.iter() {
            send_to(&self.connections, *user, self.state_for(Some(*user))).await;
        }
        let rail = self.state_for(None);
        for user in self.spectators.iter().filter(|u| !seated.contains(u)) {
            send_to(&self.connections, *user, rail.clone()).await;
        }
    }

    /// Drains the table's events in emission order, broadcasting each and
    /// refreshing snapshots; schedules the next hand after a result.
    async fn flush_events(&mut self) {
        let mut dirty = false;
        while let Ok(event) = self.events.try_recv() {
            dirty = true;
            let message = match event {
                TableEvent::HandStarted {
                    hand_number,
                    dealer_seat,
                } => ServerMessage::HandStarted {
                    hand_number,
                    dealer_seat,
                },
                TableEvent::StateChanged {
                    state,
                    community_cards,
                    pot,
                } => ServerMessage::StateChanged {
                    state,
                    community_cards: community_cards.iter().map(|c| c.to_string()).collect(),
                    pot,
                },
                TableEvent::PlayerAction {
                    user,
                    username,
                    kind,
                    amount,
                } => ServerMessage::PlayerAction {
                    user_id: user.to_string(),
                    username,
                    action: kind,
                    amount,
                },
                TableEvent::HandResult(outcome) => {
                    self.schedule_auto_start();
                    ServerMessage::HandResult { outcome }
                }
            };
            self.announce(message).await;
            self.fanout_states().await;
        }
        if dirty {
            self.persist().await;
        }
    }

    fn schedule_auto_start(&self) {
        let tx = self.self_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(AUTO_START_DELAY).await;
            let _ = tx.send(Command::AutoStart);
        });
    }

    /// Write-through backup; transient failures are logged and retried on
    /// the next state change.
    async fn persist(&self) {
        let snapshot = self.table.snapshot();
        if let Err(e) = self.store.save_table(self.table.id(), &snapshot).await {
            log::warn!("[room] snapshot backup failed for {}: {}", self.table.name(), e);
        }
    }
}

fn epoch_seconds() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time moves slow")
        .as_secs()
}
