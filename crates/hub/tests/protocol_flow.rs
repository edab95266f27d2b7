use hg_core::Config;
use hg_hub::ErrorCode;
use hg_hub::Hub;
use hg_hub::Identity;
use hg_hub::ServerMessage;
use hg_session::MemorySessions;
use hg_store::Memory;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;

struct Client {
    identity: Option<Identity>,
    tx: UnboundedSender<ServerMessage>,
    rx: UnboundedReceiver<ServerMessage>,
    access_token: Option<String>,
}

impl Client {
    fn new() -> Self {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        Self {
            identity: None,
            tx,
            rx,
            access_token: None,
        }
    }

    async fn send(&mut self, hub: &Hub, raw: &str) -> Option<ServerMessage> {
        hub.process(&mut self.identity, &self.tx, raw).await
    }

    /// Registers, then authenticates this connection.
    async fn sign_in(&mut self, hub: &Hub, username: &str) -> ServerMessage {
        let reply = self
            .send(
                hub,
                &format!(
                    r#"{{"type":"register","username":"{}","password":"pw"}}"#,
                    username
                ),
            )
            .await
            .unwrap();
        let ServerMessage::AuthSuccess {
            access_token: Some(token),
            ..
        } = &reply
        else {
            panic!("registration failed: {:?}", reply);
        };
        self.access_token = Some(token.clone());
        let auth = self
            .send(hub, &format!(r#"{{"type":"auth","token":"{}"}}"#, token))
            .await
            .unwrap();
        assert!(matches!(auth, ServerMessage::AuthSuccess { .. }));
        auth
    }

    /// Collects everything the server pushed to this mailbox so far.
    async fn drain(&mut self) -> Vec<ServerMessage> {
        // let room tasks finish their fan-out
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let mut messages = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    fn user_id(&self) -> String {
        self.identity.as_ref().unwrap().user.to_string()
    }
}

async fn hub() -> Arc<Hub> {
    let config = Config::from_env();
    Hub::new(
        config,
        Arc::new(Memory::default()),
        Arc::new(MemorySessions::default()),
    )
    .await
}

fn game_states(messages: &[ServerMessage]) -> Vec<&hg_table::TableView> {
    messages
        .iter()
        .filter_map(|m| match m {
            ServerMessage::GameState { view } => Some(view),
            _ => None,
        })
        .collect()
}

/// Builds a funded two-seat table; returns (admin, player, table_id).
async fn funded_table(hub: &Hub) -> (Client, Client, String) {
    let mut admin = Client::new();
    let mut player = Client::new();
    admin.sign_in(hub, "host").await;
    player.sign_in(hub, "guest").await;
    let created = admin
        .send(hub, r#"{"type":"create_table","small_blind":1,"big_blind":2}"#)
        .await
        .unwrap();
    let ServerMessage::TableCreated { table_id, .. } = created else {
        panic!("create failed: {:?}", created);
    };
    let join = |id: &str, seat: usize| {
        format!(r#"{{"type":"join_table","table_id":"{}","seat":{}}}"#, id, seat)
    };
    assert!(matches!(
        admin.send(hub, &join(&table_id, 0)).await.unwrap(),
        ServerMessage::GameState { .. }
    ));
    assert!(matches!(
        player.send(hub, &join(&table_id, 1)).await.unwrap(),
        ServerMessage::GameState { .. }
    ));
    admin
        .send(hub, r#"{"type":"give_chips","player":"host","amount":100}"#)
        .await
        .unwrap();
    let funded = admin
        .send(hub, r#"{"type":"give_chips","player":"guest","amount":100}"#)
        .await
        .unwrap();
    assert!(matches!(funded, ServerMessage::ChipsUpdated { .. }));
    (admin, player, table_id)
}

#[tokio::test(flavor = "multi_thread")]
async fn unauthenticated_connections_are_gated() {
    let hub = hub().await;
    let mut client = Client::new();
    let reply = client.send(&hub, r#"{"type":"ping"}"#).await.unwrap();
    assert_eq!(reply.code(), Some(ErrorCode::AuthRequired));
    let reply = client.send(&hub, "][").await.unwrap();
    assert_eq!(reply.code(), Some(ErrorCode::BadJson));
    let reply = client.send(&hub, r#"{"type":"shenanigans"}"#).await.unwrap();
    assert_eq!(reply.code(), Some(ErrorCode::UnknownType));
}

#[tokio::test(flavor = "multi_thread")]
async fn register_auth_ping() {
    let hub = hub().await;
    let mut client = Client::new();
    client.sign_in(&hub, "alice").await;
    let reply = client.send(&hub, r#"{"type":"ping"}"#).await.unwrap();
    assert!(matches!(reply, ServerMessage::Pong));
}

#[tokio::test(flavor = "multi_thread")]
async fn first_account_is_the_admin() {
    let hub = hub().await;
    let mut host = Client::new();
    let mut guest = Client::new();
    host.sign_in(&hub, "host").await;
    guest.sign_in(&hub, "guest").await;
    let denied = guest
        .send(&hub, r#"{"type":"create_table"}"#)
        .await
        .unwrap();
    assert_eq!(denied.code(), Some(ErrorCode::NotAdmin));
    let created = host.send(&hub, r#"{"type":"create_table"}"#).await.unwrap();
    assert!(matches!(created, ServerMessage::TableCreated { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn refresh_token_mints_access() {
    let hub = hub().await;
    let mut client = Client::new();
    let reply = client
        .send(
            &hub,
            r#"{"type":"register","username":"alice","password":"pw"}"#,
        )
        .await
        .unwrap();
    let ServerMessage::AuthSuccess {
        refresh_token: Some(refresh),
        ..
    } = reply
    else {
        panic!("no refresh token");
    };
    let reply = client
        .send(
            &hub,
            &format!(r#"{{"type":"refresh_token","refresh_token":"{}"}}"#, refresh),
        )
        .await
        .unwrap();
    assert!(matches!(reply, ServerMessage::TokenRefreshed { .. }));
    let reply = client
        .send(&hub, r#"{"type":"refresh_token","refresh_token":"junk"}"#)
        .await
        .unwrap();
    assert_eq!(reply.code(), Some(ErrorCode::RefreshFailed));
}

#[tokio::test(flavor = "multi_thread")]
async fn funding_both_seats_auto_starts_a_hand() {
    let hub = hub().await;
    let (mut admin, mut player, _) = funded_table(&hub).await;
    let admin_frames = admin.drain().await;
    assert!(admin_frames
        .iter()
        .any(|m| matches!(m, ServerMessage::HandStarted { hand_number: 1, .. })));
    // every snapshot hides everyone else's hole cards
    for frames in [&admin_frames, &player.drain().await] {
        for view in game_states(frames) {
            for seat in view.players.iter() {
                match seat.is_you {
                    true => {}
                    false => assert!(seat.hole_cards.is_none(), "hole cards leaked"),
                }
            }
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn fold_ends_heads_up_hand() {
    let hub = hub().await;
    let (mut admin, mut player, _) = funded_table(&hub).await;
    let frames = admin.drain().await;
    let view = *game_states(&frames).last().expect("snapshot after start");
    let actor = view.current_player.clone().expect("hand in progress");
    let on_turn = match actor == admin.user_id() {
        true => &mut admin,
        false => &mut player,
    };
    let reply = on_turn
        .send(&hub, r#"{"type":"action","kind":"fold"}"#)
        .await
        .unwrap();
    assert!(matches!(reply, ServerMessage::GameState { .. }));
    let frames = admin.drain().await;
    assert!(frames
        .iter()
        .any(|m| matches!(m, ServerMessage::HandResult { .. })));
    // winner banked the blinds: stacks total is conserved
    let view = *game_states(&frames).last().unwrap();
    let total: i64 = view.players.iter().map(|p| p.chips).sum();
    assert_eq!(total, 200);
}

#[tokio::test(flavor = "multi_thread")]
async fn acting_out_of_turn_is_rejected() {
    let hub = hub().await;
    let (mut admin, mut player, _) = funded_table(&hub).await;
    let frames = admin.drain().await;
    let view = *game_states(&frames).last().unwrap();
    let actor = view.current_player.clone().unwrap();
    let off_turn = match actor == admin.user_id() {
        true => &mut player,
        false => &mut admin,
    };
    let reply = off_turn
        .send(&hub, r#"{"type":"action","kind":"fold"}"#)
        .await
        .unwrap();
    assert_eq!(reply.code(), Some(ErrorCode::InvalidAction));
}

#[tokio::test(flavor = "multi_thread")]
async fn reconnect_within_grace_restores_cards() {
    let hub = hub().await;
    let (mut admin, mut player, _) = funded_table(&hub).await;
    let frames = player.drain().await;
    let before = game_states(&frames)
        .last()
        .and_then(|v| v.players.iter().find(|p| p.is_you))
        .and_then(|p| p.hole_cards.clone())
        .expect("player was dealt in");
    // socket drops mid-hand
    let identity = player.identity.clone();
    hub.disconnect(&identity, &player.tx).await;
    let admin_saw = admin.drain().await;
    assert!(admin_saw
        .iter()
        .any(|m| matches!(m, ServerMessage::PlayerDisconnected { .. })));
    // fresh socket, same token: tombstone clears, cards come back
    let mut replacement = Client::new();
    let token = player.access_token.clone().unwrap();
    replacement.access_token = Some(token.clone());
    let auth = replacement
        .send(&hub, &format!(r#"{{"type":"auth","token":"{}"}}"#, token))
        .await
        .unwrap();
    assert!(matches!(auth, ServerMessage::AuthSuccess { .. }));
    let frames = replacement.drain().await;
    let after = game_states(&frames)
        .iter()
        .filter_map(|v| v.players.iter().find(|p| p.is_you))
        .filter_map(|p| p.hole_cards.clone())
        .next_back()
        .expect("private snapshot resent");
    assert_eq!(after, before);
    let admin_saw = admin.drain().await;
    assert!(admin_saw
        .iter()
        .any(|m| matches!(m, ServerMessage::PlayerReconnected { .. })));
}

#[tokio::test(flavor = "multi_thread")]
async fn displaced_socket_does_not_tombstone_the_new_one() {
    let hub = hub().await;
    let (_, mut player, _) = funded_table(&hub).await;
    let token = player.access_token.clone().unwrap();
    // same user authenticates on a second socket
    let mut second = Client::new();
    second
        .send(&hub, &format!(r#"{{"type":"auth","token":"{}"}}"#, token))
        .await
        .unwrap();
    // the stale socket closing must not mark the user disconnected
    let identity = player.identity.clone();
    hub.disconnect(&identity, &player.tx).await;
    let reply = second.send(&hub, r#"{"type":"ping"}"#).await.unwrap();
    assert!(matches!(reply, ServerMessage::Pong));
}

#[tokio::test(flavor = "multi_thread")]
async fn ledger_and_standings_track_chip_ops() {
    let hub = hub().await;
    let (mut admin, mut player, _) = funded_table(&hub).await;
    let denied = player.send(&hub, r#"{"type":"get_ledger"}"#).await.unwrap();
    assert_eq!(denied.code(), Some(ErrorCode::NotAdmin));
    let reply = admin.send(&hub, r#"{"type":"get_ledger"}"#).await.unwrap();
    let ServerMessage::Ledger { transactions } = reply else {
        panic!("expected ledger");
    };
    assert_eq!(transactions.len(), 2);
    let reply = admin
        .send(&hub, r#"{"type":"get_standings"}"#)
        .await
        .unwrap();
    let ServerMessage::Standings { players, .. } = reply else {
        panic!("expected standings");
    };
    assert_eq!(players.len(), 2);
    assert!(players.iter().all(|s| s.buy_ins == 100 && s.net == -100));
    // takes must not exceed the stack
    let reply = admin
        .send(
            &hub,
            r#"{"type":"take_chips","player":"guest","amount":100000}"#,
        )
        .await
        .unwrap();
    assert_eq!(reply.code(), Some(ErrorCode::ChipError));
}

#[tokio::test(flavor = "multi_thread")]
async fn tables_cannot_be_deleted_while_occupied() {
    let hub = hub().await;
    let (mut admin, _player, table_id) = funded_table(&hub).await;
    let reply = admin
        .send(
            &hub,
            &format!(r#"{{"type":"delete_table","table_id":"{}"}}"#, table_id),
        )
        .await
        .unwrap();
    assert_eq!(reply.code(), Some(ErrorCode::TableHasPlayers));
}

#[tokio::test(flavor = "multi_thread")]
async fn spectators_get_the_rail_view() {
    let hub = hub().await;
    let (_admin, _player, table_id) = funded_table(&hub).await;
    let mut rail = Client::new();
    rail.sign_in(&hub, "railbird").await;
    let reply = rail
        .send(
            &hub,
            &format!(r#"{{"type":"join_table","table_id":"{}"}}"#, table_id),
        )
        .await
        .unwrap();
    let ServerMessage::GameState { view } = reply else {
        panic!("expected spectator snapshot");
    };
    assert!(view.players.iter().all(|p| !p.is_you));
    assert!(view.players.iter().all(|p| p.hole_cards.is_none()));
    assert!(view.valid_actions.is_empty());
}
