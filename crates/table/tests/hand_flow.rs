use hg_cards::Card;
use hg_cards::Deck;
use hg_core::Chips;
use hg_core::ID;
use hg_core::Member;
use hg_table::Action;
use hg_table::ActionKind;
use hg_table::GameError;
use hg_table::Stage;
use hg_table::Table;
use hg_table::TableEvent;
use hg_table::TableOptions;
use tokio::sync::mpsc::UnboundedReceiver;

fn options() -> TableOptions {
    TableOptions {
        small_blind: 1,
        big_blind: 2,
        min_players: 2,
        max_players: 10,
        turn_time_seconds: 30,
        time_bank_replenish: 0,
    }
}

fn setup(
    stacks: &[Chips],
    options: TableOptions,
) -> (Table, Vec<ID<Member>>, UnboundedReceiver<TableEvent>) {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let mut table = Table::new("test".into(), options);
    table.set_sink(tx);
    let mut users = Vec::new();
    for (seat, stack) in stacks.iter().enumerate() {
        let user = ID::default();
        table
            .seat_player(user, format!("p{}", seat), seat, 60)
            .unwrap();
        table.give_chips(user, *stack).unwrap();
        users.push(user);
    }
    (table, users, rx)
}

fn drain(rx: &mut UnboundedReceiver<TableEvent>) -> Vec<TableEvent> {
    let mut events = Vec::new();
    while let Ok(e) = rx.try_recv() {
        events.push(e);
    }
    events
}

fn stacks(table: &Table, users: &[ID<Member>]) -> Vec<Chips> {
    users
        .iter()
        .map(|u| table.player(*u).map(|p| p.chips()).unwrap_or(0))
        .collect()
}

/// Deck stacked for a 3-handed hand with dealer on seat 1: hole cards go
/// to seat 2, then seat 0, then seat 1, then burns and board.
fn stacked_three_handed() -> Deck {
    // seat2: queens, seat0: aces, seat1: kings; dry board
    Deck::from(Card::parse("Qs Qh As Ah Kd Kc 2d 2c 7d 9h 3d 3s 4d 5h").unwrap())
}

#[test]
fn heads_up_preflop_fold() {
    let (mut table, users, mut rx) = setup(&[100, 100], options());
    table.start_hand().unwrap();
    // dealer advanced to seat 1; dealer posts SB and acts first heads-up
    assert_eq!(table.dealer(), 1);
    assert_eq!(table.actor(), Some(users[1]));
    assert_eq!(table.player(users[1]).unwrap().wager(), 1);
    assert_eq!(table.player(users[0]).unwrap().wager(), 2);
    table.act(users[1], Action::Fold).unwrap();
    assert_eq!(table.stage(), Stage::Waiting);
    assert_eq!(stacks(&table, &users), vec![101, 99]);
    let result = drain(&mut rx)
        .into_iter()
        .find_map(|e| match e {
            TableEvent::HandResult(outcome) => Some(outcome),
            _ => None,
        })
        .expect("hand result emitted");
    assert_eq!(result.winners.len(), 1);
    assert_eq!(result.winners[0].amount, 3);
    assert_eq!(result.winners[0].hand, None);
    assert!(result.shown_hands.is_empty());
}

#[test]
fn three_player_limp_to_flop() {
    let (mut table, users, mut rx) = setup(&[100, 100, 100], options());
    table.start_hand().unwrap();
    // dealer seat 1, SB seat 2, BB seat 0, UTG seat 1
    assert_eq!(table.dealer(), 1);
    assert_eq!(table.actor(), Some(users[1]));
    table.act(users[1], Action::Call).unwrap();
    table.act(users[2], Action::Call).unwrap();
    // big blind has the option
    assert_eq!(table.actor(), Some(users[0]));
    assert!(table.valid_actions(users[0]).contains(&ActionKind::Check));
    table.act(users[0], Action::Check).unwrap();
    assert_eq!(table.stage(), Stage::Flop);
    assert_eq!(table.board().len(), 3);
    assert_eq!(table.pot_total(), 6);
    assert!(table.seats().values().all(|p| p.wager() == 0));
    let advanced = drain(&mut rx).into_iter().any(|e| {
        matches!(e, TableEvent::StateChanged { state: Stage::Flop, pot: 6, .. })
    });
    assert!(advanced);
    // first actor postflop is the first unfolded seat after the dealer
    assert_eq!(table.actor(), Some(users[2]));
}

#[test]
fn all_in_covered_by_both_wins_single_pot() {
    let (mut table, users, mut rx) = setup(&[30, 100, 100], options());
    table.start_hand_with(stacked_three_handed()).unwrap();
    // UTG (seat 1) and SB (seat 2) call, BB (seat 0) shoves 30
    table.act(users[1], Action::Call).unwrap();
    table.act(users[2], Action::Call).unwrap();
    table.act(users[0], Action::AllIn).unwrap();
    table.act(users[1], Action::Call).unwrap();
    table.act(users[2], Action::Call).unwrap();
    // betting continues between the two covered players
    for _ in 0..3 {
        table.act(users[2], Action::Check).unwrap();
        table.act(users[1], Action::Check).unwrap();
    }
    assert_eq!(table.stage(), Stage::Waiting);
    // aces (seat 0) scoop the only pot: 90 chips
    assert_eq!(stacks(&table, &users), vec![90, 70, 70]);
    let result = drain(&mut rx)
        .into_iter()
        .find_map(|e| match e {
            TableEvent::HandResult(outcome) => Some(outcome),
            _ => None,
        })
        .expect("hand result emitted");
    assert_eq!(result.winners.len(), 1);
    assert_eq!(result.winners[0].amount, 90);
    assert_eq!(result.winners[0].hand.as_deref(), Some("Pair"));
    assert_eq!(result.shown_hands.len(), 1);
}

#[test]
fn layered_all_ins_build_side_pots() {
    let (mut table, users, _rx) = setup(&[30, 60, 100], options());
    table.start_hand_with(stacked_three_handed()).unwrap();
    // UTG (seat 1) shoves 60, SB (seat 2) calls, BB (seat 0) shoves 30
    table.act(users[1], Action::AllIn).unwrap();
    table.act(users[2], Action::Call).unwrap();
    table.act(users[0], Action::AllIn).unwrap();
    // one able player left: board runs out to showdown
    assert_eq!(table.stage(), Stage::Waiting);
    // aces win the 90 main pot, kings the 60 side pot, C keeps 40 behind
    assert_eq!(stacks(&table, &users), vec![90, 60, 40]);
}

#[test]
fn chip_conservation_over_many_random_hands() {
    let (mut table, users, _rx) = setup(&[40, 75, 120, 200], options());
    let total: Chips = 435;
    for _ in 0..50 {
        if table.start_hand().is_err() {
            break;
        }
        let mut guard = 0;
        while let Some(actor) = table.actor() {
            let kinds = table.valid_actions(actor);
            // rotate through simple strategies to explore the space
            let action = match guard % 5 {
                0 if kinds.contains(&ActionKind::Check) => Action::Check,
                1 if kinds.contains(&ActionKind::Call) => Action::Call,
                2 if kinds.contains(&ActionKind::Bet) => Action::Bet(2),
                3 if kinds.contains(&ActionKind::AllIn) => Action::AllIn,
                _ if kinds.contains(&ActionKind::Check) => Action::Check,
                _ if kinds.contains(&ActionKind::Call) => Action::Call,
                _ => Action::Fold,
            };
            table.act(actor, action).unwrap();
            guard += 1;
            assert!(guard < 200, "hand failed to terminate");
        }
        assert_eq!(table.stage(), Stage::Waiting);
        let on_stacks: Chips = stacks(&table, &users).iter().sum();
        assert_eq!(on_stacks, total, "chips must be conserved after every hand");
    }
}

#[test]
fn illegal_actions_leave_state_untouched() {
    let (mut table, users, _rx) = setup(&[100, 100], options());
    table.start_hand().unwrap();
    let before = table.snapshot();
    // not your turn
    assert_eq!(
        table.act(users[0], Action::Fold),
        Err(GameError::NotYourTurn)
    );
    // cannot check facing the big blind
    assert_eq!(
        table.act(users[1], Action::Check),
        Err(GameError::IllegalAction(ActionKind::Check))
    );
    // raise below the minimum target
    assert_eq!(
        table.act(users[1], Action::Raise(3)),
        Err(GameError::RaiseTooSmall(4))
    );
    // cannot start mid-hand
    assert_eq!(table.start_hand(), Err(GameError::CannotStart));
    assert_eq!(table.snapshot(), before);
}

#[test]
fn seat_management_contract() {
    let (mut table, users, _rx) = setup(&[100], options());
    let user = ID::default();
    assert_eq!(
        table.seat_player(user, "late".into(), 99, 60),
        Err(GameError::InvalidSeat(99))
    );
    assert_eq!(
        table.seat_player(user, "late".into(), 0, 60),
        Err(GameError::SeatTaken(0))
    );
    table.seat_player(user, "late".into(), 3, 60).unwrap();
    assert_eq!(
        table.seat_player(user, "late".into(), 4, 60),
        Err(GameError::AlreadySeated)
    );
    table.unseat(user).unwrap();
    assert!(table.player(user).is_none());
    assert!(table.player(users[0]).is_some());
}

#[test]
fn leaving_mid_hand_folds_first() {
    let (mut table, users, _rx) = setup(&[100, 100, 100], options());
    table.start_hand().unwrap();
    // UTG leaves while facing the blinds; their hand dies with them
    table.unseat(users[1]).unwrap();
    assert!(table.player(users[1]).is_none());
    // remaining two finish the street
    table.act(users[2], Action::Call).unwrap();
    table.act(users[0], Action::Check).unwrap();
    assert_eq!(table.stage(), Stage::Flop);
    // UTG posted nothing, so only the completed blinds reach the pot
    assert_eq!(table.pot_total(), 4);
}

#[test]
fn timeout_auto_checks_when_free() {
    let mut opts = options();
    opts.turn_time_seconds = 0;
    // zero turn clock, zero bank: one elapsed second is a strict timeout
    let mut table = Table::new("timeout".into(), opts);
    let mut users = Vec::new();
    for seat in 0..3 {
        let user = ID::default();
        table
            .seat_player(user, format!("p{}", seat), seat, 0)
            .unwrap();
        table.give_chips(user, 100).unwrap();
        users.push(user);
    }
    table.start_hand().unwrap();
    table.act(users[1], Action::Call).unwrap();
    table.act(users[2], Action::Call).unwrap();
    // big blind on turn with nothing to call; clock expires strictly
    assert_eq!(table.actor(), Some(users[0]));
    assert!(table.poll_timeout().is_none());
    std::thread::sleep(std::time::Duration::from_millis(1200));
    let (user, kind) = table.poll_timeout().expect("auto action fires");
    assert_eq!(user, users[0]);
    assert_eq!(kind, ActionKind::Check);
    assert_eq!(table.stage(), Stage::Flop);
    // the turn has moved on; the timed-out player cannot act again
    assert_eq!(
        table.act(users[0], Action::Check),
        Err(GameError::NotYourTurn)
    );
}

#[test]
fn views_hide_hole_cards() {
    let (mut table, users, _rx) = setup(&[100, 100, 100], options());
    table.start_hand().unwrap();
    let view = table.view_for(Some(users[0]));
    for pv in view.players.iter() {
        match pv.is_you {
            true => assert!(pv.hole_cards.is_some()),
            false => assert!(pv.hole_cards.is_none()),
        }
        assert!(pv.has_cards);
    }
    // spectators see nobody's cards and no action fields
    let spectator = table.view_for(None);
    assert!(spectator.players.iter().all(|p| p.hole_cards.is_none()));
    assert!(spectator.valid_actions.is_empty());
    // only the actor sees their legal actions
    let idle = table.view_for(Some(users[0]));
    assert!(idle.valid_actions.is_empty());
    let acting = table.view_for(Some(users[1]));
    assert!(!acting.valid_actions.is_empty());
    assert_eq!(acting.call_amount, 2);
    assert_eq!(acting.min_raise, 4);
}

#[test]
fn snapshot_roundtrip_preserves_future() {
    let (mut table, users, _rx) = setup(&[100, 100, 100], options());
    table.start_hand().unwrap();
    table.act(users[1], Action::Call).unwrap();
    let snapshot = table.snapshot();
    let mut restored = Table::restore(snapshot.clone()).unwrap();
    assert_eq!(restored.snapshot(), snapshot);
    // both tables evolve identically from here, deck included
    table.act(users[2], Action::Call).unwrap();
    restored.act(users[2], Action::Call).unwrap();
    table.act(users[0], Action::Check).unwrap();
    restored.act(users[0], Action::Check).unwrap();
    assert_eq!(restored.snapshot(), table.snapshot());
    assert_eq!(restored.board(), table.board());
}

#[test]
fn admin_chip_operations() {
    let (mut table, users, _rx) = setup(&[100], options());
    assert_eq!(table.give_chips(users[0], 50), Ok(150));
    assert_eq!(table.take_chips(users[0], 200), Err(GameError::InsufficientChips));
    assert_eq!(table.take_chips(users[0], 50), Ok(100));
    assert_eq!(table.give_chips(users[0], 0), Err(GameError::BadChipAmount));
    assert_eq!(table.set_stack(users[0], 40), Ok((-60, 40)));
    assert_eq!(table.set_stack(users[0], 100), Ok((60, 100)));
    assert_eq!(table.set_stack(users[0], -1), Err(GameError::BadChipAmount));
}
