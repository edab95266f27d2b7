use super::action::Action;
use super::action::ActionKind;
use super::error::GameError;
use super::event::HandOutcome;
use super::event::PotWin;
use super::event::TableEvent;
use super::player::Player;
use super::pot::Pot;
use super::pot::payout;
use super::round::Round;
use hg_cards::Card;
use hg_cards::Deck;
use hg_cards::Hand;
use hg_cards::Strength;
use hg_core::Chips;
use hg_core::ID;
use hg_core::Member;
use hg_core::Seat;
use std::collections::BTreeMap;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;

/// Where a table is in the life of a hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Waiting,
    Starting,
    Preflop,
    Flop,
    Turn,
    River,
    Showdown,
    HandComplete,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Stage::Waiting => write!(f, "waiting"),
            Stage::Starting => write!(f, "starting"),
            Stage::Preflop => write!(f, "preflop"),
            Stage::Flop => write!(f, "flop"),
            Stage::Turn => write!(f, "turn"),
            Stage::River => write!(f, "river"),
            Stage::Showdown => write!(f, "showdown"),
            Stage::HandComplete => write!(f, "hand_complete"),
        }
    }
}

/// Knobs fixed at table creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TableOptions {
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub min_players: usize,
    pub max_players: usize,
    pub turn_time_seconds: u64,
    pub time_bank_replenish: u64,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            small_blind: 1,
            big_blind: 2,
            min_players: 2,
            max_players: 10,
            turn_time_seconds: 30,
            time_bank_replenish: 10,
        }
    }
}

/// The current actor's clock, as the viewer sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnClock {
    pub user: ID<Member>,
    pub remaining: u64,
    pub bank_active: bool,
    pub bank: u64,
}

/// A single poker table.
///
/// Owns the seats, the button, the deck, the pot, and the betting round,
/// and drives the hand through its stages. All mutation happens through
/// methods that either complete atomically or return a [`GameError`]
/// without touching state. Observable transitions are pushed through the
/// event sink installed by [`set_sink`](Self::set_sink).
///
/// Serializing a table captures the whole hand, deck included, so a
/// restored table deals the same run-out; only the wall clock and the
/// event sink are dropped and re-armed by the owner.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Table {
    id: ID<Table>,
    name: String,
    options: TableOptions,
    seats: BTreeMap<Seat, Player>,
    dealer: Seat,
    board: Vec<Card>,
    deck: Deck,
    pot: Pot,
    stage: Stage,
    hand_number: u64,
    round: Option<Round>,
    #[serde(skip)]
    turn_started: Option<Instant>,
    #[serde(skip)]
    sink: Option<UnboundedSender<TableEvent>>,
}

/// Construction and plumbing.
impl Table {
    pub fn new(name: String, options: TableOptions) -> Self {
        Self {
            id: ID::default(),
            name,
            options,
            seats: BTreeMap::new(),
            dealer: 0,
            board: Vec::new(),
            deck: Deck::new(),
            pot: Pot::default(),
            stage: Stage::Waiting,
            hand_number: 0,
            round: None,
            turn_started: None,
            sink: None,
        }
    }
    /// Installs the event channel the hub consumes.
    pub fn set_sink(&mut self, sink: UnboundedSender<TableEvent>) {
        self.sink = Some(sink);
    }
    fn emit(&self, event: TableEvent) {
        if let Some(Err(e)) = self.sink.as_ref().map(|tx| tx.send(event)) {
            log::warn!("[table] event sink closed: {:?}", e);
        }
    }
}

/// Public state accessors.
impl Table {
    pub fn id(&self) -> ID<Table> {
        self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn options(&self) -> &TableOptions {
        &self.options
    }
    pub fn stage(&self) -> Stage {
        self.stage
    }
    pub fn hand_number(&self) -> u64 {
        self.hand_number
    }
    pub fn dealer(&self) -> Seat {
        self.dealer
    }
    pub fn board(&self) -> &[Card] {
        &self.board
    }
    pub fn seats(&self) -> &BTreeMap<Seat, Player> {
        &self.seats
    }
    pub fn occupancy(&self) -> usize {
        self.seats.len()
    }
    pub fn round(&self) -> Option<&Round> {
        self.round.as_ref()
    }
    /// Chips in the middle plus live street wagers.
    pub fn pot_total(&self) -> Chips {
        self.pot.total() + self.seats.values().map(Player::wager).sum::<Chips>()
    }
    pub fn player(&self, user: ID<Member>) -> Option<&Player> {
        self.seats.values().find(|p| p.user() == user)
    }
    pub fn player_by_name(&self, username: &str) -> Option<&Player> {
        self.seats
            .values()
            .find(|p| p.username().eq_ignore_ascii_case(username))
    }
    pub fn seat_of(&self, user: ID<Member>) -> Option<Seat> {
        self.player(user).map(Player::seat)
    }
    /// The player on turn, if a betting round is live.
    pub fn actor(&self) -> Option<ID<Member>> {
        self.round.as_ref().and_then(|r| r.actor(&self.seats))
    }
    /// Legal action kinds for a user; empty off-turn.
    pub fn valid_actions(&self, user: ID<Member>) -> Vec<ActionKind> {
        match (self.actor(), self.round.as_ref(), self.player(user)) {
            (Some(actor), Some(round), Some(player)) if actor == user => round.options(player),
            _ => Vec::new(),
        }
    }
}

/// Seat management.
impl Table {
    pub fn seat_player(
        &mut self,
        user: ID<Member>,
        username: String,
        seat: Seat,
        time_bank: u64,
    ) -> Result<(), GameError> {
        if seat >= self.options.max_players {
            return Err(GameError::InvalidSeat(seat));
        }
        if self.seats.contains_key(&seat) {
            return Err(GameError::SeatTaken(seat));
        }
        if self.seats.len() >= self.options.max_players {
            return Err(GameError::TableFull);
        }
        if self.player(user).is_some() {
            return Err(GameError::AlreadySeated);
        }
        log::info!("[table] {} takes seat {} at {}", username, seat, self.name);
        self.seats
            .insert(seat, Player::new(user, username, seat, time_bank));
        Ok(())
    }

    /// Moves a seated player to a free seat (reconnect seat change).
    pub fn move_player(&mut self, user: ID<Member>, seat: Seat) -> Result<(), GameError> {
        if seat >= self.options.max_players {
            return Err(GameError::InvalidSeat(seat));
        }
        if self.seats.contains_key(&seat) {
            return Err(GameError::SeatTaken(seat));
        }
        let old = self.seat_of(user).ok_or(GameError::PlayerNotFound)?;
        let mut player = self.seats.remove(&old).expect("seat occupied");
        player.set_seat(seat);
        self.seats.insert(seat, player);
        Ok(())
    }

    /// Removes a player, folding them out first if they are in the hand.
    pub fn unseat(&mut self, user: ID<Member>) -> Result<Player, GameError> {
        let seat = self.seat_of(user).ok_or(GameError::PlayerNotFound)?;
        self.fold_out(user);
        let player = self.seats.remove(&seat).expect("seat occupied");
        log::info!("[table] {} leaves {}", player.username(), self.name);
        Ok(player)
    }

    /// Out-of-turn fold for leavers, sweeps, and displacement. Silent if
    /// the user has no live hand. May complete the street and cascade.
    pub fn fold_out(&mut self, user: ID<Member>) {
        let live = self
            .player(user)
            .map(|p| p.in_hand() && self.round.is_some())
            .unwrap_or(false);
        if !live {
            return;
        }
        let seat = self.seat_of(user).expect("checked above");
        self.seats.get_mut(&seat).expect("seat occupied").fold();
        let round = self.round.as_mut().expect("checked above");
        round.refresh(&self.seats);
        match round.complete() {
            true => self.end_street(),
            false => self.turn_started = Some(Instant::now()),
        }
    }

    pub fn set_disconnected(&mut self, user: ID<Member>, disconnected: bool) {
        if let Some(seat) = self.seat_of(user) {
            self.seats
                .get_mut(&seat)
                .expect("seat occupied")
                .set_disconnected(disconnected);
        }
    }
}

/// Hand lifecycle.
impl Table {
    /// True when a new hand may begin: table idle and enough funded,
    /// present players.
    pub fn can_start_hand(&self) -> bool {
        self.stage == Stage::Waiting
            && self
                .seats
                .values()
                .filter(|p| !p.sitting_out() && p.chips() > 0)
                .count()
                >= self.options.min_players
    }

    /// Starts a hand with a freshly shuffled deck.
    pub fn start_hand(&mut self) -> Result<(), GameError> {
        self.start_hand_with(Deck::new())
    }

    /// Starts a hand with the given deck. Deterministic entry point for
    /// tests and simulations; production callers use [`start_hand`].
    ///
    /// [`start_hand`]: Self::start_hand
    pub fn start_hand_with(&mut self, deck: Deck) -> Result<(), GameError> {
        if !self.can_start_hand() {
            return Err(GameError::CannotStart);
        }
        self.hand_number += 1;
        self.stage = Stage::Starting;
        self.advance_dealer();
        self.deck = deck;
        self.pot.reset();
        self.board.clear();
        for player in self.seats.values_mut() {
            player.reset_for_hand(self.options.time_bank_replenish);
        }
        let ring = self.ready_ring();
        debug_assert!(ring.len() >= self.options.min_players);
        // heads-up: the dealer is the small blind and acts first preflop
        let (sb, bb) = match ring.len() {
            2 => (ring[1], ring[0]),
            _ => (ring[0], ring[1]),
        };
        self.post_blind(sb, self.options.small_blind);
        self.post_blind(bb, self.options.big_blind);
        for seat in ring.iter() {
            let hole = self.deck.hole();
            self.seats.get_mut(seat).expect("ready seat").deal(hole);
        }
        let first = match ring.len() {
            2 => vec![ring[1], ring[0]],
            _ => ring[2..].iter().chain(ring[..2].iter()).copied().collect(),
        };
        let order = first
            .iter()
            .map(|s| self.seats[s].user())
            .collect::<Vec<ID<Member>>>();
        let poster = self.seats[&bb].user();
        self.round = Some(Round::new(order, self.options.big_blind, true, Some(poster)));
        self.stage = Stage::Preflop;
        self.turn_started = Some(Instant::now());
        log::info!(
            "[table] hand #{} started at {} with dealer seat {}",
            self.hand_number,
            self.name,
            self.dealer
        );
        self.emit(TableEvent::HandStarted {
            hand_number: self.hand_number,
            dealer_seat: self.dealer,
        });
        Ok(())
    }

    fn advance_dealer(&mut self) {
        self.dealer = self
            .seats
            .keys()
            .copied()
            .find(|s| *s > self.dealer)
            .or_else(|| self.seats.keys().copied().next())
            .unwrap_or(0);
    }

    fn post_blind(&mut self, seat: Seat, blind: Chips) {
        let player = self.seats.get_mut(&seat).expect("ready seat");
        let posted = player.bet(blind);
        log::debug!("[table] {} posts blind {}", player.username(), posted);
    }
}

/// Player actions.
impl Table {
    /// Applies one action for the player on turn.
    ///
    /// Charges time-bank overage, applies through the betting round, emits
    /// the action event, and advances the street when the round closes.
    pub fn act(&mut self, user: ID<Member>, action: Action) -> Result<(), GameError> {
        let round = self.round.as_ref().ok_or(GameError::NoRound)?;
        let actor = round.actor(&self.seats).ok_or(GameError::NoRound)?;
        if actor != user {
            return Err(GameError::NotYourTurn);
        }
        let amount = self
            .round
            .as_mut()
            .expect("checked above")
            .apply(&mut self.seats, user, action)?;
        self.charge_time_bank(user);
        let username = self
            .player(user)
            .map(|p| p.username().to_string())
            .unwrap_or_default();
        log::info!("[table] {} {} at {}", username, action, self.name);
        self.emit(TableEvent::PlayerAction {
            user,
            username,
            kind: action.kind(),
            amount,
        });
        self.turn_started = Some(Instant::now());
        if self.round.as_ref().map(Round::complete).unwrap_or(false) {
            self.end_street();
        }
        Ok(())
    }

    fn charge_time_bank(&mut self, user: ID<Member>) {
        let elapsed = self
            .turn_started
            .map(|t| t.elapsed().as_secs())
            .unwrap_or(0);
        if elapsed > self.options.turn_time_seconds {
            let over = elapsed - self.options.turn_time_seconds;
            if let Some(seat) = self.seat_of(user) {
                self.seats
                    .get_mut(&seat)
                    .expect("seat occupied")
                    .use_time_bank(over);
            }
        }
    }
}

/// Street transitions.
impl Table {
    fn end_street(&mut self) {
        let wagers = self
            .seats
            .values_mut()
            .map(|p| (p.user(), p.clear_wager()))
            .collect::<Vec<(ID<Member>, Chips)>>();
        for (user, wager) in wagers {
            self.pot.contribute(user, wager);
        }
        let unfolded = self.seats.values().filter(|p| p.in_hand()).count();
        let able = self.seats.values().filter(|p| p.can_act()).count();
        if unfolded <= 1 {
            return self.conclude_uncontested();
        }
        if able <= 1 {
            self.run_out();
            return self.conclude_showdown();
        }
        match self.stage {
            Stage::Preflop => {
                self.stage = Stage::Flop;
                self.deal_community(3);
            }
            Stage::Flop => {
                self.stage = Stage::Turn;
                self.deal_community(1);
            }
            Stage::Turn => {
                self.stage = Stage::River;
                self.deal_community(1);
            }
            Stage::River => return self.conclude_showdown(),
            _ => unreachable!("no betting round outside streets"),
        }
        self.open_round();
        self.emit(TableEvent::StateChanged {
            state: self.stage,
            community_cards: self.board.clone(),
            pot: self.pot.total(),
        });
    }

    fn deal_community(&mut self, n: usize) {
        self.deck.burn();
        for _ in 0..n {
            let card = self.deck.draw();
            self.board.push(card);
        }
        log::debug!("[table] board at {}: {:?}", self.name, self.board);
    }

    /// Deals the board to completion when no more betting is possible.
    fn run_out(&mut self) {
        while self.board.len() < 5 {
            match self.board.is_empty() {
                true => self.deal_community(3),
                false => self.deal_community(1),
            }
        }
    }

    fn open_round(&mut self) {
        let order = self
            .ring_after_dealer()
            .into_iter()
            .filter(|s| self.seats[s].in_hand())
            .map(|s| self.seats[&s].user())
            .collect::<Vec<ID<Member>>>();
        self.round = Some(Round::new(order, self.options.big_blind, false, None));
        self.turn_started = Some(Instant::now());
    }
}

/// Settlement.
impl Table {
    fn conclude_showdown(&mut self) {
        self.stage = Stage::Showdown;
        let community = Hand::from(self.board.clone());
        let strengths = self
            .seats
            .values()
            .filter(|p| p.in_hand())
            .filter_map(|p| p.hole().map(|h| (p.user(), h)))
            .map(|(u, h)| (u, Strength::from(Hand::or(Hand::from(h), community))))
            .collect::<BTreeMap<ID<Member>, Strength>>();
        let all_in = self
            .seats
            .values()
            .filter(|p| p.in_hand() && p.all_in())
            .map(|p| (p.user(), self.pot.contribution(p.user())))
            .collect::<BTreeMap<ID<Member>, Chips>>();
        let pots = self.pot.side_pots(&all_in);
        let priority = self
            .ring_after_dealer()
            .into_iter()
            .map(|s| self.seats[&s].user())
            .collect::<Vec<ID<Member>>>();
        let winnings = payout(&pots, &strengths, &priority);
        let mut winners = Vec::new();
        let mut shown = BTreeMap::new();
        for user in priority.iter().filter(|u| winnings.contains_key(*u)) {
            let amount = winnings[user];
            let player = self.player(*user).expect("winner is seated");
            winners.push(PotWin {
                user_id: user.to_string(),
                username: player.username().to_string(),
                amount,
                hand: strengths.get(user).map(|s| s.ranking().label().to_string()),
            });
            if let (Some(_), Some(hole)) = (strengths.get(user), player.hole()) {
                shown.insert(user.to_string(), hole.glyphs());
            }
        }
        let seatless = winnings
            .keys()
            .filter(|u| self.player(**u).is_none())
            .collect::<Vec<_>>();
        for user in seatless {
            log::warn!("[table] {} won chips after leaving {}", user, self.name);
        }
        for (user, amount) in winnings.iter() {
            if let Some(seat) = self.seat_of(*user) {
                self.seats.get_mut(&seat).expect("seat occupied").win(*amount);
            }
        }
        log::info!(
            "[table] hand #{} at {} pays {:?}",
            self.hand_number,
            self.name,
            winners.iter().map(|w| (&w.username, w.amount)).collect::<Vec<_>>()
        );
        let outcome = HandOutcome {
            winners,
            pot_total: self.pot.total(),
            community_cards: self.board.clone(),
            shown_hands: shown,
        };
        self.stage = Stage::HandComplete;
        self.emit(TableEvent::HandResult(outcome));
        self.finish_hand();
    }

    fn conclude_uncontested(&mut self) {
        let outcome = match self.seats.values().find(|p| p.in_hand()) {
            Some(winner) => {
                let user = winner.user();
                let username = winner.username().to_string();
                let amount = self.pot.total();
                let seat = winner.seat();
                self.seats.get_mut(&seat).expect("seat occupied").win(amount);
                log::info!("[table] {} wins {} uncontested at {}", username, amount, self.name);
                HandOutcome {
                    winners: vec![PotWin {
                        user_id: user.to_string(),
                        username,
                        amount,
                        hand: None,
                    }],
                    pot_total: amount,
                    community_cards: self.board.clone(),
                    shown_hands: BTreeMap::new(),
                }
            }
            // every contender left mid-hand; contributions go back to
            // whoever is still seated to keep chips conserved
            None => {
                let refunds = self
                    .pot
                    .contributions()
                    .iter()
                    .map(|(u, c)| (*u, *c))
                    .collect::<Vec<(ID<Member>, Chips)>>();
                for (user, amount) in refunds {
                    if let Some(seat) = self.seat_of(user) {
                        self.seats.get_mut(&seat).expect("seat occupied").win(amount);
                    } else {
                        log::warn!("[table] forfeiting {} chips from departed {}", amount, user);
                    }
                }
                HandOutcome {
                    winners: Vec::new(),
                    pot_total: self.pot.total(),
                    community_cards: self.board.clone(),
                    shown_hands: BTreeMap::new(),
                }
            }
        };
        self.stage = Stage::HandComplete;
        self.emit(TableEvent::HandResult(outcome));
        self.finish_hand();
    }

    fn finish_hand(&mut self) {
        self.round = None;
        self.turn_started = None;
        self.pot.reset();
        self.stage = Stage::Waiting;
        log::info!("[table] hand #{} complete at {}", self.hand_number, self.name);
    }
}

/// Turn clock.
impl Table {
    /// The current actor's remaining time, bank included.
    pub fn clock(&self) -> Option<TurnClock> {
        let round = self.round.as_ref()?;
        let user = round.actor(&self.seats)?;
        let elapsed = self.turn_started?.elapsed().as_secs();
        let bank = self.player(user)?.time_bank();
        Some(TurnClock {
            user,
            remaining: (self.options.turn_time_seconds + bank).saturating_sub(elapsed),
            bank_active: elapsed > self.options.turn_time_seconds,
            bank,
        })
    }

    /// Applies the auto-action when the actor's clock (bank included) has
    /// strictly expired: check where legal, fold otherwise. Returns what
    /// was applied.
    pub fn poll_timeout(&mut self) -> Option<(ID<Member>, ActionKind)> {
        let round = self.round.as_ref()?;
        let user = round.actor(&self.seats)?;
        let elapsed = self.turn_started?.elapsed().as_secs();
        let bank = self.player(user)?.time_bank();
        if elapsed <= self.options.turn_time_seconds + bank {
            return None;
        }
        let auto = match round.options(self.player(user)?).contains(&ActionKind::Check) {
            true => Action::Check,
            false => Action::Fold,
        };
        log::info!(
            "[table] {} timed out at {}, auto {}",
            self.player(user).map(Player::username).unwrap_or(""),
            self.name,
            auto
        );
        match self.act(user, auto) {
            Ok(()) => Some((user, auto.kind())),
            Err(e) => {
                log::error!("[table] auto action failed at {}: {}", self.name, e);
                None
            }
        }
    }
}

/// Admin chip operations.
impl Table {
    pub fn give_chips(&mut self, user: ID<Member>, amount: Chips) -> Result<Chips, GameError> {
        if amount <= 0 {
            return Err(GameError::BadChipAmount);
        }
        let seat = self.seat_of(user).ok_or(GameError::PlayerNotFound)?;
        let player = self.seats.get_mut(&seat).expect("seat occupied");
        player.set_chips(player.chips() + amount);
        Ok(player.chips())
    }

    pub fn take_chips(&mut self, user: ID<Member>, amount: Chips) -> Result<Chips, GameError> {
        if amount <= 0 {
            return Err(GameError::BadChipAmount);
        }
        let seat = self.seat_of(user).ok_or(GameError::PlayerNotFound)?;
        let player = self.seats.get_mut(&seat).expect("seat occupied");
        if player.chips() < amount {
            return Err(GameError::InsufficientChips);
        }
        player.set_chips(player.chips() - amount);
        Ok(player.chips())
    }

    /// Sets the stack outright, returning `(delta, new stack)`; the delta
    /// lands on the ledger as a signed adjustment.
    pub fn set_stack(&mut self, user: ID<Member>, amount: Chips) -> Result<(Chips, Chips), GameError> {
        if amount < 0 {
            return Err(GameError::BadChipAmount);
        }
        let seat = self.seat_of(user).ok_or(GameError::PlayerNotFound)?;
        let player = self.seats.get_mut(&seat).expect("seat occupied");
        let delta = amount - player.chips();
        player.set_chips(amount);
        Ok((delta, player.chips()))
    }
}

/// Snapshots.
impl Table {
    /// Full server-side snapshot, hole cards and deck included.
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("table serializes")
    }
    /// Restores a table from a snapshot; the sink and clock re-arm later.
    pub fn restore(snapshot: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(snapshot)
    }
}

/// Ring arithmetic.
impl Table {
    /// Occupied seats in ascending order starting one seat after the
    /// dealer, dealer last.
    fn ring_after_dealer(&self) -> Vec<Seat> {
        let mut ring = self
            .seats
            .keys()
            .copied()
            .filter(|s| *s > self.dealer)
            .collect::<Vec<Seat>>();
        ring.extend(self.seats.keys().copied().filter(|s| *s <= self.dealer));
        ring
    }
    /// The ring filtered to players who can be dealt in.
    fn ready_ring(&self) -> Vec<Seat> {
        self.ring_after_dealer()
            .into_iter()
            .filter(|s| {
                let p = &self.seats[s];
                !p.sitting_out() && p.chips() > 0
            })
            .collect()
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "{} [{}] pot {}", self.name, self.stage, self.pot_total())?;
        for player in self.seats.values() {
            writeln!(f, "  {}", player)?;
        }
        Ok(())
    }
}
