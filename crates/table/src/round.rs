use super::action::Action;
use super::action::ActionKind;
use super::error::GameError;
use super::player::Player;
use hg_core::Chips;
use hg_core::ID;
use hg_core::Member;
use hg_core::Seat;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// One street of betting.
///
/// Holds the action ring, the current high bet, the minimum legal raise
/// increment, the last aggressor, and which players have acted since the
/// last *full* raise. The round never touches chips itself beyond moving
/// them from a player's stack into their wager; the table folds wagers
/// into the pot when the street ends.
///
/// # Incomplete all-ins
///
/// An all-in that raises by less than the minimum increment still lifts
/// `current_bet`, but it neither bumps `min_raise` nor reopens action for
/// players whose wagers already matched the prior bet. A full-raise
/// all-in reopens action like any raise.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Round {
    order: Vec<ID<Member>>,
    action_on: usize,
    current_bet: Chips,
    min_raise: Chips,
    aggressor: Option<ID<Member>>,
    acted: BTreeSet<ID<Member>>,
    complete: bool,
    big_blind: Chips,
}

impl Round {
    /// Opens a round over players in action order, first actor at index 0.
    /// Preflop starts at the big blind with the BB poster as aggressor;
    /// later streets start unopened.
    pub fn new(
        order: Vec<ID<Member>>,
        big_blind: Chips,
        preflop: bool,
        aggressor: Option<ID<Member>>,
    ) -> Self {
        Self {
            order,
            action_on: 0,
            current_bet: if preflop { big_blind } else { 0 },
            min_raise: big_blind,
            aggressor: if preflop { aggressor } else { None },
            acted: BTreeSet::new(),
            complete: false,
            big_blind,
        }
    }

    pub fn current_bet(&self) -> Chips {
        self.current_bet
    }
    /// The minimum legal raise *target* (current bet plus increment).
    pub fn min_raise_target(&self) -> Chips {
        self.current_bet + self.min_raise
    }
    pub fn aggressor(&self) -> Option<ID<Member>> {
        self.aggressor
    }
    pub fn complete(&self) -> bool {
        self.complete
    }

    /// The player on turn, or None once the round is complete.
    pub fn actor(&self, seats: &BTreeMap<Seat, Player>) -> Option<ID<Member>> {
        self.actor_idx(seats).map(|i| self.order[i])
    }

    fn actor_idx(&self, seats: &BTreeMap<Seat, Player>) -> Option<usize> {
        if self.complete {
            return None;
        }
        (0..self.order.len())
            .map(|step| (self.action_on + step) % self.order.len())
            .find(|i| {
                self.lookup(seats, self.order[*i])
                    .map(Player::can_act)
                    .unwrap_or(false)
            })
    }

    fn lookup<'a>(
        &self,
        seats: &'a BTreeMap<Seat, Player>,
        user: ID<Member>,
    ) -> Option<&'a Player> {
        seats.values().find(|p| p.user() == user)
    }

    /// The action kinds legal for a player right now.
    ///
    /// A player who already acted since the last full raise has no raising
    /// rights: an incomplete all-in may have lifted the bet since, and that
    /// does not reopen action. All-in itself stays available with any stack.
    pub fn options(&self, player: &Player) -> Vec<ActionKind> {
        let mut kinds = vec![ActionKind::Fold];
        match self.current_bet > player.wager() {
            false => kinds.push(ActionKind::Check),
            true => kinds.push(ActionKind::Call),
        }
        if player.chips() > 0 {
            kinds.push(ActionKind::AllIn);
        }
        if player.chips() + player.wager() >= self.min_raise_target()
            && !self.acted.contains(&player.user())
        {
            match self.current_bet == 0 {
                true => kinds.push(ActionKind::Bet),
                false => kinds.push(ActionKind::Raise),
            }
        }
        kinds
    }

    /// Chips the player must add to match the current bet.
    pub fn call_amount(&self, player: &Player) -> Chips {
        (self.current_bet - player.wager()).min(player.chips())
    }

    /// Validates and applies one action for the player on turn, then
    /// advances the turn pointer and recomputes completion.
    /// Returns the chip amount that headlines the action event.
    pub fn apply(
        &mut self,
        seats: &mut BTreeMap<Seat, Player>,
        user: ID<Member>,
        action: Action,
    ) -> Result<Chips, GameError> {
        let idx = self.actor_idx(seats).ok_or(GameError::NoRound)?;
        if self.order[idx] != user {
            return Err(GameError::NotYourTurn);
        }
        let seat = seats
            .values()
            .find(|p| p.user() == user)
            .map(Player::seat)
            .ok_or(GameError::PlayerNotFound)?;
        let player = seats.get_mut(&seat).expect("seat resolved above");
        if !self.options(player).contains(&action.kind()) {
            return Err(GameError::IllegalAction(action.kind()));
        }
        let amount = match action {
            Action::Fold => {
                player.fold();
                0
            }
            Action::Check => 0,
            Action::Call => {
                let call = self.call_amount(player);
                player.bet(call)
            }
            Action::Bet(amount) => {
                if amount < self.big_blind {
                    return Err(GameError::BetTooSmall(self.big_blind));
                }
                if amount > player.chips() {
                    return Err(GameError::InsufficientChips);
                }
                player.bet(amount);
                self.open(player.user(), player.wager(), amount);
                amount
            }
            Action::Raise(target) => {
                if target < self.min_raise_target() {
                    return Err(GameError::RaiseTooSmall(self.min_raise_target()));
                }
                if target - player.wager() > player.chips() {
                    return Err(GameError::InsufficientChips);
                }
                player.bet(target - player.wager());
                self.open(player.user(), player.wager(), player.wager() - self.current_bet);
                target
            }
            Action::AllIn => {
                player.bet(player.chips());
                let wager = player.wager();
                if wager > self.current_bet {
                    let increment = wager - self.current_bet;
                    match increment >= self.min_raise {
                        // full raise: reopens action
                        true => self.open(player.user(), wager, increment),
                        // incomplete: lifts the bet, action stays closed
                        false => self.current_bet = wager,
                    }
                }
                wager
            }
        };
        self.acted.insert(user);
        self.action_on = (idx + 1) % self.order.len();
        self.refresh(seats);
        Ok(amount)
    }

    /// A bet or full raise: new high bet, fresh increment, action reopens.
    fn open(&mut self, user: ID<Member>, wager: Chips, increment: Chips) {
        self.current_bet = wager;
        self.min_raise = self.min_raise.max(increment);
        self.aggressor = Some(user);
        self.acted.clear();
    }

    /// Recomputes completion after any action or out-of-turn fold.
    pub fn refresh(&mut self, seats: &BTreeMap<Seat, Player>) {
        let present = self
            .order
            .iter()
            .filter_map(|u| self.lookup(seats, *u))
            .collect::<Vec<&Player>>();
        let unfolded = present
            .iter()
            .copied()
            .filter(|p| p.in_hand())
            .collect::<Vec<&Player>>();
        let able = unfolded
            .iter()
            .copied()
            .filter(|p| p.can_act())
            .collect::<Vec<&Player>>();
        let matched = unfolded
            .iter()
            .all(|p| p.wager() == self.current_bet || p.all_in());
        let settled = able.iter().all(|p| self.acted.contains(&p.user()));
        self.complete = unfolded.len() <= 1 || able.is_empty() || (matched && settled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hg_cards::Card;
    use hg_cards::Hole;

    fn seated(stacks: &[Chips]) -> (BTreeMap<Seat, Player>, Vec<ID<Member>>) {
        let holes = ["As Kd", "Qh Qs", "7c 2d", "Jh Td"];
        let mut seats = BTreeMap::new();
        let mut users = Vec::new();
        for (i, stack) in stacks.iter().enumerate() {
            let mut p = Player::new(ID::default(), format!("p{}", i), i, 60);
            p.set_chips(*stack);
            let cards = Card::parse(holes[i]).unwrap();
            p.deal(Hole::from((cards[0], cards[1])));
            users.push(p.user());
            seats.insert(i, p);
        }
        (seats, users)
    }

    fn by_user<'a>(seats: &'a BTreeMap<Seat, Player>, user: ID<Member>) -> &'a Player {
        seats.values().find(|p| p.user() == user).unwrap()
    }

    #[test]
    fn check_around_completes() {
        let (mut seats, users) = seated(&[100, 100, 100]);
        let mut round = Round::new(users.clone(), 2, false, None);
        for u in users.iter() {
            round.apply(&mut seats, *u, Action::Check).unwrap();
        }
        assert!(round.complete());
    }

    #[test]
    fn out_of_turn_is_rejected() {
        let (mut seats, users) = seated(&[100, 100]);
        let mut round = Round::new(users.clone(), 2, false, None);
        let err = round.apply(&mut seats, users[1], Action::Check);
        assert_eq!(err, Err(GameError::NotYourTurn));
    }

    #[test]
    fn bet_reopens_action() {
        let (mut seats, users) = seated(&[100, 100, 100]);
        let mut round = Round::new(users.clone(), 2, false, None);
        round.apply(&mut seats, users[0], Action::Check).unwrap();
        round.apply(&mut seats, users[1], Action::Bet(10)).unwrap();
        round.apply(&mut seats, users[2], Action::Call).unwrap();
        assert!(!round.complete());
        round.apply(&mut seats, users[0], Action::Call).unwrap();
        assert!(round.complete());
        assert_eq!(round.current_bet(), 10);
    }

    #[test]
    fn raise_target_must_cover_increment() {
        let (mut seats, users) = seated(&[100, 100]);
        let mut round = Round::new(users.clone(), 2, false, None);
        round.apply(&mut seats, users[0], Action::Bet(10)).unwrap();
        let err = round.apply(&mut seats, users[1], Action::Raise(15));
        assert_eq!(err, Err(GameError::RaiseTooSmall(20)));
        round.apply(&mut seats, users[1], Action::Raise(20)).unwrap();
        assert_eq!(round.min_raise_target(), 30);
    }

    #[test]
    fn check_facing_bet_is_illegal() {
        let (mut seats, users) = seated(&[100, 100]);
        let mut round = Round::new(users.clone(), 2, false, None);
        round.apply(&mut seats, users[0], Action::Bet(10)).unwrap();
        let err = round.apply(&mut seats, users[1], Action::Check);
        assert_eq!(err, Err(GameError::IllegalAction(ActionKind::Check)));
    }

    #[test]
    fn preflop_big_blind_gets_the_option() {
        // blinds posted as wagers before the round opens
        let (mut seats, users) = seated(&[100, 100, 100]);
        seats.get_mut(&1).unwrap().bet(1);
        seats.get_mut(&2).unwrap().bet(2);
        // UTG first: order rotated to seat 0
        let order = vec![users[0], users[1], users[2]];
        let mut round = Round::new(order, 2, true, Some(users[2]));
        round.apply(&mut seats, users[0], Action::Call).unwrap();
        round.apply(&mut seats, users[1], Action::Call).unwrap();
        assert!(!round.complete());
        round.apply(&mut seats, users[2], Action::Check).unwrap();
        assert!(round.complete());
    }

    #[test]
    fn incomplete_all_in_does_not_reopen() {
        // seat 0 bets 10, seat 1 shoves 16 (short of the 20 target),
        // seat 2 calls 16, seat 0 calls the extra 6 and the round closes
        let (mut seats, users) = seated(&[100, 16, 100]);
        let mut round = Round::new(users.clone(), 2, false, None);
        round.apply(&mut seats, users[0], Action::Bet(10)).unwrap();
        round.apply(&mut seats, users[1], Action::AllIn).unwrap();
        assert_eq!(round.current_bet(), 16);
        assert_eq!(round.min_raise_target(), 26); // increment still 10
        assert_eq!(round.aggressor(), Some(users[0]));
        round.apply(&mut seats, users[2], Action::Call).unwrap();
        round.apply(&mut seats, users[0], Action::Call).unwrap();
        assert!(round.complete());
    }

    #[test]
    fn full_raise_all_in_reopens() {
        let (mut seats, users) = seated(&[100, 30, 100]);
        let mut round = Round::new(users.clone(), 2, false, None);
        round.apply(&mut seats, users[0], Action::Bet(10)).unwrap();
        round.apply(&mut seats, users[1], Action::AllIn).unwrap();
        assert_eq!(round.current_bet(), 30);
        assert_eq!(round.aggressor(), Some(users[1]));
        round.apply(&mut seats, users[2], Action::Call).unwrap();
        assert!(!round.complete());
        round.apply(&mut seats, users[0], Action::Call).unwrap();
        assert!(round.complete());
    }

    #[test]
    fn fold_to_one_completes() {
        let (mut seats, users) = seated(&[100, 100]);
        let mut round = Round::new(users.clone(), 2, false, None);
        round.apply(&mut seats, users[0], Action::Bet(10)).unwrap();
        round.apply(&mut seats, users[1], Action::Fold).unwrap();
        assert!(round.complete());
        assert!(by_user(&seats, users[1]).folded());
    }

    #[test]
    fn all_shoved_completes() {
        let (mut seats, users) = seated(&[50, 50]);
        let mut round = Round::new(users.clone(), 2, false, None);
        round.apply(&mut seats, users[0], Action::AllIn).unwrap();
        round.apply(&mut seats, users[1], Action::AllIn).unwrap();
        assert!(round.complete());
        assert_eq!(round.actor(&seats), None);
    }

    #[test]
    fn options_follow_state() {
        let (mut seats, users) = seated(&[100, 100]);
        let mut round = Round::new(users.clone(), 2, false, None);
        let opts = round.options(by_user(&seats, users[0]));
        assert!(opts.contains(&ActionKind::Check));
        assert!(opts.contains(&ActionKind::Bet));
        assert!(!opts.contains(&ActionKind::Call));
        round.apply(&mut seats, users[0], Action::Bet(10)).unwrap();
        let opts = round.options(by_user(&seats, users[1]));
        assert!(opts.contains(&ActionKind::Call));
        assert!(opts.contains(&ActionKind::Raise));
        assert!(!opts.contains(&ActionKind::Check));
        assert!(!opts.contains(&ActionKind::Bet));
    }
}
