use super::action::ActionKind;
use super::table::Stage;
use hg_cards::Card;
use hg_core::Chips;
use hg_core::ID;
use hg_core::Member;
use hg_core::Seat;
use std::collections::BTreeMap;

/// Externally observable table transitions.
///
/// The table pushes these through an unbounded channel; the connection
/// hub consumes them in emission order and renders per-viewer messages.
#[derive(Debug, Clone)]
pub enum TableEvent {
    HandStarted {
        hand_number: u64,
        dealer_seat: Seat,
    },
    StateChanged {
        state: Stage,
        community_cards: Vec<Card>,
        pot: Chips,
    },
    PlayerAction {
        user: ID<Member>,
        username: String,
        kind: ActionKind,
        amount: Chips,
    },
    HandResult(HandOutcome),
}

/// The result of a completed hand, as broadcast to the table.
///
/// `shown_hands` carries exactly the hole cards that had to be revealed:
/// hands that won a pot they contested at showdown. Uncontested wins
/// reveal nothing.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HandOutcome {
    pub winners: Vec<PotWin>,
    pub pot_total: Chips,
    pub community_cards: Vec<Card>,
    pub shown_hands: BTreeMap<String, Vec<String>>,
}

/// One player's share of the spoils.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PotWin {
    pub user_id: String,
    pub username: String,
    pub amount: Chips,
    /// Winning hand category, or None for an uncontested pot.
    pub hand: Option<String>,
}
