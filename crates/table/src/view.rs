use super::action::ActionKind;
use super::player::Player;
use super::table::Stage;
use super::table::Table;
use hg_core::Chips;
use hg_core::ID;
use hg_core::Member;
use hg_core::Seat;

/// One seat as a given viewer may see it.
///
/// `hole_cards` is present only when the projection belongs to the seat's
/// own player; everyone else gets the `has_cards` flag.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PlayerView {
    pub user_id: String,
    pub username: String,
    pub seat: Seat,
    pub chips: Chips,
    pub current_bet: Chips,
    pub is_folded: bool,
    pub is_all_in: bool,
    pub is_sitting_out: bool,
    pub is_connected: bool,
    pub is_you: bool,
    pub has_cards: bool,
    pub time_bank: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hole_cards: Option<Vec<String>>,
}

/// A full per-viewer snapshot of a table.
///
/// This is the single place viewer-specific redaction happens: hole cards
/// appear only in the viewer's own projection, and the action fields are
/// populated only when it is the viewer's turn. A spectator view carries
/// no viewer-specific fields at all.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TableView {
    pub table_id: String,
    pub state: Stage,
    pub hand_number: u64,
    pub dealer_seat: Seat,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub pot: Chips,
    pub max_players: usize,
    pub community_cards: Vec<String>,
    pub players: Vec<PlayerView>,
    pub current_player: Option<String>,
    pub valid_actions: Vec<ActionKind>,
    pub call_amount: Chips,
    pub min_raise: Chips,
    pub turn_time_seconds: u64,
    pub time_remaining: u64,
    pub time_bank_active: bool,
    pub time_bank_remaining: u64,
}

/// Lobby listing entry.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TableSummary {
    pub table_id: String,
    pub name: String,
    pub players: usize,
    pub max_players: usize,
    pub state: Stage,
    pub small_blind: Chips,
    pub big_blind: Chips,
}

impl Table {
    /// Renders the table for one viewer; `None` renders the spectator view.
    pub fn view_for(&self, viewer: Option<ID<Member>>) -> TableView {
        let actor = self.actor();
        let clock = self.clock();
        let acting = viewer.is_some() && actor == viewer;
        let (valid_actions, call_amount) = match (acting, viewer, self.round()) {
            (true, Some(user), Some(round)) => {
                let player = self.player(user).expect("actor is seated");
                (round.options(player), round.call_amount(player))
            }
            _ => (Vec::new(), 0),
        };
        TableView {
            table_id: self.id().to_string(),
            state: self.stage(),
            hand_number: self.hand_number(),
            dealer_seat: self.dealer(),
            small_blind: self.options().small_blind,
            big_blind: self.options().big_blind,
            pot: self.pot_total(),
            max_players: self.options().max_players,
            community_cards: self.board().iter().map(|c| c.to_string()).collect(),
            players: self
                .seats()
                .values()
                .map(|p| self.project(p, viewer))
                .collect(),
            current_player: actor.map(|u| u.to_string()),
            valid_actions,
            call_amount,
            min_raise: self.round().map(|r| r.min_raise_target()).unwrap_or(0),
            turn_time_seconds: self.options().turn_time_seconds,
            time_remaining: clock.map(|c| c.remaining).unwrap_or(0),
            time_bank_active: clock.map(|c| c.bank_active).unwrap_or(false),
            time_bank_remaining: clock.map(|c| c.bank).unwrap_or(0),
        }
    }

    pub fn summary(&self) -> TableSummary {
        TableSummary {
            table_id: self.id().to_string(),
            name: self.name().to_string(),
            players: self.occupancy(),
            max_players: self.options().max_players,
            state: self.stage(),
            small_blind: self.options().small_blind,
            big_blind: self.options().big_blind,
        }
    }

    fn project(&self, player: &Player, viewer: Option<ID<Member>>) -> PlayerView {
        let is_you = viewer == Some(player.user());
        PlayerView {
            user_id: player.user().to_string(),
            username: player.username().to_string(),
            seat: player.seat(),
            chips: player.chips(),
            current_bet: player.wager(),
            is_folded: player.folded(),
            is_all_in: player.all_in(),
            is_sitting_out: player.sitting_out(),
            is_connected: !player.disconnected(),
            is_you,
            has_cards: player.hole().is_some(),
            time_bank: player.time_bank(),
            hole_cards: match is_you {
                true => player.hole().map(|h| h.glyphs()),
                false => None,
            },
        }
    }
}
