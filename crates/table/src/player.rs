use hg_cards::Hole;
use hg_core::Chips;
use hg_core::ID;
use hg_core::Member;
use hg_core::Seat;
use hg_core::TIME_BANK_CAP;

/// A player occupying a seat.
///
/// Tracks chips behind, the current street's wager, hole cards, and the
/// lifecycle flags the hand machinery keys off of. Hole cards are private
/// information; they leave this struct only through the table's
/// per-viewer projection and the server-side snapshot.
///
/// Invariants: `all_in` implies an empty stack; a folded player takes no
/// further action this hand; the wager never exceeds what the player has
/// put in this street.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Player {
    user: ID<Member>,
    username: String,
    seat: Seat,
    chips: Chips,
    hole: Option<Hole>,
    wager: Chips,
    folded: bool,
    all_in: bool,
    sitting_out: bool,
    disconnected: bool,
    time_bank: u64,
}

impl Player {
    /// Seats a user with an empty stack; chips arrive by admin grant.
    pub fn new(user: ID<Member>, username: String, seat: Seat, time_bank: u64) -> Self {
        Self {
            user,
            username,
            seat,
            chips: 0,
            hole: None,
            wager: 0,
            folded: false,
            all_in: false,
            sitting_out: false,
            disconnected: false,
            time_bank,
        }
    }

    pub fn user(&self) -> ID<Member> {
        self.user
    }
    pub fn username(&self) -> &str {
        &self.username
    }
    pub fn seat(&self) -> Seat {
        self.seat
    }
    pub fn chips(&self) -> Chips {
        self.chips
    }
    pub fn hole(&self) -> Option<Hole> {
        self.hole
    }
    pub fn wager(&self) -> Chips {
        self.wager
    }
    pub fn folded(&self) -> bool {
        self.folded
    }
    pub fn all_in(&self) -> bool {
        self.all_in
    }
    pub fn sitting_out(&self) -> bool {
        self.sitting_out
    }
    pub fn disconnected(&self) -> bool {
        self.disconnected
    }
    pub fn time_bank(&self) -> u64 {
        self.time_bank
    }

    /// In the current hand: dealt in, not folded, not sitting out.
    pub fn in_hand(&self) -> bool {
        !self.folded && !self.sitting_out && self.hole.is_some()
    }
    /// Still able to act: in the hand and not all-in.
    pub fn can_act(&self) -> bool {
        self.in_hand() && !self.all_in
    }

    /// Commits chips from stack to wager, going all-in at the stack floor.
    /// Returns the amount actually moved.
    pub fn bet(&mut self, amount: Chips) -> Chips {
        let moved = amount.min(self.chips);
        self.chips -= moved;
        self.wager += moved;
        if self.chips == 0 {
            self.all_in = true;
        }
        moved
    }
    pub fn fold(&mut self) {
        self.folded = true;
    }
    pub fn win(&mut self, amount: Chips) {
        self.chips += amount;
    }
    pub fn deal(&mut self, hole: Hole) {
        self.hole = Some(hole);
    }
    /// Zeroes the street wager when contributions fold into the pot.
    pub fn clear_wager(&mut self) -> Chips {
        std::mem::take(&mut self.wager)
    }

    /// Fresh-hand reset: keep chips, clear cards, wager, and hand flags,
    /// and replenish the time bank up to the cap.
    pub fn reset_for_hand(&mut self, replenish: u64) {
        self.hole = None;
        self.wager = 0;
        self.folded = false;
        self.all_in = false;
        self.time_bank = (self.time_bank + replenish).min(TIME_BANK_CAP);
    }

    /// Drains seconds from the time bank, returning what was actually used.
    pub fn use_time_bank(&mut self, seconds: u64) -> u64 {
        let used = seconds.min(self.time_bank);
        self.time_bank -= used;
        used
    }

    pub fn set_seat(&mut self, seat: Seat) {
        self.seat = seat;
    }
    pub fn set_sitting_out(&mut self, out: bool) {
        self.sitting_out = out;
    }
    pub fn set_disconnected(&mut self, disconnected: bool) {
        self.disconnected = disconnected;
    }
    /// Admin stack mutation; the hand machinery never calls this.
    pub fn set_chips(&mut self, chips: Chips) {
        self.chips = chips;
        if self.chips > 0 && self.all_in && self.hole.is_none() {
            self.all_in = false;
        }
    }
}

impl std::fmt::Display for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} @{} ${}", self.username, self.seat, self.chips)
    }
}
