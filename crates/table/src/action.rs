use hg_core::Chips;

/// The discriminant of a player decision, as it travels the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Fold,
    Check,
    Call,
    Bet,
    Raise,
    AllIn,
}

/// A player decision with its amount.
///
/// `Bet` carries the opening bet size; `Raise` carries the *target total*
/// wager, not the increment. `Call` and `AllIn` amounts are derived from
/// table state, so the variants carry nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Fold,
    Check,
    Call,
    Bet(Chips),
    Raise(Chips),
    AllIn,
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Fold => ActionKind::Fold,
            Action::Check => ActionKind::Check,
            Action::Call => ActionKind::Call,
            Action::Bet(_) => ActionKind::Bet,
            Action::Raise(_) => ActionKind::Raise,
            Action::AllIn => ActionKind::AllIn,
        }
    }
}

/// wire isomorphism: (kind, amount) pairs off the socket
impl From<(ActionKind, Chips)> for Action {
    fn from((kind, amount): (ActionKind, Chips)) -> Self {
        match kind {
            ActionKind::Fold => Action::Fold,
            ActionKind::Check => Action::Check,
            ActionKind::Call => Action::Call,
            ActionKind::Bet => Action::Bet(amount),
            ActionKind::Raise => Action::Raise(amount),
            ActionKind::AllIn => Action::AllIn,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Action::Fold => write!(f, "FOLD"),
            Action::Check => write!(f, "CHECK"),
            Action::Call => write!(f, "CALL"),
            Action::Bet(amount) => write!(f, "BET   {}", amount),
            Action::Raise(amount) => write!(f, "RAISE {}", amount),
            Action::AllIn => write!(f, "ALLIN"),
        }
    }
}
