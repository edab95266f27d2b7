use super::action::ActionKind;
use hg_core::Chips;
use hg_core::Seat;

/// A contract violation raised by the table engine.
///
/// Every variant is surfaced to the handler boundary without mutating
/// table state; the hub maps variants onto wire error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("seat {0} is out of range")]
    InvalidSeat(Seat),
    #[error("seat {0} is already taken")]
    SeatTaken(Seat),
    #[error("table is full")]
    TableFull,
    #[error("already seated; stand up first to change seats")]
    AlreadySeated,
    #[error("player is not at this table")]
    PlayerNotFound,
    #[error("no betting round in progress")]
    NoRound,
    #[error("not your turn")]
    NotYourTurn,
    #[error("{0:?} is not a legal action right now")]
    IllegalAction(ActionKind),
    #[error("bet must be at least {0}")]
    BetTooSmall(Chips),
    #[error("raise must be to at least {0}")]
    RaiseTooSmall(Chips),
    #[error("stack cannot cover that amount")]
    InsufficientChips,
    #[error("cannot start hand: too few players or hand in progress")]
    CannotStart,
    #[error("chip amount must be positive")]
    BadChipAmount,
}
