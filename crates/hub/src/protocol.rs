use hg_core::Chips;
use hg_core::Seat;
use hg_store::LedgerEntry;
use hg_store::Standing;
use hg_table::ActionKind;
use hg_table::HandOutcome;
use hg_table::Stage;
use hg_table::TableSummary;
use hg_table::TableView;

/// Everything a client may send, discriminated by `"type"`.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Register {
        username: String,
        password: String,
    },
    Login {
        username: String,
        password: String,
    },
    RefreshToken {
        refresh_token: String,
    },
    Auth {
        token: String,
    },
    Ping,
    JoinTable {
        table_id: String,
        #[serde(default)]
        seat: Option<Seat>,
    },
    LeaveTable,
    StandUp,
    Action {
        kind: ActionKind,
        #[serde(default)]
        amount: Chips,
    },
    Chat {
        text: String,
    },
    StartGame,
    CreateTable {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        small_blind: Option<Chips>,
        #[serde(default)]
        big_blind: Option<Chips>,
        #[serde(default)]
        min_players: Option<usize>,
        #[serde(default)]
        max_players: Option<usize>,
    },
    DeleteTable {
        table_id: String,
    },
    GiveChips {
        player: String,
        amount: Chips,
    },
    TakeChips {
        player: String,
        amount: Chips,
    },
    SetChips {
        player: String,
        amount: Chips,
    },
    GetLedger,
    GetStandings,
    EndSession,
}

/// The inbound tags we accept; anything else is `UNKNOWN_TYPE`.
const KNOWN_TYPES: &[&str] = &[
    "register",
    "login",
    "refresh_token",
    "auth",
    "ping",
    "join_table",
    "leave_table",
    "stand_up",
    "action",
    "chat",
    "start_game",
    "create_table",
    "delete_table",
    "give_chips",
    "take_chips",
    "set_chips",
    "get_ledger",
    "get_standings",
    "end_session",
];

/// Parses one frame; failures come back ready to send.
pub fn parse(raw: &str) -> Result<ClientMessage, ServerMessage> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| ServerMessage::error(ErrorCode::BadJson, format!("invalid JSON: {}", e)))?;
    let tag = value.get("type").and_then(|t| t.as_str()).map(str::to_string);
    serde_json::from_value::<ClientMessage>(value).map_err(|e| {
        match tag.as_deref().map(|t| KNOWN_TYPES.contains(&t)) {
            Some(true) => ServerMessage::error(ErrorCode::BadJson, e.to_string()),
            _ => ServerMessage::error(ErrorCode::UnknownType, "unknown message type"),
        }
    })
}

/// Wire error codes. Errors never close the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    BadJson,
    UnknownType,
    AuthRequired,
    AuthFailed,
    RefreshFailed,
    NotAdmin,
    TableNotFound,
    TableHasPlayers,
    SeatTaken,
    InvalidSeat,
    AlreadySeated,
    NotAtTable,
    PlayerNotFound,
    InvalidAction,
    CannotStart,
    ChipError,
    ServerError,
}

/// Everything the server may send, discriminated by `"type"`.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Error {
        message: String,
        code: ErrorCode,
    },
    AuthSuccess {
        user_id: String,
        username: String,
        role: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        access_token: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        refresh_token: Option<String>,
    },
    TokenRefreshed {
        access_token: String,
    },
    Pong,
    GameState {
        #[serde(flatten)]
        view: TableView,
    },
    HandStarted {
        hand_number: u64,
        dealer_seat: Seat,
    },
    StateChanged {
        state: Stage,
        community_cards: Vec<String>,
        pot: Chips,
    },
    PlayerAction {
        user_id: String,
        username: String,
        action: ActionKind,
        amount: Chips,
    },
    HandResult {
        #[serde(flatten)]
        outcome: HandOutcome,
    },
    PlayerJoined {
        user_id: String,
        username: String,
        seat: Seat,
        chips: Chips,
    },
    PlayerLeft {
        user_id: String,
        username: String,
    },
    LeftTable {
        table_id: String,
    },
    PlayerDisconnected {
        user_id: String,
        username: String,
        grace_seconds: u64,
    },
    PlayerReconnected {
        user_id: String,
        username: String,
    },
    ChipsUpdated {
        player: String,
        chips: Chips,
        action: String,
        amount: Chips,
    },
    Ledger {
        transactions: Vec<LedgerEntry>,
    },
    Standings {
        session_id: String,
        players: Vec<Standing>,
    },
    ChatBroadcast {
        username: String,
        text: String,
        timestamp: u64,
    },
    GameStarted,
    TableCreated {
        table_id: String,
        name: String,
        small_blind: Chips,
        big_blind: Chips,
        min_players: usize,
        max_players: usize,
    },
    TableDeleted {
        table_id: String,
    },
    TablesList {
        tables: Vec<TableSummary>,
    },
}

impl ServerMessage {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            code,
        }
    }
    /// The code, when this is an error frame.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Error { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Maps engine violations onto wire codes for game actions.
pub fn game_code(e: &hg_table::GameError) -> ErrorCode {
    use hg_table::GameError::*;
    match e {
        InvalidSeat(_) | TableFull => ErrorCode::InvalidSeat,
        SeatTaken(_) => ErrorCode::SeatTaken,
        AlreadySeated => ErrorCode::AlreadySeated,
        PlayerNotFound => ErrorCode::PlayerNotFound,
        CannotStart => ErrorCode::CannotStart,
        BadChipAmount => ErrorCode::ChipError,
        NoRound | NotYourTurn | IllegalAction(_) | BetTooSmall(_) | RaiseTooSmall(_)
        | InsufficientChips => ErrorCode::InvalidAction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_garbage_as_bad_json() {
        let err = parse("{not json").unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::BadJson));
    }

    #[test]
    fn parse_rejects_unknown_tag() {
        let err = parse(r#"{"type":"teleport","to":"vegas"}"#).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::UnknownType));
    }

    #[test]
    fn parse_rejects_missing_tag() {
        let err = parse(r#"{"seat":3}"#).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::UnknownType));
    }

    #[test]
    fn parse_known_tag_with_bad_fields_is_bad_json() {
        let err = parse(r#"{"type":"action","kind":"warp"}"#).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::BadJson));
    }

    #[test]
    fn parse_accepts_optional_seat() {
        let msg = parse(r#"{"type":"join_table","table_id":"t1"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::JoinTable { seat: None, .. }));
        let msg = parse(r#"{"type":"join_table","table_id":"t1","seat":4}"#).unwrap();
        assert!(matches!(msg, ClientMessage::JoinTable { seat: Some(4), .. }));
    }

    #[test]
    fn error_codes_serialize_screaming() {
        let json = serde_json::to_string(&ServerMessage::error(ErrorCode::AuthRequired, "no"))
            .unwrap();
        assert!(json.contains("\"AUTH_REQUIRED\""));
        assert!(json.contains("\"type\":\"error\""));
    }

    #[test]
    fn action_amount_defaults_to_zero() {
        let msg = parse(r#"{"type":"action","kind":"fold"}"#).unwrap();
        match msg {
            ClientMessage::Action { kind, amount } => {
                assert_eq!(kind, ActionKind::Fold);
                assert_eq!(amount, 0);
            }
            _ => panic!("wrong variant"),
        }
    }
}
