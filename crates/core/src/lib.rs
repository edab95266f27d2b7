//! Core type aliases, identity types, and configuration for homegame.
//!
//! This crate provides the foundational types shared by every other
//! workspace member: chip and seat aliases, the phantom-typed [`ID`]
//! wrapper, the environment-driven [`Config`], and logger setup.

// ============================================================================
// TYPE ALIASES
// ============================================================================
/// Stack sizes, bets, and ledger amounts in chips.
pub type Chips = i64;
/// Seat index around a table, in `0..max_players`.
pub type Seat = usize;

// ============================================================================
// IDENTITY TYPES
// ============================================================================
use std::cmp::Ordering;
use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;
use std::hash::Hash;
use std::hash::Hasher;
use std::marker::PhantomData;

/// Marker for a registered user. `ID<Member>` identifies a user everywhere:
/// at a seat, in a tombstone, on a ledger row, behind a connection.
pub struct Member;

/// Marker for a poker night (one ledger-scoped session of play).
pub struct Night;

/// Generic ID wrapper providing compile-time type safety over uuid::Uuid.
pub struct ID<T> {
    inner: uuid::Uuid,
    marker: PhantomData<T>,
}

impl<T> ID<T> {
    pub fn inner(&self) -> uuid::Uuid {
        self.inner
    }
    /// Cast ID<T> to ID<U> while preserving the underlying UUID.
    pub fn cast<U>(self) -> ID<U> {
        ID {
            inner: self.inner,
            marker: PhantomData,
        }
    }
    /// Parse from the canonical hyphenated string form.
    pub fn parse(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s).ok().map(Self::from)
    }
}

impl<T> From<ID<T>> for uuid::Uuid {
    fn from(id: ID<T>) -> Self {
        id.inner()
    }
}
impl<T> From<uuid::Uuid> for ID<T> {
    fn from(inner: uuid::Uuid) -> Self {
        Self {
            inner,
            marker: PhantomData,
        }
    }
}

impl<T> Default for ID<T> {
    fn default() -> Self {
        Self {
            inner: uuid::Uuid::now_v7(),
            marker: PhantomData,
        }
    }
}

impl<T> Copy for ID<T> {}
impl<T> Clone for ID<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Eq for ID<T> {}
impl<T> PartialEq for ID<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<T> Ord for ID<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.inner.cmp(&other.inner)
    }
}
impl<T> PartialOrd for ID<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Hash for ID<T> {
    fn hash<H>(&self, state: &mut H)
    where
        H: Hasher,
    {
        self.inner.hash(state);
    }
}

impl<T> Debug for ID<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ID").field(&self.inner).finish()
    }
}
impl<T> Display for ID<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.inner, f)
    }
}

impl<T> serde::Serialize for ID<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.inner.serialize(serializer)
    }
}
impl<'de, T> serde::Deserialize<'de> for ID<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        uuid::Uuid::deserialize(deserializer).map(Self::from)
    }
}

// ============================================================================
// GAME PARAMETERS
// ============================================================================
/// Ceiling on any player's time bank, in seconds.
pub const TIME_BANK_CAP: u64 = 120;
/// Delay between a hand result and the automatic attempt at the next hand.
pub const AUTO_START_DELAY: std::time::Duration = std::time::Duration::from_secs(5);
/// Period of the background ticker driving turn timeouts and sweeps.
pub const TICK_PERIOD: std::time::Duration = std::time::Duration::from_secs(1);

// ============================================================================
// CONFIGURATION
// ============================================================================
/// Runtime configuration, read once from the environment.
///
/// Every knob has a default suitable for local play; deployments override
/// through environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Tombstone lifetime after a seated player disconnects.
    pub reconnect_grace_seconds: u64,
    /// Fewest seated players (with chips) required to start a hand.
    pub min_players: usize,
    /// Seats at a freshly created table.
    pub max_players: usize,
    /// Per-turn wall clock before the time bank starts draining.
    pub default_turn_time_seconds: u64,
    /// Starting time bank per player.
    pub default_time_bank_seconds: u64,
    /// Seconds re-added to each bank at hand start, capped at [`TIME_BANK_CAP`].
    pub time_bank_replenish_per_hand: u64,
    /// HMAC secret for access and refresh tokens.
    pub jwt_secret: String,
    /// Postgres connection string; in-memory stores are used when unset.
    pub db_url: Option<String>,
    /// Listen address for the HTTP/WebSocket server.
    pub bind_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl Config {
    /// Reads configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            reconnect_grace_seconds: var("RECONNECT_GRACE_SECONDS", 60),
            min_players: var("MIN_PLAYERS", 2),
            max_players: var("MAX_PLAYERS", 10),
            default_turn_time_seconds: var("DEFAULT_TURN_TIME", 30),
            default_time_bank_seconds: var("DEFAULT_TIME_BANK", 60),
            time_bank_replenish_per_hand: var("TIME_BANK_REPLENISH", 10),
            jwt_secret: std::env::var("JWT_SECRET")
                .unwrap_or_else(|_| String::from("dev-secret-change-in-production")),
            db_url: std::env::var("DB_URL").ok(),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| String::from("0.0.0.0:8765")),
        }
    }
}

fn var<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ============================================================================
// RUNTIME UTILITIES
// ============================================================================
/// Initialize dual logging (terminal + file) with timestamped log files.
/// Creates `logs/` directory and writes DEBUG level to file, INFO to terminal.
pub fn log() {
    std::fs::create_dir_all("logs").expect("create logs directory");
    let config = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();
    let time = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time moves slow")
        .as_secs();
    let file = simplelog::WriteLogger::new(
        log::LevelFilter::Debug,
        config.clone(),
        std::fs::File::create(format!("logs/{}.log", time)).expect("create log file"),
    );
    let term = simplelog::TermLogger::new(
        log::LevelFilter::Info,
        config.clone(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    simplelog::CombinedLogger::init(vec![term, file]).expect("initialize logger");
}
