use super::error::StoreError;
use hg_core::Chips;
use hg_core::ID;
use hg_core::Member;
use hg_core::Night;
use std::collections::BTreeMap;

/// Why chips moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    BuyIn,
    CashOut,
    Adjustment,
}

impl LedgerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerKind::BuyIn => "buy_in",
            LedgerKind::CashOut => "cash_out",
            LedgerKind::Adjustment => "adjustment",
        }
    }
}

impl TryFrom<&str> for LedgerKind {
    type Error = StoreError;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "buy_in" => Ok(LedgerKind::BuyIn),
            "cash_out" => Ok(LedgerKind::CashOut),
            "adjustment" => Ok(LedgerKind::Adjustment),
            _ => Err(StoreError::Backend(format!("unknown ledger kind: {}", s))),
        }
    }
}

/// One appended chip movement. `amount` is signed only for adjustments.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LedgerEntry {
    pub id: uuid::Uuid,
    pub night: ID<Night>,
    pub user: ID<Member>,
    pub username: String,
    pub kind: LedgerKind,
    pub amount: Chips,
    pub admin: Option<ID<Member>>,
    pub note: Option<String>,
    /// Seconds since the epoch.
    pub at: u64,
}

impl LedgerEntry {
    pub fn new(
        night: ID<Night>,
        user: ID<Member>,
        username: String,
        kind: LedgerKind,
        amount: Chips,
        admin: Option<ID<Member>>,
        note: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::now_v7(),
            night,
            user,
            username,
            kind,
            amount,
            admin,
            note,
            at: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time moves slow")
                .as_secs(),
        }
    }
}

/// One player's net position for the night.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Standing {
    pub player: String,
    pub buy_ins: Chips,
    pub cash_outs: Chips,
    pub net: Chips,
}

/// Append-only record of every chip movement.
#[async_trait::async_trait]
pub trait Ledger: Send + Sync {
    async fn record(&self, entry: LedgerEntry) -> Result<(), StoreError>;
    async fn entries(&self, night: ID<Night>) -> Result<Vec<LedgerEntry>, StoreError>;
}

/// Aggregates a night's entries into per-player standings.
///
/// Net is chips taken out minus chips put in: cash-outs and negative
/// adjustments count against buy-ins and positive adjustments.
pub fn standings(entries: &[LedgerEntry]) -> Vec<Standing> {
    let mut by_player: BTreeMap<&str, (Chips, Chips)> = BTreeMap::new();
    for entry in entries {
        let (buy_ins, cash_outs) = by_player.entry(&entry.username).or_default();
        match entry.kind {
            LedgerKind::BuyIn => *buy_ins += entry.amount,
            LedgerKind::CashOut => *cash_outs += entry.amount,
            LedgerKind::Adjustment => match entry.amount >= 0 {
                true => *buy_ins += entry.amount,
                false => *cash_outs -= entry.amount,
            },
        }
    }
    by_player
        .into_iter()
        .map(|(player, (buy_ins, cash_outs))| Standing {
            player: player.to_string(),
            buy_ins,
            cash_outs,
            net: cash_outs - buy_ins,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, kind: LedgerKind, amount: Chips) -> LedgerEntry {
        LedgerEntry::new(
            ID::default(),
            ID::default(),
            name.into(),
            kind,
            amount,
            None,
            None,
        )
    }

    #[test]
    fn standings_aggregate_by_player() {
        let entries = vec![
            entry("alice", LedgerKind::BuyIn, 100),
            entry("alice", LedgerKind::BuyIn, 50),
            entry("bob", LedgerKind::BuyIn, 100),
            entry("alice", LedgerKind::CashOut, 200),
            entry("bob", LedgerKind::Adjustment, -25),
        ];
        let standings = standings(&entries);
        assert_eq!(standings.len(), 2);
        let alice = standings.iter().find(|s| s.player == "alice").unwrap();
        assert_eq!((alice.buy_ins, alice.cash_outs, alice.net), (150, 200, 50));
        let bob = standings.iter().find(|s| s.player == "bob").unwrap();
        assert_eq!((bob.buy_ins, bob.cash_outs, bob.net), (100, 25, -75));
    }
}
