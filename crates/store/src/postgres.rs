use super::LEDGER;
use super::NIGHTS;
use super::TABLE_STATES;
use super::USERS;
use super::error::StoreError;
use super::ledger::Ledger;
use super::ledger::LedgerEntry;
use super::ledger::LedgerKind;
use super::nights::Nights;
use super::snapshots::Snapshots;
use super::users::Account;
use super::users::Users;
use hg_auth::Role;
use hg_core::ID;
use hg_core::Member;
use hg_core::Night;
use hg_table::Table;
use std::sync::Arc;
use tokio_postgres::Client;

/// PostgreSQL-backed store.
///
/// Each operation is a single statement, transactional at the store
/// layer. DDL is idempotent and runs at boot via [`migrate`](Self::migrate).
pub struct Postgres(Arc<Client>);

impl Postgres {
    pub fn new(client: Arc<Client>) -> Self {
        Self(client)
    }

    /// Creates the schema if it does not exist.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        self.0
            .batch_execute(const_format::concatcp!(
                "CREATE TABLE IF NOT EXISTS ",
                USERS,
                " (
                    id            UUID PRIMARY KEY,
                    username      VARCHAR(50) UNIQUE NOT NULL,
                    password_hash VARCHAR(255) NOT NULL,
                    role          VARCHAR(20) NOT NULL DEFAULT 'player',
                    created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );
                CREATE INDEX IF NOT EXISTS idx_users_username ON ",
                USERS,
                " (LOWER(username));
                CREATE TABLE IF NOT EXISTS ",
                NIGHTS,
                " (
                    id         UUID PRIMARY KEY,
                    started_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    ended_at   TIMESTAMPTZ,
                    is_active  BOOLEAN NOT NULL DEFAULT TRUE
                );
                CREATE TABLE IF NOT EXISTS ",
                LEDGER,
                " (
                    id         UUID PRIMARY KEY,
                    session_id UUID NOT NULL REFERENCES ",
                NIGHTS,
                "(id) ON DELETE CASCADE,
                    user_id    UUID NOT NULL REFERENCES ",
                USERS,
                "(id) ON DELETE CASCADE,
                    username   VARCHAR(50) NOT NULL,
                    type       VARCHAR(20) NOT NULL,
                    amount     BIGINT NOT NULL,
                    admin_id   UUID REFERENCES ",
                USERS,
                "(id),
                    note       TEXT,
                    created_at BIGINT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_ledger_session ON ",
                LEDGER,
                " (session_id);
                CREATE TABLE IF NOT EXISTS ",
                TABLE_STATES,
                " (
                    table_id   UUID PRIMARY KEY,
                    state      JSONB NOT NULL,
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );"
            ))
            .await?;
        log::info!("[store] schema ready");
        Ok(())
    }
}

#[async_trait::async_trait]
impl Users for Postgres {
    async fn register(&self, username: &str, password: &str) -> Result<Account, StoreError> {
        let taken = self
            .0
            .query_opt(
                const_format::concatcp!(
                    "SELECT 1 FROM ",
                    USERS,
                    " WHERE LOWER(username) = LOWER($1)"
                ),
                &[&username],
            )
            .await?;
        if taken.is_some() {
            return Err(StoreError::Conflict);
        }
        let anyone = self
            .0
            .query_opt(const_format::concatcp!("SELECT 1 FROM ", USERS, " LIMIT 1"), &[])
            .await?;
        let role = match anyone.is_some() {
            true => Role::Player,
            false => Role::Admin,
        };
        let id: ID<Member> = ID::default();
        let hash = hg_auth::hash_password(password)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        self.0
            .execute(
                const_format::concatcp!(
                    "INSERT INTO ",
                    USERS,
                    " (id, username, password_hash, role) VALUES ($1, $2, $3, $4)"
                ),
                &[&id.inner(), &username, &hash, &role.to_string()],
            )
            .await?;
        Ok(Account {
            id,
            username: username.to_string(),
            role,
        })
    }

    async fn login(&self, username: &str, password: &str) -> Result<Account, StoreError> {
        let row = self
            .0
            .query_opt(
                const_format::concatcp!(
                    "SELECT id, username, role, password_hash FROM ",
                    USERS,
                    " WHERE LOWER(username) = LOWER($1)"
                ),
                &[&username],
            )
            .await?
            .ok_or(StoreError::BadCredentials)?;
        let hash: String = row.get(3);
        if !hg_auth::verify_password(password, &hash) {
            return Err(StoreError::BadCredentials);
        }
        Ok(account_from(&row)?)
    }

    async fn lookup(&self, user: ID<Member>) -> Result<Option<Account>, StoreError> {
        self.0
            .query_opt(
                const_format::concatcp!(
                    "SELECT id, username, role FROM ",
                    USERS,
                    " WHERE id = $1"
                ),
                &[&user.inner()],
            )
            .await?
            .map(|row| account_from(&row))
            .transpose()
    }
}

fn account_from(row: &tokio_postgres::Row) -> Result<Account, StoreError> {
    let role: String = row.get(2);
    Ok(Account {
        id: ID::from(row.get::<_, uuid::Uuid>(0)),
        username: row.get(1),
        role: Role::try_from(role.as_str()).map_err(StoreError::Backend)?,
    })
}

#[async_trait::async_trait]
impl Nights for Postgres {
    async fn active(&self) -> Result<ID<Night>, StoreError> {
        let open = self
            .0
            .query_opt(
                const_format::concatcp!(
                    "SELECT id FROM ",
                    NIGHTS,
                    " WHERE is_active ORDER BY started_at DESC LIMIT 1"
                ),
                &[],
            )
            .await?;
        if let Some(row) = open {
            return Ok(ID::from(row.get::<_, uuid::Uuid>(0)));
        }
        let id: ID<Night> = ID::default();
        self.0
            .execute(
                const_format::concatcp!("INSERT INTO ", NIGHTS, " (id) VALUES ($1)"),
                &[&id.inner()],
            )
            .await?;
        log::info!("[store] opened poker night {}", id);
        Ok(id)
    }

    async fn end(&self, night: ID<Night>) -> Result<(), StoreError> {
        self.0
            .execute(
                const_format::concatcp!(
                    "UPDATE ",
                    NIGHTS,
                    " SET is_active = FALSE, ended_at = NOW() WHERE id = $1"
                ),
                &[&night.inner()],
            )
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Ledger for Postgres {
    async fn record(&self, entry: LedgerEntry) -> Result<(), StoreError> {
        let admin: Option<uuid::Uuid> = entry.admin.map(|id| id.inner());
        self.0
            .execute(
                const_format::concatcp!(
                    "INSERT INTO ",
                    LEDGER,
                    " (id, session_id, user_id, username, type, amount, admin_id, note, created_at)
                      VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
                ),
                &[
                    &entry.id,
                    &entry.night.inner(),
                    &entry.user.inner(),
                    &entry.username,
                    &entry.kind.as_str(),
                    &entry.amount,
                    &admin,
                    &entry.note,
                    &(entry.at as i64),
                ],
            )
            .await?;
        Ok(())
    }

    async fn entries(&self, night: ID<Night>) -> Result<Vec<LedgerEntry>, StoreError> {
        self.0
            .query(
                const_format::concatcp!(
                    "SELECT id, session_id, user_id, username, type, amount, admin_id, note, created_at FROM ",
                    LEDGER,
                    " WHERE session_id = $1 ORDER BY created_at, id"
                ),
                &[&night.inner()],
            )
            .await?
            .iter()
            .map(|row| {
                let kind: String = row.get(4);
                let admin: Option<uuid::Uuid> = row.get(6);
                Ok(LedgerEntry {
                    id: row.get(0),
                    night: ID::from(row.get::<_, uuid::Uuid>(1)),
                    user: ID::from(row.get::<_, uuid::Uuid>(2)),
                    username: row.get(3),
                    kind: LedgerKind::try_from(kind.as_str())?,
                    amount: row.get(5),
                    admin: admin.map(ID::from),
                    note: row.get(7),
                    at: row.get::<_, i64>(8) as u64,
                })
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl Snapshots for Postgres {
    async fn save_table(
        &self,
        table: ID<Table>,
        snapshot: &serde_json::Value,
    ) -> Result<(), StoreError> {
        self.0
            .execute(
                const_format::concatcp!(
                    "INSERT INTO ",
                    TABLE_STATES,
                    " (table_id, state) VALUES ($1, $2)
                      ON CONFLICT (table_id) DO UPDATE SET state = $2, updated_at = NOW()"
                ),
                &[&table.inner(), snapshot],
            )
            .await?;
        Ok(())
    }

    async fn load_tables(&self) -> Result<Vec<(ID<Table>, serde_json::Value)>, StoreError> {
        Ok(self
            .0
            .query(
                const_format::concatcp!("SELECT table_id, state FROM ", TABLE_STATES),
                &[],
            )
            .await?
            .iter()
            .map(|row| {
                (
                    ID::from(row.get::<_, uuid::Uuid>(0)),
                    row.get::<_, serde_json::Value>(1),
                )
            })
            .collect())
    }

    async fn delete_table(&self, table: ID<Table>) -> Result<(), StoreError> {
        self.0
            .execute(
                const_format::concatcp!("DELETE FROM ", TABLE_STATES, " WHERE table_id = $1"),
                &[&table.inner()],
            )
            .await?;
        Ok(())
    }
}
