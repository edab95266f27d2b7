use super::error::StoreError;
use super::ledger::Ledger;
use super::ledger::LedgerEntry;
use super::nights::Nights;
use super::snapshots::Snapshots;
use super::users::Account;
use super::users::Users;
use hg_auth::Role;
use hg_core::ID;
use hg_core::Member;
use hg_core::Night;
use hg_table::Table;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// In-memory store: the test double, and the zero-dependency runtime
/// when no `DB_URL` is configured. Same contracts as [`Postgres`],
/// nothing survives a restart.
///
/// [`Postgres`]: super::postgres::Postgres
#[derive(Debug, Default)]
pub struct Memory {
    accounts: Mutex<Vec<(Account, String)>>,
    night: Mutex<Option<ID<Night>>>,
    ledger: Mutex<Vec<LedgerEntry>>,
    snapshots: Mutex<HashMap<ID<Table>, serde_json::Value>>,
}

#[async_trait::async_trait]
impl Users for Memory {
    async fn register(&self, username: &str, password: &str) -> Result<Account, StoreError> {
        let mut accounts = self.accounts.lock().await;
        if accounts
            .iter()
            .any(|(a, _)| a.username.eq_ignore_ascii_case(username))
        {
            return Err(StoreError::Conflict);
        }
        let account = Account {
            id: ID::default(),
            username: username.to_string(),
            role: match accounts.is_empty() {
                true => Role::Admin,
                false => Role::Player,
            },
        };
        let hash = hg_auth::hash_password(password)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        accounts.push((account.clone(), hash));
        Ok(account)
    }

    async fn login(&self, username: &str, password: &str) -> Result<Account, StoreError> {
        self.accounts
            .lock()
            .await
            .iter()
            .find(|(a, _)| a.username.eq_ignore_ascii_case(username))
            .filter(|(_, hash)| hg_auth::verify_password(password, hash))
            .map(|(a, _)| a.clone())
            .ok_or(StoreError::BadCredentials)
    }

    async fn lookup(&self, user: ID<Member>) -> Result<Option<Account>, StoreError> {
        Ok(self
            .accounts
            .lock()
            .await
            .iter()
            .find(|(a, _)| a.id == user)
            .map(|(a, _)| a.clone()))
    }
}

#[async_trait::async_trait]
impl Nights for Memory {
    async fn active(&self) -> Result<ID<Night>, StoreError> {
        let mut night = self.night.lock().await;
        Ok(*night.get_or_insert_with(ID::default))
    }

    async fn end(&self, night: ID<Night>) -> Result<(), StoreError> {
        let mut active = self.night.lock().await;
        if *active == Some(night) {
            *active = None;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Ledger for Memory {
    async fn record(&self, entry: LedgerEntry) -> Result<(), StoreError> {
        self.ledger.lock().await.push(entry);
        Ok(())
    }

    async fn entries(&self, night: ID<Night>) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self
            .ledger
            .lock()
            .await
            .iter()
            .filter(|e| e.night == night)
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl Snapshots for Memory {
    async fn save_table(
        &self,
        table: ID<Table>,
        snapshot: &serde_json::Value,
    ) -> Result<(), StoreError> {
        self.snapshots.lock().await.insert(table, snapshot.clone());
        Ok(())
    }

    async fn load_tables(&self) -> Result<Vec<(ID<Table>, serde_json::Value)>, StoreError> {
        Ok(self
            .snapshots
            .lock()
            .await
            .iter()
            .map(|(id, v)| (*id, v.clone()))
            .collect())
    }

    async fn delete_table(&self, table: ID<Table>) -> Result<(), StoreError> {
        self.snapshots.lock().await.remove(&table);
        Ok(())
    }
}
