use super::error::StoreError;
use hg_core::ID;
use hg_table::Table;

/// Full-table JSON backups.
///
/// Written through on stage changes and shutdown, read back on boot to
/// restore tables. Backup write failures are the one place the hub
/// logs and moves on; reads fail the requesting operation.
#[async_trait::async_trait]
pub trait Snapshots: Send + Sync {
    async fn save_table(
        &self,
        table: ID<Table>,
        snapshot: &serde_json::Value,
    ) -> Result<(), StoreError>;
    async fn load_tables(&self) -> Result<Vec<(ID<Table>, serde_json::Value)>, StoreError>;
    async fn delete_table(&self, table: ID<Table>) -> Result<(), StoreError>;
}
