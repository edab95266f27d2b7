use super::error::StoreError;
use hg_core::ID;
use hg_core::Night;

/// The active poker night: one ledger-scoped session of play.
#[async_trait::async_trait]
pub trait Nights: Send + Sync {
    /// The active night, created if none is open.
    async fn active(&self) -> Result<ID<Night>, StoreError>;
    /// Closes the night; the next call to `active` opens a new one.
    async fn end(&self, night: ID<Night>) -> Result<(), StoreError>;
}
