use super::error::StoreError;
use hg_auth::Role;
use hg_core::ID;
use hg_core::Member;

/// A registered identity, as the rest of the system sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: ID<Member>,
    pub username: String,
    pub role: Role,
}

/// User directory: username-only convention, Argon2 at rest.
///
/// The first account ever registered becomes the night's admin; everyone
/// after that is a player.
#[async_trait::async_trait]
pub trait Users: Send + Sync {
    async fn register(&self, username: &str, password: &str) -> Result<Account, StoreError>;
    async fn login(&self, username: &str, password: &str) -> Result<Account, StoreError>;
    async fn lookup(&self, user: ID<Member>) -> Result<Option<Account>, StoreError>;
}
