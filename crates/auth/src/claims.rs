use super::role::Role;
use hg_core::ID;
use hg_core::Member;

/// Whether a token grants access or only renewal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// The payload of every token we mint.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: uuid::Uuid,
    /// Username, carried so handlers need no directory round-trip.
    pub name: String,
    pub role: Role,
    pub typ: TokenKind,
    /// Expiry, seconds since the epoch.
    pub exp: u64,
}

impl Claims {
    pub fn new(
        user: ID<Member>,
        name: &str,
        role: Role,
        typ: TokenKind,
        ttl: std::time::Duration,
    ) -> Self {
        let exp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time moves slow")
            .as_secs()
            + ttl.as_secs();
        Self {
            sub: user.inner(),
            name: name.to_string(),
            role,
            typ,
            exp,
        }
    }
    pub fn user(&self) -> ID<Member> {
        ID::from(self.sub)
    }
}
