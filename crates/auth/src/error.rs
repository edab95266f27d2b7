/// Authentication failures, mapped onto wire error codes by the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    Expired,
    #[error("wrong token kind for this operation")]
    WrongTokenKind,
    #[error("invalid credentials")]
    BadCredentials,
}
