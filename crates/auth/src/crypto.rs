use super::claims::Claims;
use super::claims::TokenKind;
use super::error::AuthError;
use hg_core::ID;
use hg_core::Member;

const ACCESS_TOKEN_DURATION: std::time::Duration = std::time::Duration::from_secs(15 * 60);
const REFRESH_TOKEN_DURATION: std::time::Duration = std::time::Duration::from_secs(7 * 24 * 3600);

/// Both tokens minted at login.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// HS256 signer/verifier for access and refresh tokens.
pub struct Crypto {
    encoding: jsonwebtoken::EncodingKey,
    decoding: jsonwebtoken::DecodingKey,
}

impl Crypto {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: jsonwebtoken::EncodingKey::from_secret(secret),
            decoding: jsonwebtoken::DecodingKey::from_secret(secret),
        }
    }
    /// Mints the access/refresh pair for an authenticated identity.
    pub fn issue(&self, user: ID<Member>, name: &str, role: super::Role) -> Result<TokenPair, AuthError> {
        let access = Claims::new(user, name, role, TokenKind::Access, ACCESS_TOKEN_DURATION);
        let refresh = Claims::new(user, name, role, TokenKind::Refresh, REFRESH_TOKEN_DURATION);
        Ok(TokenPair {
            access_token: self.encode(&access)?,
            refresh_token: self.encode(&refresh)?,
        })
    }
    /// Trades a live refresh token for a fresh access token.
    pub fn refresh(&self, token: &str) -> Result<String, AuthError> {
        let claims = self.decode(token)?;
        if claims.typ != TokenKind::Refresh {
            return Err(AuthError::WrongTokenKind);
        }
        self.encode(&Claims::new(
            claims.user(),
            &claims.name,
            claims.role,
            TokenKind::Access,
            ACCESS_TOKEN_DURATION,
        ))
    }
    /// Decodes and validates an access token into its claims.
    pub fn authenticate(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.decode(token)?;
        match claims.typ {
            TokenKind::Access => Ok(claims),
            TokenKind::Refresh => Err(AuthError::WrongTokenKind),
        }
    }
    fn encode(&self, claims: &Claims) -> Result<String, AuthError> {
        jsonwebtoken::encode(&jsonwebtoken::Header::default(), claims, &self.encoding)
            .map_err(|_| AuthError::InvalidToken)
    }
    fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &jsonwebtoken::Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken,
            })
    }
    /// Digest for storing refresh tokens server-side.
    pub fn hash(token: &str) -> Vec<u8> {
        use sha2::Digest;
        sha2::Sha256::digest(token.as_bytes()).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::super::Role;
    use super::*;

    #[test]
    fn issue_and_authenticate() {
        let crypto = Crypto::new(b"secret");
        let user = ID::default();
        let pair = crypto.issue(user, "alice", Role::Player).unwrap();
        let claims = crypto.authenticate(&pair.access_token).unwrap();
        assert_eq!(claims.user(), user);
        assert_eq!(claims.name, "alice");
        assert_eq!(claims.role, Role::Player);
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let crypto = Crypto::new(b"secret");
        let pair = crypto.issue(ID::default(), "alice", Role::Admin).unwrap();
        assert!(matches!(
            crypto.authenticate(&pair.refresh_token),
            Err(AuthError::WrongTokenKind)
        ));
        let access = crypto.refresh(&pair.refresh_token).unwrap();
        assert_eq!(crypto.authenticate(&access).unwrap().role, Role::Admin);
    }

    #[test]
    fn wrong_secret_rejected() {
        let minter = Crypto::new(b"one");
        let checker = Crypto::new(b"two");
        let pair = minter.issue(ID::default(), "alice", Role::Player).unwrap();
        assert!(matches!(
            checker.authenticate(&pair.access_token),
            Err(AuthError::InvalidToken)
        ));
    }
}
