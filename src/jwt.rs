//! JWT token generation, decoding and validation.
//!
//! Access and refresh tokens share one claim layout and are told apart by the
//! `typ` claim. Nothing is stored server-side: a refresh token is only as good
//! as its signature and expiry.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::auth::Principal;

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived token presented on every request
    Access,
    /// Long-lived token used only to mint new access tokens
    Refresh,
}

/// JWT claims carried by both token types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (principal id, decimal string)
    pub sub: String,
    /// Token type
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// JWT ID
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

impl Claims {
    /// The principal id encoded in `sub`, if it parses.
    pub fn subject_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

/// Default access token lifetime: 5 minutes
pub const DEFAULT_ACCESS_TOKEN_LIFETIME: Duration = Duration::from_secs(5 * 60);

/// Default refresh token lifetime: 1 day
pub const DEFAULT_REFRESH_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// A freshly signed token and the instant it stops being valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
}

impl IssuedToken {
    /// Seconds left until expiry, zero once expired.
    pub fn remaining_secs(&self) -> u64 {
        self.expires_at.saturating_sub(now_secs())
    }
}

/// Access + refresh tokens handed to the client together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

/// Configuration for JWT operations.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
    rotate_refresh_tokens: bool,
}

impl JwtConfig {
    /// Create a new JWT configuration with the given secret and default lifetimes.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_lifetime: DEFAULT_ACCESS_TOKEN_LIFETIME,
            refresh_lifetime: DEFAULT_REFRESH_TOKEN_LIFETIME,
            rotate_refresh_tokens: false,
        }
    }

    pub fn with_lifetimes(mut self, access: Duration, refresh: Duration) -> Self {
        self.access_lifetime = access;
        self.refresh_lifetime = refresh;
        self
    }

    /// Issue a new refresh token on every refresh instead of reusing the old one.
    pub fn with_refresh_rotation(mut self, rotate: bool) -> Self {
        self.rotate_refresh_tokens = rotate;
        self
    }

    pub fn access_lifetime(&self) -> Duration {
        self.access_lifetime
    }

    pub fn refresh_lifetime(&self) -> Duration {
        self.refresh_lifetime
    }

    pub fn rotates_refresh_tokens(&self) -> bool {
        self.rotate_refresh_tokens
    }

    /// Sign arbitrary claims. Exposed so callers can mint tokens with a
    /// chosen expiry.
    pub fn encode_claims(&self, claims: &Claims) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::default(), claims, &self.encoding_key)
            .map_err(TokenError::Encoding)
    }

    fn generate(
        &self,
        user_id: i64,
        token_type: TokenType,
        lifetime: Duration,
    ) -> Result<IssuedToken, TokenError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| TokenError::TimeError)?
            .as_secs();

        let exp = now
            .checked_add(lifetime.as_secs())
            .ok_or(TokenError::LifetimeOverflow)?;
        let claims = Claims {
            sub: user_id.to_string(),
            token_type,
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now,
            exp,
        };

        Ok(IssuedToken {
            token: self.encode_claims(&claims)?,
            expires_at: exp,
        })
    }

    pub fn generate_access_token(&self, user_id: i64) -> Result<IssuedToken, TokenError> {
        self.generate(user_id, TokenType::Access, self.access_lifetime)
    }

    pub fn generate_refresh_token(&self, user_id: i64) -> Result<IssuedToken, TokenError> {
        self.generate(user_id, TokenType::Refresh, self.refresh_lifetime)
    }

    /// Issue a fresh access/refresh pair at login time.
    pub fn issue_for_principal(&self, principal: &Principal) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.generate_access_token(principal.id)?,
            refresh: self.generate_refresh_token(principal.id)?,
        })
    }

    /// Verify the signature and structure, ignoring expiry.
    fn verify_signature(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;

        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(TokenError::Malformed)
    }

    /// Decode a correctly signed token, expired or not.
    pub fn decode(&self, token: &str) -> Option<Claims> {
        self.verify_signature(token).ok()
    }

    /// True when the token is correctly signed, well formed and unexpired.
    pub fn validate(&self, token: &str) -> bool {
        self.verify_signature(token)
            .map(|claims| !is_expired(Some(&claims)))
            .unwrap_or(false)
    }

    fn validate_typed(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let claims = self.verify_signature(token)?;
        if is_expired(Some(&claims)) {
            return Err(TokenError::Expired);
        }
        if claims.token_type != expected {
            return Err(TokenError::WrongTokenType);
        }
        Ok(claims)
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_typed(token, TokenType::Access)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_typed(token, TokenType::Refresh)
    }

    /// Mint a new pair from a refresh token.
    ///
    /// Without rotation the presented refresh token is handed back unchanged,
    /// keeping its original expiry.
    pub fn refresh(&self, refresh_token: &str) -> Result<TokenPair, TokenError> {
        let claims = self.validate_refresh_token(refresh_token)?;
        let user_id = claims.subject_id().ok_or(TokenError::MissingSubject)?;

        let access = self.generate_access_token(user_id)?;
        let refresh = if self.rotate_refresh_tokens {
            self.generate_refresh_token(user_id)?
        } else {
            IssuedToken {
                token: refresh_token.to_string(),
                expires_at: claims.exp,
            }
        };

        Ok(TokenPair { access, refresh })
    }
}

/// True if claims are absent or the expiry instant is at or before now.
pub fn is_expired(claims: Option<&Claims>) -> bool {
    match claims {
        Some(claims) => claims.exp <= now_secs(),
        None => true,
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum TokenError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Bad signature, bad structure or unparseable claims
    Malformed(jsonwebtoken::errors::Error),
    /// Signature is fine but the token has expired
    Expired,
    /// Wrong token type (e.g., using refresh token as access token)
    WrongTokenType,
    /// `sub` is not a principal id
    MissingSubject,
    /// System time error
    TimeError,
    /// Lifetime pushes the expiry past the representable range
    LifetimeOverflow,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            TokenError::Malformed(e) => write!(f, "Failed to decode token: {}", e),
            TokenError::Expired => write!(f, "Token has expired"),
            TokenError::WrongTokenType => write!(f, "Wrong token type"),
            TokenError::MissingSubject => write!(f, "Token has no usable subject"),
            TokenError::TimeError => write!(f, "System time error"),
            TokenError::LifetimeOverflow => write!(f, "Token lifetime is too long"),
        }
    }
}

impl std::error::Error for TokenError {}
