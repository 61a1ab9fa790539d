use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{Principal, Role};
use crate::errors::AppError;

pub const DEFAULT_ISSUER: &str = "budget-builder";
pub const DEFAULT_AUDIENCE: &str = "budget-builder";
const DEFAULT_ACCESS_TTL_MINUTES: i64 = 10;
const DEFAULT_REFRESH_TTL_HOURS: i64 = 24;

/// Names of the non-registered claims carried by access tokens.
///
/// Each codec owns its vocabulary; nothing is configured process-wide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimNames {
    pub name: String,
    pub role: String,
}

impl Default for ClaimNames {
    fn default() -> Self {
        Self {
            name: "name".to_string(),
            role: "role".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub claim_names: ClaimNames,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("claim_names", &self.claim_names)
            .finish()
    }
}

impl JwtConfig {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: Arc::new(secret.into()),
            issuer: DEFAULT_ISSUER.to_string(),
            audience: DEFAULT_AUDIENCE.to_string(),
            access_ttl: Duration::minutes(DEFAULT_ACCESS_TTL_MINUTES),
            refresh_ttl: Duration::hours(DEFAULT_REFRESH_TTL_HOURS),
            claim_names: ClaimNames::default(),
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        if secret.is_empty() {
            return Err(AppError::configuration("JWT_SECRET must not be empty"));
        }

        let access_minutes = positive_from_env("JWT_ACCESS_TTL_MINUTES", DEFAULT_ACCESS_TTL_MINUTES)?;
        let refresh_hours = positive_from_env("JWT_REFRESH_TTL_HOURS", DEFAULT_REFRESH_TTL_HOURS)?;

        let mut config = Self::new(secret.into_bytes());
        config.issuer = std::env::var("JWT_VALID_ISSUER").unwrap_or_else(|_| DEFAULT_ISSUER.to_string());
        config.audience = std::env::var("JWT_VALID_AUDIENCE").unwrap_or_else(|_| DEFAULT_AUDIENCE.to_string());
        config.access_ttl = Duration::minutes(access_minutes);
        config.refresh_ttl = Duration::hours(refresh_hours);
        Ok(config)
    }

    pub fn with_claim_names(mut self, claim_names: ClaimNames) -> Self {
        self.claim_names = claim_names;
        self
    }
}

fn positive_from_env(key: &str, default: i64) -> Result<i64, AppError> {
    let value = std::env::var(key)
        .map(|val| val.parse::<i64>())
        .unwrap_or(Ok(default))
        .map_err(|_| AppError::configuration(format!("{key} must be a valid integer")))?;

    if value <= 0 {
        return Err(AppError::configuration(format!("{key} must be positive")));
    }
    Ok(value)
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    Expired,
    #[error("malformed token")]
    Malformed,
    #[error("failed to sign token")]
    Signing,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::ImmatureSignature
            | ErrorKind::InvalidAlgorithm => Self::InvalidToken,
            _ => Self::Malformed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessClaims {
    pub sub: Uuid,
    pub jti: Uuid,
    pub name: String,
    pub roles: HashSet<Role>,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and verifies HS256 access/refresh tokens.
///
/// Access tokens carry the user-name and role claims; refresh tokens carry
/// neither, which is how the two kinds are told apart on decode.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    config: JwtConfig,
}

impl TokenCodec {
    pub fn new(config: JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_audience(&[config.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);

        Self {
            encoding: EncodingKey::from_secret(&config.secret),
            decoding: DecodingKey::from_secret(&config.secret),
            validation,
            config,
        }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    pub fn issue_access_token(
        &self,
        user_name: &str,
        user_id: Uuid,
        roles: impl IntoIterator<Item = Role>,
    ) -> Result<String, TokenError> {
        self.issue_access_token_at(user_name, user_id, roles, Utc::now())
    }

    pub fn issue_access_token_at(
        &self,
        user_name: &str,
        user_id: Uuid,
        roles: impl IntoIterator<Item = Role>,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let mut roles: Vec<Role> = roles.into_iter().collect();
        roles.sort();
        roles.dedup();

        let mut claims = self.registered_claims(user_id, issued_at, self.config.access_ttl);
        claims.insert(self.config.claim_names.name.clone(), Value::String(user_name.to_string()));
        claims.insert(
            self.config.claim_names.role.clone(),
            Value::Array(roles.iter().map(|role| Value::String(role.as_str().to_string())).collect()),
        );

        self.sign(&claims)
    }

    pub fn issue_refresh_token(&self, user_id: Uuid) -> Result<String, TokenError> {
        self.issue_refresh_token_at(user_id, Utc::now())
    }

    pub fn issue_refresh_token_at(&self, user_id: Uuid, issued_at: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = self.registered_claims(user_id, issued_at, self.config.refresh_ttl);
        self.sign(&claims)
    }

    pub fn decode_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let claims = self.verify(token)?;

        let name = match claims.get(&self.config.claim_names.name) {
            Some(Value::String(name)) => name.clone(),
            Some(_) => return Err(TokenError::Malformed),
            // a refresh token presented where an access token is expected
            None => return Err(TokenError::InvalidToken),
        };

        Ok(AccessClaims {
            sub: read_uuid(&claims, "sub")?,
            jti: read_uuid(&claims, "jti")?,
            name,
            roles: read_roles(claims.get(&self.config.claim_names.role))?,
            iat: read_i64(&claims, "iat")?,
            exp: read_i64(&claims, "exp")?,
        })
    }

    pub fn decode_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        let claims = self.verify(token)?;

        if claims.contains_key(&self.config.claim_names.role) || claims.contains_key(&self.config.claim_names.name) {
            return Err(TokenError::InvalidToken);
        }

        Ok(RefreshClaims {
            sub: read_uuid(&claims, "sub")?,
            jti: read_uuid(&claims, "jti")?,
            iat: read_i64(&claims, "iat")?,
            exp: read_i64(&claims, "exp")?,
        })
    }

    fn registered_claims(&self, user_id: Uuid, issued_at: DateTime<Utc>, ttl: Duration) -> Map<String, Value> {
        let mut claims = Map::new();
        claims.insert("sub".to_string(), Value::String(user_id.to_string()));
        claims.insert("jti".to_string(), Value::String(Uuid::new_v4().to_string()));
        claims.insert("iat".to_string(), Value::from(issued_at.timestamp()));
        claims.insert("exp".to_string(), Value::from((issued_at + ttl).timestamp()));
        claims.insert("iss".to_string(), Value::String(self.config.issuer.clone()));
        claims.insert("aud".to_string(), Value::String(self.config.audience.clone()));
        claims
    }

    fn sign(&self, claims: &Map<String, Value>) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(|err| {
            tracing::error!(error = %err, "token signing failed");
            TokenError::Signing
        })
    }

    fn verify(&self, token: &str) -> Result<Map<String, Value>, TokenError> {
        jsonwebtoken::decode::<Map<String, Value>>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(TokenError::from)
    }
}

fn read_uuid(claims: &Map<String, Value>, key: &str) -> Result<Uuid, TokenError> {
    claims
        .get(key)
        .and_then(Value::as_str)
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or(TokenError::Malformed)
}

fn read_i64(claims: &Map<String, Value>, key: &str) -> Result<i64, TokenError> {
    claims.get(key).and_then(Value::as_i64).ok_or(TokenError::Malformed)
}

// Single-role tokens may carry a bare string instead of an array.
fn read_roles(value: Option<&Value>) -> Result<HashSet<Role>, TokenError> {
    let parse = |raw: &Value| -> Result<Role, TokenError> {
        raw.as_str()
            .and_then(|name| Role::from_str(name).ok())
            .ok_or(TokenError::Malformed)
    };

    match value {
        None => Ok(HashSet::new()),
        Some(Value::Array(items)) => items.iter().map(parse).collect(),
        Some(single @ Value::String(_)) => Ok(HashSet::from([parse(single)?])),
        Some(_) => Err(TokenError::Malformed),
    }
}

/// The authenticated caller of a protected route.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub principal: Principal,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::unauthorized("Authorization header missing"))?;

        let claims = state
            .jwt
            .decode_access(token)
            .map_err(|err| AppError::unauthorized(err.to_string()))?;

        // A deleted subject surfaces as 422 unknown_user, not 401.
        let principal = state.auth.principal(&claims).await?;

        Ok(AuthUser { principal })
    }
}
