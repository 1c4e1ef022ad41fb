/// Caller identity resolution
///
/// Credentials are HS256 bearer tokens whose claims carry the caller id,
/// an optional owner address and a role.
use crate::{
    did::identifier::validate_owner_address,
    error::{RegistryError, RegistryResult},
};
use async_trait::async_trait;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Role levels, ordered by privilege
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Device or account owner
    User,
    /// Can approve and reject pending DIDs
    Moderator,
    /// Can also delete any DID
    Admin,
    /// Full access
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
            Role::SuperAdmin => "superadmin",
        }
    }

    pub fn from_str(s: &str) -> RegistryResult<Self> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            "superadmin" | "super_admin" => Ok(Role::SuperAdmin),
            _ => Err(RegistryError::Authentication(format!("Invalid role: {}", s))),
        }
    }

    /// Check if this role can perform actions requiring another role
    pub fn can_act_as(&self, required: Role) -> bool {
        self >= &required
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

/// Resolved caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub owner_address: Option<String>,
    pub role: Role,
}

impl Principal {
    pub fn new(id: impl Into<String>, owner_address: Option<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            owner_address,
            role,
        }
    }
}

/// Turns a credential into a principal
#[async_trait]
pub trait AuthResolver: Send + Sync {
    async fn resolve(&self, credential: &str) -> RegistryResult<Principal>;
}

/// Token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_address: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    pub exp: i64,
}

/// Resolver backed by shared-secret JWTs
pub struct JwtAuthResolver {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtAuthResolver {
    pub fn new(jwt_secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Allow some clock skew (5 minutes)
        validation.leeway = 300;

        Self {
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            validation,
        }
    }

    fn verify(&self, token: &str) -> RegistryResult<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::warn!("JWT verification failed: {}", e);
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        RegistryError::Authentication("Token has expired".to_string())
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        RegistryError::Authentication("Invalid token signature".to_string())
                    }
                    _ => RegistryError::Authentication(format!("Invalid token: {}", e)),
                }
            })
    }
}

#[async_trait]
impl AuthResolver for JwtAuthResolver {
    async fn resolve(&self, credential: &str) -> RegistryResult<Principal> {
        let token = extract_bearer_token(credential).unwrap_or(credential);
        if token.is_empty() {
            return Err(RegistryError::Authentication("Missing credential".to_string()));
        }

        let claims = self.verify(token)?;

        if claims.sub.trim().is_empty() {
            return Err(RegistryError::Authentication(
                "Invalid JWT: missing 'sub' claim".to_string(),
            ));
        }
        if let Some(addr) = &claims.owner_address {
            validate_owner_address(addr)
                .map_err(|e| RegistryError::Authentication(e.to_string()))?;
        }
        let role = match &claims.role {
            Some(r) => Role::from_str(r)?,
            None => Role::default(),
        };

        tracing::debug!("Resolved principal {} with role {}", claims.sub, role.as_str());

        Ok(Principal {
            id: claims.sub,
            owner_address: claims.owner_address,
            role,
        })
    }
}

/// Strip a `Bearer ` prefix from an Authorization header value
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    header.strip_prefix("Bearer ")
}

/// Sign claims with the shared secret
pub fn issue_token(claims: &Claims, jwt_secret: &str) -> RegistryResult<String> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .map_err(|e| RegistryError::Internal(format!("Failed to sign token: {}", e)))
}
