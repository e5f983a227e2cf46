use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};

const ADMIN_CLAIM: &str = "admin";
const NESTED_CLAIMS: &str = "claims";
const UID_CLAIMS: [&str; 3] = ["sub", "user_id", "uid"];

/// Identity returned by the identity provider for a verified bearer token.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedToken {
    pub uid: String,
    pub claims: Map<String, Value>,
}

/// Canonical caller identity, normalized once at the identity boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub uid: String,
    pub is_admin: bool,
}

impl Principal {
    /// The admin privilege may sit at the top level (`admin`) or nested under `claims`;
    /// only the JSON boolean `true` grants it.
    pub fn from_token(token: &DecodedToken) -> Self {
        let top_level = token.claims.get(ADMIN_CLAIM);
        let nested = token
            .claims
            .get(NESTED_CLAIMS)
            .and_then(|claims| claims.get(ADMIN_CLAIM));

        let is_admin = [top_level, nested]
            .into_iter()
            .flatten()
            .any(|value| value == &Value::Bool(true));

        Self {
            uid: token.uid.clone(),
            is_admin,
        }
    }
}

/// Verifies opaque bearer tokens.
pub trait IdentityProvider: Send + Sync {
    fn verify(&self, token: &str) -> Result<DecodedToken, IdentityError>;
}

/// Error enumeration for token verification.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("token rejected: {0}")]
    Rejected(String),
    #[error("token carries no subject")]
    MissingSubject,
}

/// HS256 JWT verifier with optional issuer and audience pinning.
pub struct JwtIdentityProvider {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityProvider {
    pub fn hs256(secret: &[u8], issuer: Option<&str>, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }
        match audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl std::fmt::Debug for JwtIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtIdentityProvider").finish_non_exhaustive()
    }
}

impl IdentityProvider for JwtIdentityProvider {
    fn verify(&self, token: &str) -> Result<DecodedToken, IdentityError> {
        let decoded = decode::<Map<String, Value>>(token, &self.key, &self.validation)
            .map_err(|err| IdentityError::Rejected(err.to_string()))?;
        let claims = decoded.claims;

        let uid = UID_CLAIMS
            .iter()
            .find_map(|claim| claims.get(*claim).and_then(Value::as_str))
            .filter(|uid| !uid.is_empty())
            .ok_or(IdentityError::MissingSubject)?
            .to_string();

        Ok(DecodedToken { uid, claims })
    }
}
