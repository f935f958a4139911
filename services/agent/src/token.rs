//! Room access tokens: short-lived HS256 JWTs carrying audio grants.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomClaims {
    /// API key the token was minted with.
    pub iss: String,
    pub sub: String,
    pub name: String,
    pub room: String,
    pub exp: i64,
    pub nbf: i64,
    pub video: bool,
    pub audio: bool,
    #[serde(rename = "canPublish")]
    pub can_publish: bool,
    #[serde(rename = "canSubscribe")]
    pub can_subscribe: bool,
}

/// Mints an access token for one participant in one room, valid for `ttl`.
pub fn mint(
    api_key: &str,
    api_secret: &str,
    room: &str,
    identity: &str,
    ttl: Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = RoomClaims {
        iss: api_key.to_string(),
        sub: identity.to_string(),
        name: identity.to_string(),
        room: room.to_string(),
        exp: (now + ttl).timestamp(),
        nbf: now.timestamp(),
        video: true,
        audio: true,
        can_publish: true,
        can_subscribe: true,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(api_secret.as_bytes()),
    )
}

/// Verifies a token's signature and validity window and returns its claims.
pub fn verify(
    api_secret: &str,
    token: &str,
) -> Result<RoomClaims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_nbf = true;
    let data = decode::<RoomClaims>(
        token,
        &DecodingKey::from_secret(api_secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "API7Q6NLPMBAucwL";
    const SECRET: &str = "test-signing-secret";

    #[test]
    fn minted_token_round_trips() {
        let token = mint(KEY, SECRET, "test-room", "user", Duration::hours(1)).unwrap();
        let claims = verify(SECRET, &token).unwrap();

        assert_eq!(claims.iss, KEY);
        assert_eq!(claims.sub, "user");
        assert_eq!(claims.name, "user");
        assert_eq!(claims.room, "test-room");
        assert!(claims.audio);
        assert!(claims.video);
        assert!(claims.can_publish);
        assert!(claims.can_subscribe);
        assert!(claims.exp > claims.nbf);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = mint(KEY, SECRET, "test-room", "user", Duration::hours(1)).unwrap();
        assert!(verify("another-secret", &token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = mint(KEY, SECRET, "test-room", "user", Duration::hours(-2)).unwrap();
        assert!(verify(SECRET, &token).is_err());
    }

    #[test]
    fn grant_claims_use_camel_case_on_the_wire() {
        let token = mint(KEY, SECRET, "test-room", "user", Duration::hours(1)).unwrap();
        let payload = token.split('.').nth(1).unwrap();
        use base64::Engine;
        let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(payload)
            .unwrap();
        let raw: serde_json::Value = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(raw["canPublish"], true);
        assert_eq!(raw["canSubscribe"], true);
    }
}
