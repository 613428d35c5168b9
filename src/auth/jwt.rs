use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    session_expiry: Duration,
    remember_expiry: Duration,
}

impl JwtService {
    pub fn new(
        secret: &str,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        session_expiry: Duration,
        remember_expiry: Duration,
    ) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            audience: audience.into(),
            session_expiry,
            remember_expiry,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(
            &config.jwt_secret,
            config.jwt_issuer.clone(),
            config.jwt_audience.clone(),
            Duration::minutes(config.session_expiry_minutes),
            Duration::days(config.remember_expiry_days),
        ))
    }

    /// Remembered logins get the long lifetime.
    pub fn session_lifetime(&self, remember: bool) -> Duration {
        if remember {
            self.remember_expiry
        } else {
            self.session_expiry
        }
    }

    pub fn generate_token(
        &self,
        session_id: Uuid,
        user_id: i32,
        name: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String> {
        let claims = Claims {
            sub: user_id,
            sid: session_id,
            name: name.to_owned(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: issued_at.timestamp() as usize,
            exp: expires_at.timestamp() as usize,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(&[self.audience.clone()]);
        validation.set_issuer(&[self.issuer.clone()]);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,
    pub sid: Uuid,
    pub name: String,
    pub iss: String,
    pub aud: String,
    pub iat: usize,
    pub exp: usize,
}
