//! Verification of the HS256 bearer tokens issued by the identity provider.
//!
//! The pipeline never issues tokens to clients; [`encode_token`] exists so
//! local tooling and tests can mint tokens with the shared secret.

use crate::error::Error;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::*;
use service::config::Config;

mod claims;

pub use claims::Claims;

fn secret(config: &Config) -> Result<String, Error> {
    config.jwt_secret().ok_or_else(|| {
        warn!("JWT_SECRET is not configured, bearer tokens cannot be verified");
        Error::config("JWT_SECRET is not set")
    })
}

/// Decodes and validates `token`, including its expiry.
pub fn decode_token(config: &Config, token: &str) -> Result<Claims, Error> {
    let secret = secret(config)?;
    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .inspect_err(|err| debug!("Rejected bearer token: {err}"))?;
    Ok(data.claims)
}

pub fn encode_token(config: &Config, claims: &Claims) -> Result<String, Error> {
    let secret = secret(config)?;
    Ok(encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}
