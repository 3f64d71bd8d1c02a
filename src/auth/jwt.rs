use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use uuid::Uuid;

use crate::models::{Claims, TokenType};

fn now() -> usize {
    Utc::now().timestamp().max(0) as usize
}

fn generate(
    token_type: TokenType,
    user_id: u64,
    login_id: String,
    role: u8,
    linked_user_id: Option<u64>,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    let claims = Claims {
        user_id,
        sub: login_id,
        role,
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type,
        linked_user_id,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok((token, claims))
}

pub fn generate_access_token(
    user_id: u64,
    login_id: String,
    role: u8,
    linked_user_id: Option<u64>,
    secret: &str,
    ttl: usize,
) -> Result<String, Error> {
    generate(TokenType::Access, user_id, login_id, role, linked_user_id, secret, ttl)
        .map(|(token, _)| token)
}

pub fn generate_refresh_token(
    user_id: u64,
    login_id: String,
    role: u8,
    linked_user_id: Option<u64>,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    generate(TokenType::Refresh, user_id, login_id, role, linked_user_id, secret, ttl)
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_round_trips_claims() {
        let token = generate_access_token(7, "ghdrlfehd@students.local".into(), 3, None, "s3cret", 900)
            .unwrap();
        let claims = verify_token(&token, "s3cret").unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.role, 3);
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn refresh_tokens_carry_unique_ids() {
        let (_, a) = generate_refresh_token(1, "mom".into(), 2, Some(7), "s3cret", 60).unwrap();
        let (_, b) = generate_refresh_token(1, "mom".into(), 2, Some(7), "s3cret", 60).unwrap();
        assert_ne!(a.jti, b.jti);
        assert_eq!(a.linked_user_id, Some(7));
        assert_eq!(a.token_type, TokenType::Refresh);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_access_token(1, "admin".into(), 1, None, "one", 900).unwrap();
        assert!(verify_token(&token, "two").is_err());
    }
}
