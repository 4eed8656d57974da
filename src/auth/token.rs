// JWT validation for access tokens issued by the account service

use crate::auth::{error::AuthError, models::Role};
use jsonwebtoken::{decode, errors::ErrorKind, DecodingKey, Validation};
#[cfg(test)]
use chrono::Utc;
#[cfg(test)]
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,        // user_id
    pub email: String,
    #[serde(default)]
    pub role: Role,
    pub exp: i64,        // expiration timestamp
    pub iat: i64,        // issued at timestamp
}

/// Validates access tokens; issuing them belongs to the account service
pub struct TokenService {
    secret: String,
}

impl TokenService {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }

    /// Validate an access token and return its claims
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
            _ => AuthError::InvalidToken,
        })
    }
}

/// Token issuance for tests, mirroring the account service's 15 minute access tokens
#[cfg(test)]
impl TokenService {
    pub fn generate_access_token(
        &self,
        user_id: i32,
        email: &str,
        role: Role,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            role,
            iat: now,
            exp: now + 900,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(self.secret.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_token_service() -> TokenService {
        TokenService::new("test_secret_key_for_testing_purposes".to_string())
    }

    #[test]
    fn test_access_token_expiration_is_15_minutes() {
        let service = test_token_service();
        let token = service.generate_access_token(1, "test@example.com", Role::User).unwrap();
        let claims = service.validate_access_token(&token).unwrap();

        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_token_claims_carry_role() {
        let service = test_token_service();
        let token = service.generate_access_token(7, "admin@example.com", Role::Admin).unwrap();
        let claims = service.validate_access_token(&token).unwrap();

        assert_eq!(claims.sub, 7);
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn test_expired_token_is_reported_as_expired() {
        let claims = Claims {
            sub: 1,
            email: "test@example.com".to_string(),
            role: Role::User,
            iat: Utc::now().timestamp() - 1000,
            exp: Utc::now().timestamp() - 500,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret("test_secret_key_for_testing_purposes".as_bytes()),
        )
        .unwrap();

        let result = test_token_service().validate_access_token(&token);
        assert!(matches!(result, Err(AuthError::ExpiredToken)));
    }

    #[test]
    fn test_token_signature_verification() {
        let service1 = TokenService::new("secret1".to_string());
        let service2 = TokenService::new("secret2".to_string());

        let token = service1.generate_access_token(1, "test@example.com", Role::User).unwrap();

        assert!(service1.validate_access_token(&token).is_ok());
        assert!(matches!(service2.validate_access_token(&token), Err(AuthError::InvalidToken)));
    }

    proptest! {
        #[test]
        fn prop_token_claims_contain_identity(
            user_id in 1i32..1000000,
            email in "[a-z]{3,10}@[a-z]{3,10}\\.(com|org|net)"
        ) {
            let service = test_token_service();
            let token = service.generate_access_token(user_id, &email, Role::User)?;
            let claims = service.validate_access_token(&token)?;
            prop_assert_eq!(claims.sub, user_id);
            prop_assert_eq!(claims.email, email);
        }

        #[test]
        fn prop_malformed_tokens_rejected(malformed in "[a-zA-Z0-9]{10,50}") {
            let service = test_token_service();
            prop_assert!(service.validate_access_token(&malformed).is_err());
        }
    }
}
