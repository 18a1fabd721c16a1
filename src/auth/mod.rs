//! Admin authentication
//!
//! Bearer-token verification for the back-office routes. Token issuance
//! lives with the identity provider; this module only validates.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::core::ServerState;
use crate::utils::AppError;

/// JWT claims carried by admin tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: i64,
}

/// Authenticated user, injected into request extensions
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub role: String,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            role: claims.role,
        }
    }
}

/// HS256 token verification
#[derive(Clone)]
pub struct JwtService {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Extract the token from an `Authorization: Bearer <token>` header
    pub fn extract_from_header(header: &str) -> Option<&str> {
        header.strip_prefix("Bearer ")
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::warn!(error = %e, "JWT validation failed");
                AppError::InvalidToken
            })
    }
}

/// Middleware: require a valid admin token.
///
/// | 错误 | HTTP 状态码 |
/// |------|------------|
/// | 无 Authorization 头 | 401 Unauthorized |
/// | 无效令牌 | 401 InvalidToken |
/// | 非 admin 角色 | 403 Forbidden |
pub async fn require_admin(
    State(state): State<ServerState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Allow CORS preflight through
    if req.method() == http::Method::OPTIONS {
        return Ok(next.run(req).await);
    }

    let auth_header = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) => {
            JwtService::extract_from_header(header).ok_or(AppError::InvalidToken)?
        }
        None => return Err(AppError::Unauthorized),
    };

    let claims = state.jwt_service.validate_token(token)?;
    let user = CurrentUser::from(claims);
    if !user.is_admin() {
        return Err(AppError::Forbidden("Admin role required".to_string()));
    }

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn make_token(secret: &str, role: &str, exp: i64) -> String {
        let claims = Claims {
            sub: "admin-1".to_string(),
            role: role.to_string(),
            exp,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn future_exp() -> i64 {
        crate::utils::time::now_secs() + 3600
    }

    #[test]
    fn test_valid_token_decodes() {
        let service = JwtService::new("test-secret");
        let token = make_token("test-secret", "admin", future_exp());
        let claims = service.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "admin-1");
        assert!(CurrentUser::from(claims).is_admin());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let service = JwtService::new("test-secret");
        let token = make_token("other-secret", "admin", future_exp());
        assert!(service.validate_token(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let service = JwtService::new("test-secret");
        let token = make_token("test-secret", "admin", crate::utils::time::now_secs() - 3600);
        assert!(service.validate_token(&token).is_err());
    }

    #[test]
    fn test_non_admin_role() {
        let service = JwtService::new("test-secret");
        let token = make_token("test-secret", "customer", future_exp());
        let user = CurrentUser::from(service.validate_token(&token).unwrap());
        assert!(!user.is_admin());
    }

    #[test]
    fn test_extract_from_header() {
        assert_eq!(JwtService::extract_from_header("Bearer abc"), Some("abc"));
        assert_eq!(JwtService::extract_from_header("Basic abc"), None);
    }
}
