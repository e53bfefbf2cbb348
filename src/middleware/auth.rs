use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::auth::{AuthError, Claims};
use crate::error::ApiError;

/// Authenticated caller extracted from the identity provider's JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub sub: String,
    pub email: String,
    pub full_name: Option<String>,
}

impl TryFrom<Claims> for AuthUser {
    type Error = AuthError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let full_name = claims.full_name().map(str::to_string);
        let email = claims
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| AuthError::InvalidToken("missing email claim".to_string()))?;
        Ok(Self {
            sub: claims.sub,
            email: email.trim().to_lowercase(),
            full_name,
        })
    }
}

/// JWT authentication middleware that validates tokens and extracts user context
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_jwt_from_headers(request.headers())?;
    let claims = state.auth.validate(token)?;

    let auth_user = AuthUser::try_from(claims)?;
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken("Missing Authorization header"))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AuthError::MissingToken("Invalid Authorization header format"))?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        Some(_) => Err(AuthError::MissingToken("Empty JWT token")),
        None => Err(AuthError::MissingToken(
            "Authorization header must use Bearer token format",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extracts_bearer_tokens() {
        let mut headers = HeaderMap::new();
        assert!(extract_jwt_from_headers(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(extract_jwt_from_headers(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer  "));
        assert!(extract_jwt_from_headers(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_jwt_from_headers(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn requires_email_claim() {
        let mut claims = Claims::new("sub-1", "Ana@UCB.edu.bo", chrono::Duration::minutes(1));
        let user = AuthUser::try_from(claims.clone()).unwrap();
        assert_eq!(user.email, "ana@ucb.edu.bo");

        claims.email = None;
        assert!(AuthUser::try_from(claims).is_err());
    }
}
