use std::sync::Arc;

use warp::{reject::Rejection, Filter};

use super::jwt::{verify_jwt_session, SessionData};
use crate::error::ApiError;

/// Accepts `Token <jwt>` and `Bearer <jwt>`.
pub fn extract_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();

    if token.is_empty() {
        return None;
    }

    if scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer") {
        Some(token)
    } else {
        None
    }
}

fn authenticate(header: &str, secret: &str) -> Result<SessionData, ApiError> {
    let token = extract_token(header)
        .ok_or_else(|| ApiError::Unauthorized(String::from("Invalid authorization header.")))?;

    verify_jwt_session(token, secret).map(SessionData::from)
}

pub fn with_session(
    secret: Arc<str>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let secret = secret.clone();
        async move {
            match header {
                Some(header) => authenticate(&header, &secret).map_err(warp::reject::custom),
                None => Err(warp::reject::custom(ApiError::unauthenticated())),
            }
        }
    })
}

/// Anonymous requests pass through as `None`; a present but invalid token is still rejected.
pub fn with_possible_session(
    secret: Arc<str>,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let secret = secret.clone();
        async move {
            match header {
                Some(header) => authenticate(&header, &secret)
                    .map(Some)
                    .map_err(warp::reject::custom),
                None => Ok(None),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_supported_schemes() {
        assert_eq!(extract_token("Token abc"), Some("abc"));
        assert_eq!(extract_token("Bearer abc"), Some("abc"));
        assert_eq!(extract_token("bearer  abc "), Some("abc"));
    }

    #[test]
    fn rejects_other_schemes() {
        assert_eq!(extract_token("Basic abc"), None);
        assert_eq!(extract_token("Token"), None);
        assert_eq!(extract_token("Token "), None);
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let filter = with_session(Arc::from("secret"));
        let result = warp::test::request().filter(&filter).await;

        let rejection = result.unwrap_err();
        assert!(matches!(
            rejection.find::<ApiError>(),
            Some(ApiError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn anonymous_request_has_no_session() {
        let filter = with_possible_session(Arc::from("secret"));
        let session = warp::test::request().filter(&filter).await.unwrap();

        assert!(session.is_none());
    }

    #[tokio::test]
    async fn invalid_token_is_rejected_even_when_optional() {
        let filter = with_possible_session(Arc::from("secret"));
        let result = warp::test::request()
            .header("authorization", "Token nonsense")
            .filter(&filter)
            .await;

        assert!(result.is_err());
    }
}
