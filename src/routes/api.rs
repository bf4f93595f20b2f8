use std::convert::Infallible;

use warp::{reply::Reply, Filter};

use super::{auth, catalog, recipes, rejection::handle_rejection, state::AppState, users};

/// The whole HTTP surface: `/api/...` plus read-only `/media/...`.
pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let media = warp::path("media").and(warp::fs::dir(state.media.root().to_path_buf()));

    recipes::routes(state.clone())
        .or(users::routes(state.clone()))
        .or(catalog::routes(state.clone()))
        .or(auth::routes(state))
        .or(media)
        .recover(handle_rejection)
        .with(warp::log("foodgram::api"))
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use warp::http::StatusCode;

    use super::*;
    use crate::{
        cache::cache::Cache, config::Config, jwt::generate_jwt_session, schema::User,
        setup::connect_lazy,
    };

    fn state() -> AppState {
        let config = Config::default();
        let pool = connect_lazy(&config).unwrap();
        AppState::new(pool, config, Cache::disabled())
    }

    fn token() -> String {
        let user = User {
            id: 1,
            email: String::from("cook@example.com"),
            username: String::from("cook"),
            first_name: String::from("Ada"),
            last_name: String::from("Cook"),
            password: String::new(),
        };
        generate_jwt_session(&user, &Config::default().jwt_secret, 1).unwrap()
    }

    fn body(response: &warp::http::Response<warp::hyper::body::Bytes>) -> Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    #[tokio::test]
    async fn creating_a_recipe_requires_a_token() {
        let response = warp::test::request()
            .method("POST")
            .path("/api/recipes")
            .json(&json!({}))
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body(&response)["detail"].is_string());
    }

    #[tokio::test]
    async fn invalid_token_is_rejected_on_public_listing() {
        let response = warp::test::request()
            .path("/api/recipes")
            .header("authorization", "Token not-a-jwt")
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn current_user_requires_a_token() {
        let response = warp::test::request()
            .path("/api/users/me")
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn shopping_list_requires_a_token() {
        let response = warp::test::request()
            .path("/api/recipes/download_shopping_cart")
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unsupported_method_is_405() {
        let response = warp::test::request()
            .method("PUT")
            .path("/api/recipes")
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body(&response), json!({ "detail": "Method not allowed" }));
    }

    #[tokio::test]
    async fn out_of_range_page_is_404() {
        let response = warp::test::request()
            .path("/api/recipes?page=9223372036854775807")
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(&response), json!({ "detail": "Invalid page." }));
    }

    #[tokio::test]
    async fn unknown_path_is_404() {
        let response = warp::test::request()
            .path("/api/nothing-here")
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_registration_is_400() {
        let response = warp::test::request()
            .method("POST")
            .path("/api/users")
            .json(&json!({ "email": "cook@example.com" }))
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body(&response)["errors"].is_string());
    }

    #[tokio::test]
    async fn registration_validates_email_before_storage() {
        let response = warp::test::request()
            .method("POST")
            .path("/api/users")
            .json(&json!({
                "email": "not-an-email",
                "username": "cook",
                "first_name": "Ada",
                "last_name": "Cook",
                "password": "secret-password",
            }))
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_ingredients_fail_before_storage() {
        let response = warp::test::request()
            .method("POST")
            .path("/api/recipes")
            .header("authorization", format!("Token {}", token()))
            .json(&json!({
                "ingredients": [],
                "tags": [1],
                "image": "data:image/png;base64,iVBORw0KGgo=",
                "name": "Soup",
                "text": "Boil",
                "cooking_time": 5,
            }))
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body(&response)["errors"]
            .as_str()
            .unwrap()
            .contains("ingredient"));
    }

    #[tokio::test]
    async fn logout_accepts_bearer_tokens() {
        let response = warp::test::request()
            .method("POST")
            .path("/api/auth/token/logout")
            .header("authorization", format!("Bearer {}", token()))
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
