use warp::{
    http::StatusCode,
    reject::Rejection,
    reply::{self, Reply},
    Filter,
};

use super::state::{json_body, with_state, AppState};
use crate::{
    actions::users::login_user, form::LoginForm, jwt::SessionData, response::TokenResponse,
};

pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let login = warp::path!("api" / "auth" / "token" / "login")
        .and(warp::post())
        .and(json_body::<LoginForm>())
        .and(with_state(state.clone()))
        .and_then(login_handler);

    let logout = warp::path!("api" / "auth" / "token" / "logout")
        .and(warp::post())
        .and(state.session())
        .and_then(logout_handler);

    login.or(logout)
}

async fn login_handler(form: LoginForm, state: AppState) -> Result<reply::Response, Rejection> {
    let auth_token = login_user(
        form.email.trim(),
        &form.password,
        &state.config.jwt_secret,
        state.config.token_lifetime_hours,
        &state.pool,
    )
    .await?;

    Ok(reply::json(&TokenResponse { auth_token }).into_response())
}

/// Tokens are stateless; the client drops its copy.
async fn logout_handler(session: SessionData) -> Result<reply::Response, Rejection> {
    log::debug!("User {} logged out", session.user_id);
    Ok(StatusCode::NO_CONTENT.into_response())
}
