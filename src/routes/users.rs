use warp::{
    http::StatusCode,
    reject::Rejection,
    reply::{self, Reply},
    Filter,
};

use super::state::{json_body, query_pairs, with_state, AppState};
use crate::{
    actions::{
        subscriptions::{
            count_author_recipes, fetch_subscriptions, list_author_recipes, subscribe, unsubscribe,
        },
        users::{fetch_users, get_user_by_id, register_user, set_password},
        viewer::load_viewer_context,
    },
    error::ApiError,
    filters::PageQuery,
    form::{SetPasswordForm, UserForm},
    jwt::SessionData,
    pagination::{PageContext, PageLink, PageRequest},
    response::{CreatedUserResponse, SubscriptionResponse, UserResponse, ViewerContext},
    schema::{Id, User},
};

const USERS_PATH: &str = "/api/users";
const SUBSCRIPTIONS_PATH: &str = "/api/users/subscriptions";

pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list = warp::path!("api" / "users")
        .and(warp::get())
        .and(query_pairs())
        .and(state.possible_session())
        .and(with_state(state.clone()))
        .and_then(list_users);

    let register = warp::path!("api" / "users")
        .and(warp::post())
        .and(json_body::<UserForm>())
        .and(with_state(state.clone()))
        .and_then(register_user_handler);

    let me = warp::path!("api" / "users" / "me")
        .and(warp::get())
        .and(state.session())
        .and(with_state(state.clone()))
        .and_then(get_me);

    let password = warp::path!("api" / "users" / "set_password")
        .and(warp::post())
        .and(state.session())
        .and(json_body::<SetPasswordForm>())
        .and(with_state(state.clone()))
        .and_then(set_password_handler);

    let subscriptions = warp::path!("api" / "users" / "subscriptions")
        .and(warp::get())
        .and(query_pairs())
        .and(state.session())
        .and(with_state(state.clone()))
        .and_then(list_subscriptions);

    let detail = warp::path!("api" / "users" / Id)
        .and(warp::get())
        .and(state.possible_session())
        .and(with_state(state.clone()))
        .and_then(get_user_handler);

    let subscribe_route = warp::path!("api" / "users" / Id / "subscribe")
        .and(warp::post())
        .and(query_pairs())
        .and(state.session())
        .and(with_state(state.clone()))
        .and_then(subscribe_handler);

    let unsubscribe_route = warp::path!("api" / "users" / Id / "subscribe")
        .and(warp::delete())
        .and(state.session())
        .and(with_state(state))
        .and_then(unsubscribe_handler);

    list.or(register)
        .or(me)
        .or(password)
        .or(subscriptions)
        .or(detail)
        .or(subscribe_route)
        .or(unsubscribe_route)
}

async fn find_user(id: Id, state: &AppState) -> Result<User, ApiError> {
    get_user_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No user exists with id {id}")))
}

/// Subscription shapes for `authors`, each with its newest recipes.
async fn render_subscriptions(
    authors: &[User],
    recipes_limit: Option<i64>,
    viewer: &ViewerContext,
    state: &AppState,
) -> Result<Vec<SubscriptionResponse>, ApiError> {
    let author_ids: Vec<Id> = authors.iter().map(|author| author.id).collect();
    let (counts, recipes) = tokio::try_join!(
        count_author_recipes(&author_ids, &state.pool),
        list_author_recipes(&author_ids, recipes_limit, &state.pool),
    )?;

    Ok(authors
        .iter()
        .map(|author| {
            SubscriptionResponse::render(
                author,
                recipes.get(&author.id).map(Vec::as_slice).unwrap_or_default(),
                counts.get(&author.id).copied().unwrap_or(0),
                viewer,
                &state.media,
            )
        })
        .collect())
}

async fn list_users(
    params: Vec<(String, String)>,
    session: Option<SessionData>,
    state: AppState,
) -> Result<reply::Response, Rejection> {
    let query = PageQuery::from_pairs(&params)?;
    let page = PageRequest::new(query.page, query.limit, state.config.page_size)?;

    let (users, total) = fetch_users(&page, &state.pool).await?;
    let viewer = load_viewer_context(session.map(|s| s.user_id), &state.pool).await?;

    let results: Vec<UserResponse> = users
        .iter()
        .map(|user| UserResponse::render(user, &viewer))
        .collect();

    let context = PageContext::from_rows(results, total, &page, &PageLink::new(USERS_PATH, &params))?;
    Ok(reply::json(&context).into_response())
}

async fn register_user_handler(form: UserForm, state: AppState) -> Result<reply::Response, Rejection> {
    let form = form.validate()?;
    let user = register_user(&form, &state.pool).await?;
    log::info!("Registered user {} ({})", user.id, user.username);

    let response = CreatedUserResponse::from(user);
    Ok(reply::with_status(reply::json(&response), StatusCode::CREATED).into_response())
}

async fn get_user_handler(
    id: Id,
    session: Option<SessionData>,
    state: AppState,
) -> Result<reply::Response, Rejection> {
    let user = find_user(id, &state).await?;
    let viewer = load_viewer_context(session.map(|s| s.user_id), &state.pool).await?;

    Ok(reply::json(&UserResponse::render(&user, &viewer)).into_response())
}

async fn get_me(session: SessionData, state: AppState) -> Result<reply::Response, Rejection> {
    let user = find_user(session.user_id, &state).await?;
    let viewer = load_viewer_context(Some(session.user_id), &state.pool).await?;

    Ok(reply::json(&UserResponse::render(&user, &viewer)).into_response())
}

async fn set_password_handler(
    session: SessionData,
    form: SetPasswordForm,
    state: AppState,
) -> Result<reply::Response, Rejection> {
    set_password(session.user_id, &form, &state.pool).await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn list_subscriptions(
    params: Vec<(String, String)>,
    session: SessionData,
    state: AppState,
) -> Result<reply::Response, Rejection> {
    let query = PageQuery::from_pairs(&params)?;
    let page = PageRequest::new(query.page, query.limit, state.config.page_size)?;

    let (authors, total) = fetch_subscriptions(session.user_id, &page, &state.pool).await?;
    let viewer = load_viewer_context(Some(session.user_id), &state.pool).await?;
    let results = render_subscriptions(&authors, query.recipes_limit, &viewer, &state).await?;

    let context = PageContext::from_rows(
        results,
        total,
        &page,
        &PageLink::new(SUBSCRIPTIONS_PATH, &params),
    )?;
    Ok(reply::json(&context).into_response())
}

async fn subscribe_handler(
    author_id: Id,
    params: Vec<(String, String)>,
    session: SessionData,
    state: AppState,
) -> Result<reply::Response, Rejection> {
    let query = PageQuery::from_pairs(&params)?;
    let author = find_user(author_id, &state).await?;
    subscribe(session.user_id, author_id, &state.pool).await?;
    log::debug!("User {} subscribed to {author_id}", session.user_id);

    let viewer = load_viewer_context(Some(session.user_id), &state.pool).await?;
    let mut rendered =
        render_subscriptions(std::slice::from_ref(&author), query.recipes_limit, &viewer, &state)
            .await?;

    let response = rendered
        .pop()
        .ok_or_else(|| ApiError::Internal(format!("Subscription to {author_id} was not rendered")))?;
    Ok(reply::with_status(reply::json(&response), StatusCode::CREATED).into_response())
}

async fn unsubscribe_handler(
    author_id: Id,
    session: SessionData,
    state: AppState,
) -> Result<reply::Response, Rejection> {
    find_user(author_id, &state).await?;
    unsubscribe(session.user_id, author_id, &state.pool).await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}
