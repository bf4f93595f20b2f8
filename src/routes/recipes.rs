use warp::{
    http::{header, StatusCode},
    reject::Rejection,
    reply::{self, Reply},
    Filter,
};

use super::state::{json_body, query_pairs, with_state, AppState};
use crate::{
    actions::{
        membership::{add_to_membership, remove_from_membership, Membership},
        recipes::{
            create_recipe, delete_recipe, fetch_recipes, get_recipe, get_recipe_mut, load_relations,
            update_recipe,
        },
        shopping_list::fetch_shopping_list,
        viewer::load_viewer_context,
    },
    constants::SHOPPING_LIST_FILENAME,
    error::ApiError,
    filters::RecipeQuery,
    form::{RecipeForm, RecipeUpdateForm},
    jwt::SessionData,
    pagination::{PageContext, PageLink, PageRequest},
    response::{render_shopping_list, RecipeResponse, ShortRecipeResponse},
    schema::{Id, Recipe},
};

const RECIPES_PATH: &str = "/api/recipes";

pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list = warp::path!("api" / "recipes")
        .and(warp::get())
        .and(query_pairs())
        .and(state.possible_session())
        .and(with_state(state.clone()))
        .and_then(list_recipes);

    let create = warp::path!("api" / "recipes")
        .and(warp::post())
        .and(state.session())
        .and(json_body::<RecipeForm>())
        .and(with_state(state.clone()))
        .and_then(create_recipe_handler);

    let download = warp::path!("api" / "recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(state.session())
        .and(with_state(state.clone()))
        .and_then(download_shopping_cart);

    let detail = warp::path!("api" / "recipes" / Id)
        .and(warp::get())
        .and(state.possible_session())
        .and(with_state(state.clone()))
        .and_then(get_recipe_handler);

    let update = warp::path!("api" / "recipes" / Id)
        .and(warp::patch())
        .and(state.session())
        .and(json_body::<RecipeUpdateForm>())
        .and(with_state(state.clone()))
        .and_then(update_recipe_handler);

    let delete = warp::path!("api" / "recipes" / Id)
        .and(warp::delete())
        .and(state.session())
        .and(with_state(state.clone()))
        .and_then(delete_recipe_handler);

    let favorite = membership_routes("favorite", Membership::Favorites, state.clone());
    let cart = membership_routes("shopping_cart", Membership::ShoppingCart, state);

    list.or(create)
        .or(download)
        .or(detail)
        .or(update)
        .or(delete)
        .or(favorite)
        .or(cart)
}

fn membership_routes(
    segment: &'static str,
    kind: Membership,
    state: AppState,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let path = warp::path("api")
        .and(warp::path("recipes"))
        .and(warp::path::param::<Id>())
        .and(warp::path(segment))
        .and(warp::path::end());

    let add = path
        .clone()
        .and(warp::post())
        .and(state.session())
        .and(with_state(state.clone()))
        .and_then(move |id: Id, session: SessionData, state: AppState| {
            add_membership(kind, id, session, state)
        });

    let remove = path
        .and(warp::delete())
        .and(state.session())
        .and(with_state(state))
        .and_then(move |id: Id, session: SessionData, state: AppState| {
            remove_membership(kind, id, session, state)
        });

    add.or(remove)
}

async fn render_recipe(
    recipe: Recipe,
    viewer: Option<Id>,
    state: &AppState,
) -> Result<RecipeResponse, ApiError> {
    let relations = load_relations(std::slice::from_ref(&recipe), &state.pool).await?;
    let viewer = load_viewer_context(viewer, &state.pool).await?;

    RecipeResponse::render(recipe, &relations, &viewer, &state.media)
}

async fn find_recipe(id: Id, state: &AppState) -> Result<Recipe, ApiError> {
    get_recipe(id, &state.pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No recipe exists with id {id}")))
}

async fn list_recipes(
    params: Vec<(String, String)>,
    session: Option<SessionData>,
    state: AppState,
) -> Result<reply::Response, Rejection> {
    let query = RecipeQuery::from_pairs(&params)?;
    let page = PageRequest::new(query.page, query.limit, state.config.page_size)?;
    let viewer_id = session.map(|session| session.user_id);

    let (recipes, total) = fetch_recipes(&query.filter, &page, viewer_id, &state.pool).await?;
    let relations = load_relations(&recipes, &state.pool).await?;
    let viewer = load_viewer_context(viewer_id, &state.pool).await?;

    let results = recipes
        .into_iter()
        .map(|recipe| RecipeResponse::render(recipe, &relations, &viewer, &state.media))
        .collect::<Result<Vec<_>, _>>()?;

    let context = PageContext::from_rows(results, total, &page, &PageLink::new(RECIPES_PATH, &params))?;
    Ok(reply::json(&context).into_response())
}

async fn get_recipe_handler(
    id: Id,
    session: Option<SessionData>,
    state: AppState,
) -> Result<reply::Response, Rejection> {
    let recipe = find_recipe(id, &state).await?;
    let response = render_recipe(recipe, session.map(|s| s.user_id), &state).await?;

    Ok(reply::json(&response).into_response())
}

async fn create_recipe_handler(
    session: SessionData,
    form: RecipeForm,
    state: AppState,
) -> Result<reply::Response, Rejection> {
    let recipe = form.validate()?;
    let image = state.media.save_recipe_image(&recipe.image).await?;

    let id = match create_recipe(session.user_id, &recipe, &image, &state.pool).await {
        Ok(id) => id,
        Err(e) => {
            state.media.remove(&image).await;
            return Err(e.into());
        }
    };

    let recipe = find_recipe(id, &state).await?;
    let response = render_recipe(recipe, Some(session.user_id), &state).await?;

    Ok(reply::with_status(reply::json(&response), StatusCode::CREATED).into_response())
}

async fn update_recipe_handler(
    id: Id,
    session: SessionData,
    form: RecipeUpdateForm,
    state: AppState,
) -> Result<reply::Response, Rejection> {
    let current = get_recipe_mut(id, &session, &state.pool).await?;
    let changes = form.validate()?;

    let image = match &changes.image {
        Some(image) => Some(state.media.save_recipe_image(image).await?),
        None => None,
    };

    if let Err(e) = update_recipe(id, &changes, image.as_deref(), &state.pool).await {
        if let Some(image) = &image {
            state.media.remove(image).await;
        }
        return Err(e.into());
    }

    if image.is_some() {
        state.media.remove(&current.image).await;
    }

    let recipe = find_recipe(id, &state).await?;
    let response = render_recipe(recipe, Some(session.user_id), &state).await?;

    Ok(reply::json(&response).into_response())
}

async fn delete_recipe_handler(
    id: Id,
    session: SessionData,
    state: AppState,
) -> Result<reply::Response, Rejection> {
    let recipe = get_recipe_mut(id, &session, &state.pool).await?;
    delete_recipe(id, &state.pool).await?;
    state.media.remove(&recipe.image).await;

    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn add_membership(
    kind: Membership,
    id: Id,
    session: SessionData,
    state: AppState,
) -> Result<reply::Response, Rejection> {
    let recipe = find_recipe(id, &state).await?;
    add_to_membership(kind, id, session.user_id, &state.pool).await?;
    log::debug!("User {} added recipe {id} to {}", session.user_id, kind.label());

    let response = ShortRecipeResponse::render(&recipe, &state.media);
    Ok(reply::with_status(reply::json(&response), StatusCode::CREATED).into_response())
}

async fn remove_membership(
    kind: Membership,
    id: Id,
    session: SessionData,
    state: AppState,
) -> Result<reply::Response, Rejection> {
    find_recipe(id, &state).await?;
    remove_from_membership(kind, id, session.user_id, &state.pool).await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn download_shopping_cart(
    session: SessionData,
    state: AppState,
) -> Result<reply::Response, Rejection> {
    let lines = fetch_shopping_list(session.user_id, &state.pool).await?;
    let body = render_shopping_list(&lines);

    let response = reply::with_header(
        reply::with_header(body, header::CONTENT_TYPE, "text/plain; charset=utf-8"),
        header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
    );

    Ok(response.into_response())
}
