use warp::{
    reject::Rejection,
    reply::{self, Reply},
    Filter,
};

use super::state::{with_state, AppState};
use crate::{
    actions::{
        ingredients::{get_ingredient, search_ingredients},
        tags::{get_tag, list_tags},
    },
    cache::cache::CacheKey,
    error::ApiError,
    filters::IngredientQuery,
    schema::{Id, Ingredient, Tag},
};

/// Read-only tag and ingredient endpoints, served through the catalog cache.
pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let tags = warp::path!("api" / "tags")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(list_tags_handler);

    let tag = warp::path!("api" / "tags" / Id)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(get_tag_handler);

    let ingredients = warp::path!("api" / "ingredients")
        .and(warp::get())
        .and(warp::query::<IngredientQuery>())
        .and(with_state(state.clone()))
        .and_then(list_ingredients_handler);

    let ingredient = warp::path!("api" / "ingredients" / Id)
        .and(warp::get())
        .and(with_state(state))
        .and_then(get_ingredient_handler);

    tags.or(tag).or(ingredients).or(ingredient)
}

async fn list_tags_handler(state: AppState) -> Result<reply::Response, Rejection> {
    let tags: Vec<Tag> = state
        .cache
        .get_or(CacheKey::TagList, || list_tags(&state.pool))
        .await?;

    Ok(reply::json(&tags).into_response())
}

async fn get_tag_handler(id: Id, state: AppState) -> Result<reply::Response, Rejection> {
    let tag: Option<Tag> = state
        .cache
        .get_or(CacheKey::Tag(id), || get_tag(id, &state.pool))
        .await?;
    let tag = tag.ok_or_else(|| ApiError::NotFound(format!("No tag exists with id {id}")))?;

    Ok(reply::json(&tag).into_response())
}

async fn list_ingredients_handler(
    query: IngredientQuery,
    state: AppState,
) -> Result<reply::Response, Rejection> {
    let name = query
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());

    let ingredients: Vec<Ingredient> = state
        .cache
        .get_or(
            CacheKey::IngredientSearch(name.unwrap_or_default().to_string()),
            || search_ingredients(name, &state.pool),
        )
        .await?;

    Ok(reply::json(&ingredients).into_response())
}

async fn get_ingredient_handler(id: Id, state: AppState) -> Result<reply::Response, Rejection> {
    let ingredient: Option<Ingredient> = state
        .cache
        .get_or(CacheKey::Ingredient(id), || get_ingredient(id, &state.pool))
        .await?;
    let ingredient = ingredient
        .ok_or_else(|| ApiError::NotFound(format!("No ingredient exists with id {id}")))?;

    Ok(reply::json(&ingredient).into_response())
}
