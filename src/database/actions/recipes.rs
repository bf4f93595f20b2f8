use std::collections::HashMap;

use crate::{
    actions::{
        ingredients::{find_missing_ingredients, list_recipe_ingredients, set_recipe_ingredients},
        tags::{find_missing_tags, list_recipe_tags, set_recipe_tags},
        users::get_users_by_ids,
    },
    authentication::permissions::ActionType,
    error::{ApiError, QueryError},
    filters::RecipeFilter,
    form::{RecipeChanges, RecipeComponents, ValidRecipe},
    jwt::SessionData,
    pagination::PageRequest,
    response::RecipeRelations,
    schema::{Id, Recipe, RecipeRow},
};

use sqlx::{Pool, Postgres, QueryBuilder};

/// Newest first. Membership filters use `viewer` and are ignored without one.
pub async fn fetch_recipes(
    filter: &RecipeFilter,
    page: &PageRequest,
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<(Vec<Recipe>, i64), ApiError> {
    let mut builder =
        QueryBuilder::<Postgres>::new("SELECT r.*, COUNT(*) OVER() AS count FROM recipes r WHERE TRUE");
    filter.push_conditions(&mut builder, viewer);
    builder
        .push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ")
        .push_bind(page.page_size)
        .push(" OFFSET ")
        .push_bind(page.offset());

    let rows: Vec<RecipeRow> = builder
        .build_query_as::<RecipeRow>()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    Ok((rows.into_iter().map(|row| row.recipe).collect(), total_count))
}

pub async fn get_recipe(id: Id, pool: &Pool<Postgres>) -> Result<Option<Recipe>, ApiError> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Loads a recipe the session is allowed to modify.
pub async fn get_recipe_mut(
    id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, ApiError> {
    let recipe = get_recipe(id, pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No recipe exists with id {id}")))?;

    session.authenticate(ActionType::ManageOwnRecipes, &recipe)?;
    Ok(recipe)
}

/// Authors, tags and ingredient amounts for every recipe in the batch, in three queries.
pub async fn load_relations(
    recipes: &[Recipe],
    pool: &Pool<Postgres>,
) -> Result<RecipeRelations, ApiError> {
    if recipes.is_empty() {
        return Ok(RecipeRelations::default());
    }

    let recipe_ids: Vec<Id> = recipes.iter().map(|recipe| recipe.id).collect();
    let mut author_ids: Vec<Id> = recipes.iter().map(|recipe| recipe.author_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();

    let (authors, tags, ingredients) = tokio::try_join!(
        get_users_by_ids(pool, &author_ids),
        list_recipe_tags(&recipe_ids, pool),
        list_recipe_ingredients(&recipe_ids, pool),
    )?;

    let mut relations = RecipeRelations {
        authors: authors.into_iter().map(|user| (user.id, user)).collect(),
        tags: HashMap::new(),
        ingredients: HashMap::new(),
    };

    for row in tags {
        relations.tags.entry(row.recipe_id).or_default().push(row.tag);
    }
    for row in ingredients {
        relations
            .ingredients
            .entry(row.recipe_id)
            .or_default()
            .push(row);
    }

    Ok(relations)
}

/// Rejects unknown tag or ingredient ids before anything is written.
async fn check_components(
    components: &RecipeComponents,
    executor: &mut sqlx::PgConnection,
) -> Result<(), ApiError> {
    let missing = find_missing_tags(&components.tags, &mut *executor).await?;
    if !missing.is_empty() {
        return Err(ApiError::Validation(format!("Unknown tags: {missing:?}")));
    }

    let ingredient_ids: Vec<Id> = components.ingredients.iter().map(|i| i.id).collect();
    let missing = find_missing_ingredients(&ingredient_ids, &mut *executor).await?;
    if !missing.is_empty() {
        return Err(ApiError::Validation(format!(
            "Unknown ingredients: {missing:?}"
        )));
    }

    Ok(())
}

async fn replace_components(
    recipe_id: Id,
    components: &RecipeComponents,
    executor: &mut sqlx::PgConnection,
) -> Result<(), ApiError> {
    check_components(components, &mut *executor).await?;
    set_recipe_tags(recipe_id, &components.tags, &mut *executor).await?;
    set_recipe_ingredients(recipe_id, &components.ingredients, &mut *executor).await?;

    Ok(())
}

/// Inserts the recipe with its tags and ingredient amounts in one transaction.
pub async fn create_recipe(
    author_id: Id,
    recipe: &ValidRecipe,
    image: &str,
    pool: &Pool<Postgres>,
) -> Result<Id, ApiError> {
    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

    let (id,): (Id,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, text, cooking_time, image)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(author_id)
    .bind(&recipe.name)
    .bind(&recipe.text)
    .bind(recipe.cooking_time)
    .bind(image)
    .fetch_one(&mut *tr)
    .await
    .map_err(QueryError::from)?;

    replace_components(id, &recipe.components, &mut tr).await?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;

    log::info!("User {author_id} created recipe {id}");
    Ok(id)
}

/// Absent scalars keep their stored value; tags and ingredients are replaced.
pub async fn update_recipe(
    id: Id,
    changes: &RecipeChanges,
    image: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

    let result = sqlx::query(
        "
        UPDATE recipes SET
            name = COALESCE($1, name),
            text = COALESCE($2, text),
            cooking_time = COALESCE($3, cooking_time),
            image = COALESCE($4, image)
        WHERE id = $5
    ",
    )
    .bind(changes.name.as_deref())
    .bind(changes.text.as_deref())
    .bind(changes.cooking_time)
    .bind(image)
    .bind(id)
    .execute(&mut *tr)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!("No recipe exists with id {id}")));
    }

    replace_components(id, &changes.components, &mut tr).await?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;

    Ok(())
}

/// Tags, amounts, favorites and cart entries go with the recipe through `ON DELETE CASCADE`.
pub async fn delete_recipe(id: Id, pool: &Pool<Postgres>) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!("No recipe exists with id {id}")));
    }

    log::info!("Recipe {id} deleted");
    Ok(())
}
