use crate::{
    error::{ApiError, QueryError},
    schema::{Id, NewTag, RecipeTag, Tag},
};

use sqlx::{Pool, Postgres};

pub async fn create_tags(tags: &[NewTag], pool: &Pool<Postgres>) -> Result<u64, ApiError> {
    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

    let mut created = 0;
    for tag in tags {
        let result = sqlx::query(
            "INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(&tag.name)
        .bind(&tag.color)
        .bind(&tag.slug)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;

        created += result.rows_affected();
    }

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;

    Ok(created)
}

pub async fn get_tag(id: Id, pool: &Pool<Postgres>) -> Result<Option<Tag>, ApiError> {
    let tag: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(tag)
}

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, ApiError> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY name")
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(list)
}

/// Ids from `ids` that have no tag row.
pub async fn find_missing_tags(
    ids: &[Id],
    executor: &mut sqlx::PgConnection,
) -> Result<Vec<Id>, ApiError> {
    let found: Vec<(Id,)> = sqlx::query_as("SELECT id FROM tags WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(&mut *executor)
        .await
        .map_err(QueryError::from)?;

    Ok(ids
        .iter()
        .filter(|id| !found.iter().any(|(found,)| found == *id))
        .copied()
        .collect())
}

pub async fn list_recipe_tags(
    recipe_ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeTag>, ApiError> {
    let list: Vec<RecipeTag> = sqlx::query_as(
        "
        SELECT rt.recipe_id, t.id, t.name, t.color, t.slug
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
        ORDER BY t.name
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(list)
}

/// Replaces the tag set of a recipe.
pub async fn set_recipe_tags(
    recipe_id: Id,
    tag_ids: &[Id],
    executor: &mut sqlx::PgConnection,
) -> Result<(), ApiError> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *executor)
        .await
        .map_err(QueryError::from)?;

    sqlx::query(
        "
        INSERT INTO recipe_tags (recipe_id, tag_id)
        SELECT $1, tag_id FROM UNNEST($2::INTEGER[]) AS tag_id
    ",
    )
    .bind(recipe_id)
    .bind(tag_ids)
    .execute(&mut *executor)
    .await
    .map_err(|e| QueryError::from(e).into_reference_error("tags"))?;

    Ok(())
}
