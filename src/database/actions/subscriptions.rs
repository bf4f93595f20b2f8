use std::collections::{HashMap, HashSet};

use crate::{
    error::{ApiError, QueryError},
    pagination::PageRequest,
    schema::{AuthorRecipeCount, Id, RankedRecipe, Recipe, User, UserRow},
};

use sqlx::{Pool, Postgres};

fn reject_self_subscription(user_id: Id, author_id: Id) -> Result<(), ApiError> {
    if user_id == author_id {
        return Err(ApiError::Validation(String::from(
            "You cannot subscribe to yourself",
        )));
    }
    Ok(())
}

pub async fn subscribe(user_id: Id, author_id: Id, pool: &Pool<Postgres>) -> Result<(), ApiError> {
    reject_self_subscription(user_id, author_id)?;

    let result = sqlx::query(
        "INSERT INTO subscriptions (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(author_id)
    .execute(pool)
    .await
    .map_err(|e| QueryError::from(e).into_missing_error(format!("No user exists with id {author_id}")))?;

    if result.rows_affected() == 0 {
        return Err(ApiError::Conflict(format!(
            "Subscription to user {author_id} already exists"
        )));
    }

    Ok(())
}

pub async fn unsubscribe(user_id: Id, author_id: Id, pool: &Pool<Postgres>) -> Result<(), ApiError> {
    reject_self_subscription(user_id, author_id)?;

    let result = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
        .bind(user_id)
        .bind(author_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!(
            "You are not subscribed to user {author_id}"
        )));
    }

    Ok(())
}

pub async fn list_subscription_ids(user_id: Id, pool: &Pool<Postgres>) -> Result<HashSet<Id>, ApiError> {
    let rows: Vec<(Id,)> = sqlx::query_as("SELECT author_id FROM subscriptions WHERE user_id = $1")
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Followed authors in subscription order, with the total count.
pub async fn fetch_subscriptions(
    user_id: Id,
    page: &PageRequest,
    pool: &Pool<Postgres>,
) -> Result<(Vec<User>, i64), ApiError> {
    let rows: Vec<UserRow> = sqlx::query_as(
        "
        SELECT u.*, COUNT(*) OVER() AS count
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.user_id = $1
        ORDER BY s.id
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(user_id)
    .bind(page.page_size)
    .bind(page.offset())
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    Ok((rows.into_iter().map(|row| row.user).collect(), total_count))
}

pub async fn count_author_recipes(
    author_ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<HashMap<Id, i64>, ApiError> {
    let rows: Vec<AuthorRecipeCount> = sqlx::query_as(
        "
        SELECT author_id, COUNT(*) AS count
        FROM recipes
        WHERE author_id = ANY($1)
        GROUP BY author_id
    ",
    )
    .bind(author_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows.into_iter().map(|row| (row.author_id, row.count)).collect())
}

/// Newest recipes of each author, at most `limit` per author when given.
pub async fn list_author_recipes(
    author_ids: &[Id],
    limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<HashMap<Id, Vec<Recipe>>, ApiError> {
    let rows: Vec<RankedRecipe> = sqlx::query_as(
        "
        SELECT * FROM (
            SELECT r.*, ROW_NUMBER() OVER (
                PARTITION BY r.author_id ORDER BY r.pub_date DESC, r.id DESC
            ) AS position
            FROM recipes r
            WHERE r.author_id = ANY($1)
        ) ranked
        WHERE $2::BIGINT IS NULL OR position <= $2
        ORDER BY author_id, position
    ",
    )
    .bind(author_ids)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut recipes: HashMap<Id, Vec<Recipe>> = HashMap::new();
    for row in rows {
        recipes
            .entry(row.recipe.author_id)
            .or_default()
            .push(row.recipe);
    }

    Ok(recipes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_subscription_is_rejected() {
        assert!(matches!(
            reject_self_subscription(2, 2),
            Err(ApiError::Validation(_))
        ));
        assert!(reject_self_subscription(2, 3).is_ok());
    }
}
