use std::collections::HashSet;

use crate::{
    error::{ApiError, QueryError},
    schema::Id,
};

use sqlx::{Pool, Postgres};

/// Per-user recipe sets sharing one add/remove state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    Favorites,
    ShoppingCart,
}

impl Membership {
    fn table(self) -> &'static str {
        match self {
            Membership::Favorites => "favorites",
            Membership::ShoppingCart => "shopping_cart",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Membership::Favorites => "favorites",
            Membership::ShoppingCart => "shopping cart",
        }
    }
}

/// The unique `(user_id, recipe_id)` constraint decides; a concurrent duplicate reports the same error.
pub async fn add_to_membership(
    kind: Membership,
    recipe_id: Id,
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    let result = sqlx::query(&format!(
        "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        kind.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(|e| {
        QueryError::from(e).into_missing_error(format!("No recipe exists with id {recipe_id}"))
    })?;

    if result.rows_affected() == 0 {
        return Err(ApiError::Conflict(format!(
            "Recipe {recipe_id} already exists in {}",
            kind.label()
        )));
    }

    Ok(())
}

pub async fn remove_from_membership(
    kind: Membership,
    recipe_id: Id,
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
        kind.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!(
            "Recipe {recipe_id} is not in {}",
            kind.label()
        )));
    }

    Ok(())
}

pub async fn list_membership_ids(
    kind: Membership,
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<HashSet<Id>, ApiError> {
    let rows: Vec<(Id,)> = sqlx::query_as(&format!(
        "SELECT recipe_id FROM {} WHERE user_id = $1",
        kind.table()
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memberships_use_their_own_tables() {
        assert_eq!(Membership::Favorites.table(), "favorites");
        assert_eq!(Membership::ShoppingCart.table(), "shopping_cart");
        assert_eq!(Membership::ShoppingCart.label(), "shopping cart");
    }
}
