use crate::{
    error::{ApiError, QueryError},
    schema::{Id, ShoppingListLine},
};

use sqlx::{Pool, Postgres};

/// Sums every ingredient over the recipes in the user's cart.
pub async fn fetch_shopping_list(
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Vec<ShoppingListLine>, ApiError> {
    let lines: Vec<ShoppingListLine> = sqlx::query_as(
        "
        SELECT i.name, i.measurement_unit, SUM(ia.amount) AS total_amount
        FROM shopping_cart sc
        INNER JOIN ingredient_amounts ia ON ia.recipe_id = sc.recipe_id
        INNER JOIN ingredients i ON i.id = ia.ingredient_id
        WHERE sc.user_id = $1
        GROUP BY i.id, i.name, i.measurement_unit
        ORDER BY i.name, i.measurement_unit
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(lines)
}
