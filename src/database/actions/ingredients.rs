use crate::{
    error::{ApiError, QueryError},
    filters::like_escape,
    form::IngredientAmountForm,
    schema::{Id, Ingredient, IngredientAmount, NewIngredient},
};

use sqlx::{Pool, Postgres, QueryBuilder};

/// Loads catalog entries, skipping `(name, measurement_unit)` pairs that already exist.
pub async fn create_ingredients(
    ingredients: &[NewIngredient],
    pool: &Pool<Postgres>,
) -> Result<u64, ApiError> {
    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

    let mut created = 0;
    for ingredient in ingredients {
        let result = sqlx::query(
            "
            INSERT INTO ingredients (name, measurement_unit)
            VALUES ($1, $2)
            ON CONFLICT (name, measurement_unit) DO NOTHING
        ",
        )
        .bind(ingredient.name.trim())
        .bind(ingredient.measurement_unit.trim())
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

pub async fn get_ingredient(id: Id, pool: &Pool<Postgres>) -> Result<Option<Ingredient>, ApiError> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Case-insensitive search: names starting with `name` first, then names containing it.
pub async fn search_ingredients(
    name: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, ApiError> {
    let name = name.map(str::trim).filter(|name| !name.is_empty());

    let rows: Vec<Ingredient> = match name {
        Some(name) => {
            let escaped = like_escape(name);
            sqlx::query_as(
                "
                SELECT * FROM ingredients
                WHERE name ILIKE $1
                ORDER BY (name ILIKE $2) DESC, name
            ",
            )
            .bind(format!("%{escaped}%"))
            .bind(format!("{escaped}%"))
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?
        }
        None => sqlx::query_as("SELECT * FROM ingredients ORDER BY name")
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?,
    };

    Ok(rows)
}

pub async fn find_missing_ingredients(
    ids: &[Id],
    executor: &mut sqlx::PgConnection,
) -> Result<Vec<Id>, ApiError> {
    let found: Vec<(Id,)> = sqlx::query_as("SELECT id FROM ingredients WHERE id = ANY($1)")
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

pub async fn list_recipe_ingredients(
    recipe_ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<Vec<IngredientAmount>, ApiError> {
    let rows: Vec<IngredientAmount> = sqlx::query_as(
        "
        SELECT ia.recipe_id, i.id, i.name, i.measurement_unit, ia.amount
        FROM ingredient_amounts ia
        INNER JOIN ingredients i ON i.id = ia.ingredient_id
        WHERE ia.recipe_id = ANY($1)
        ORDER BY ia.id
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

/// Drops every stored amount of the recipe and bulk-inserts `ingredients`.
pub async fn set_recipe_ingredients(
    recipe_id: Id,
    ingredients: &[IngredientAmountForm],
    executor: &mut sqlx::PgConnection,
) -> Result<(), ApiError> {
    sqlx::query("DELETE FROM ingredient_amounts WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *executor)
        .await
        .map_err(QueryError::from)?;

    let mut builder =
        QueryBuilder::<Postgres>::new("INSERT INTO ingredient_amounts (recipe_id, ingredient_id, amount) ");
    builder.push_values(ingredients.iter(), |mut row, ingredient| {
        row.push_bind(recipe_id)
            .push_bind(ingredient.id)
            .push_bind(ingredient.amount);
    });

    builder
        .build()
        .execute(&mut *executor)
        .await
        .map_err(|e| QueryError::from(e).into_reference_error("ingredients"))?;

    Ok(())
}
