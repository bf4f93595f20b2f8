use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{config::Config, error::QueryError};

const SCHEMA_LOCK_ID: i64 = 0x666f_6f64;

/// Tables are created if missing; existing data is never touched.
const SCHEMA: &[&str] = &[
    "
    CREATE TABLE IF NOT EXISTS users (
        id SERIAL PRIMARY KEY,
        email VARCHAR(254) NOT NULL UNIQUE,
        username VARCHAR(150) NOT NULL UNIQUE,
        first_name VARCHAR(150) NOT NULL,
        last_name VARCHAR(150) NOT NULL,
        password TEXT NOT NULL
    )
    ",
    "CREATE UNIQUE INDEX IF NOT EXISTS users_email_lower_key ON users (LOWER(email))",
    "
    CREATE TABLE IF NOT EXISTS tags (
        id SERIAL PRIMARY KEY,
        name VARCHAR(255) NOT NULL UNIQUE,
        color VARCHAR(7) NOT NULL UNIQUE,
        slug VARCHAR(50) NOT NULL UNIQUE
    )
    ",
    "
    CREATE TABLE IF NOT EXISTS ingredients (
        id SERIAL PRIMARY KEY,
        name VARCHAR(200) NOT NULL,
        measurement_unit VARCHAR(200) NOT NULL,
        CONSTRAINT unique_ingredient UNIQUE (name, measurement_unit)
    )
    ",
    "
    CREATE TABLE IF NOT EXISTS recipes (
        id SERIAL PRIMARY KEY,
        author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        name VARCHAR(255) NOT NULL,
        text TEXT NOT NULL,
        cooking_time INTEGER NOT NULL CHECK (cooking_time >= 1),
        image TEXT NOT NULL,
        pub_date TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    ",
    "CREATE INDEX IF NOT EXISTS recipes_pub_date_idx ON recipes (pub_date DESC)",
    "CREATE INDEX IF NOT EXISTS recipes_author_idx ON recipes (author_id)",
    "
    CREATE TABLE IF NOT EXISTS recipe_tags (
        recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
        tag_id INTEGER NOT NULL CONSTRAINT recipe_tags_tag_fkey REFERENCES tags(id) ON DELETE CASCADE,
        PRIMARY KEY (recipe_id, tag_id)
    )
    ",
    "
    CREATE TABLE IF NOT EXISTS ingredient_amounts (
        id SERIAL PRIMARY KEY,
        recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
        ingredient_id INTEGER NOT NULL CONSTRAINT ingredient_amounts_ingredient_fkey REFERENCES ingredients(id) ON DELETE CASCADE,
        amount INTEGER NOT NULL CHECK (amount >= 1),
        CONSTRAINT unique_ingredient_amount UNIQUE (recipe_id, ingredient_id)
    )
    ",
    "
    CREATE TABLE IF NOT EXISTS favorites (
        id SERIAL PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
        CONSTRAINT unique_favorite_recipes UNIQUE (user_id, recipe_id)
    )
    ",
    "
    CREATE TABLE IF NOT EXISTS shopping_cart (
        id SERIAL PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
        CONSTRAINT unique_cart_user_recipes UNIQUE (user_id, recipe_id)
    )
    ",
    "
    CREATE TABLE IF NOT EXISTS subscriptions (
        id SERIAL PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        CONSTRAINT unique_subscription UNIQUE (user_id, author_id),
        CONSTRAINT no_self_subscription CHECK (user_id <> author_id)
    )
    ",
];

pub async fn connect(config: &Config) -> Result<PgPool, QueryError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;

    Ok(pool)
}

/// A pool that only opens connections on first use.
pub fn connect_lazy(config: &Config) -> Result<PgPool, QueryError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect_lazy(&config.database_url)?;

    Ok(pool)
}

pub async fn bootstrap_schema(pool: &PgPool) -> Result<(), QueryError> {
    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

    // concurrent CREATE TABLE IF NOT EXISTS can still collide on pg_type
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(SCHEMA_LOCK_ID)
        .execute(&mut *tr)
        .await?;

    for statement in SCHEMA {
        sqlx::query(statement).execute(&mut *tr).await?;
    }

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;

    log::info!("Database schema is up to date");
    Ok(())
}
