use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        jwt::generate_jwt_session,
    },
    error::{ApiError, QueryError},
    form::{SetPasswordForm, UserForm},
    pagination::PageRequest,
    schema::{Id, User, UserRow},
};

use sqlx::{Pool, Postgres};

pub async fn get_user_by_email(pool: &Pool<Postgres>, email: &str) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: Id) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_users_by_ids(pool: &Pool<Postgres>, ids: &[Id]) -> Result<Vec<User>, ApiError> {
    let rows: Vec<User> = sqlx::query_as("SELECT * FROM users WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(rows)
}

pub async fn fetch_users(
    page: &PageRequest,
    pool: &Pool<Postgres>,
) -> Result<(Vec<User>, i64), ApiError> {
    let rows: Vec<UserRow> =
        sqlx::query_as("SELECT u.*, COUNT(*) OVER() AS count FROM users u ORDER BY u.id LIMIT $1 OFFSET $2")
            .bind(page.page_size)
            .bind(page.offset())
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    Ok((rows.into_iter().map(|row| row.user).collect(), total_count))
}

/// Creates a user from a validated form; the password is stored as an argon2 hash.
pub async fn register_user(form: &UserForm, pool: &Pool<Postgres>) -> Result<User, ApiError> {
    let password = hash_password(&form.password)?;

    let result: Result<User, sqlx::Error> = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
    ",
    )
    .bind(&form.email)
    .bind(&form.username)
    .bind(&form.first_name)
    .bind(&form.last_name)
    .bind(password)
    .fetch_one(pool)
    .await;

    match result {
        Ok(user) => Ok(user),
        Err(e) => {
            let e = QueryError::from(e);
            if e.is_unique_violation() {
                let field = match e.constraint() {
                    Some("users_email_key" | "users_email_lower_key") => "email",
                    Some("users_username_key") => "username",
                    _ => "email or username",
                };
                return Err(ApiError::Validation(format!(
                    "A user with that {field} already exists"
                )));
            }
            Err(e.into())
        }
    }
}

pub async fn set_password(
    user_id: Id,
    form: &SetPasswordForm,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    let user = get_user_by_id(pool, user_id)
        .await?
        .ok_or_else(ApiError::not_found)?;

    if !verify_password(&form.current_password, &user.password)? {
        return Err(ApiError::Validation(String::from(
            "Current password is incorrect",
        )));
    }
    form.validate()?;

    let password = hash_password(&form.new_password)?;
    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(password)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    log::info!("User {user_id} changed their password");
    Ok(())
}

pub async fn login_user(
    email: &str,
    password: &str,
    secret: &str,
    lifetime_hours: i64,
    pool: &Pool<Postgres>,
) -> Result<String, ApiError> {
    let user = get_user_by_email(pool, email)
        .await?
        .ok_or_else(|| ApiError::Validation(String::from("Invalid credentials")))?;

    if !verify_password(password, &user.password)? {
        return Err(ApiError::Validation(String::from("Invalid credentials")));
    }

    generate_jwt_session(&user, secret, lifetime_hours)
}
