use std::str::FromStr;

use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};

use crate::{error::ApiError, schema::Id};

/// Restrictions for the recipe listing. Membership filters only apply to an authenticated viewer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub tags: Vec<String>,
    pub author: Option<Id>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

impl RecipeFilter {
    pub fn push_conditions(&self, builder: &mut QueryBuilder<'_, Postgres>, viewer: Option<Id>) {
        if !self.tags.is_empty() {
            builder
                .push(
                    " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = r.id AND t.slug = ANY(",
                )
                .push_bind(self.tags.clone())
                .push("))");
        }

        if let Some(author) = self.author {
            builder.push(" AND r.author_id = ").push_bind(author);
        }

        if let Some(user_id) = viewer {
            if self.is_favorited {
                builder
                    .push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
                    .push_bind(user_id)
                    .push(")");
            }
            if self.is_in_shopping_cart {
                builder
                    .push(" AND EXISTS (SELECT 1 FROM shopping_cart sc WHERE sc.recipe_id = r.id AND sc.user_id = ")
                    .push_bind(user_id)
                    .push(")");
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeQuery {
    pub filter: RecipeFilter,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl RecipeQuery {
    /// `tags` may repeat; every other key is read once.
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self, ApiError> {
        let tags = pairs
            .iter()
            .filter(|(key, value)| key == "tags" && !value.is_empty())
            .map(|(_, value)| value.to_owned())
            .collect();

        Ok(Self {
            filter: RecipeFilter {
                tags,
                author: parse_param(pairs, "author")?,
                is_favorited: parse_flag(pairs, "is_favorited")?,
                is_in_shopping_cart: parse_flag(pairs, "is_in_shopping_cart")?,
            },
            page: parse_param(pairs, "page")?,
            limit: parse_param(pairs, "limit")?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub recipes_limit: Option<i64>,
}

impl PageQuery {
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self, ApiError> {
        let recipes_limit: Option<i64> = parse_param(pairs, "recipes_limit")?;
        if let Some(limit) = recipes_limit {
            if limit < 0 {
                return Err(ApiError::Validation(String::from(
                    "recipes_limit may not be negative",
                )));
            }
        }

        Ok(Self {
            page: parse_param(pairs, "page")?,
            limit: parse_param(pairs, "limit")?,
            recipes_limit,
        })
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct IngredientQuery {
    pub name: Option<String>,
}

pub fn parse_param<T: FromStr>(pairs: &[(String, String)], key: &str) -> Result<Option<T>, ApiError> {
    match pairs.iter().find(|(k, v)| k == key && !v.is_empty()) {
        Some((_, value)) => value
            .parse()
            .map(Some)
            .map_err(|_| ApiError::Validation(format!("Invalid value for {key}: {value}"))),
        None => Ok(None),
    }
}

fn parse_flag(pairs: &[(String, String)], key: &str) -> Result<bool, ApiError> {
    match pairs.iter().find(|(k, v)| k == key && !v.is_empty()) {
        Some((_, value)) => match value.to_ascii_lowercase().as_str() {
            "1" | "true" => Ok(true),
            "0" | "false" => Ok(false),
            _ => Err(ApiError::Validation(format!(
                "Invalid value for {key}: {value}"
            ))),
        },
        None => Ok(false),
    }
}

/// Escapes `%`, `_` and `\` so user input is matched literally by `ILIKE`.
pub fn like_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(values: &[(&str, &str)]) -> Vec<(String, String)> {
        values
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn collects_repeated_tags() {
        let query = RecipeQuery::from_pairs(&pairs(&[
            ("tags", "breakfast"),
            ("tags", "dinner"),
            ("author", "7"),
            ("is_favorited", "1"),
            ("page", "2"),
        ]))
        .unwrap();

        assert_eq!(query.filter.tags, vec!["breakfast", "dinner"]);
        assert_eq!(query.filter.author, Some(7));
        assert!(query.filter.is_favorited);
        assert!(!query.filter.is_in_shopping_cart);
        assert_eq!(query.page, Some(2));
        assert_eq!(query.limit, None);
    }

    #[test]
    fn false_flags_are_no_ops() {
        let query = RecipeQuery::from_pairs(&pairs(&[
            ("is_favorited", "0"),
            ("is_in_shopping_cart", "false"),
        ]))
        .unwrap();

        assert_eq!(query.filter, RecipeFilter::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(RecipeQuery::from_pairs(&pairs(&[("author", "me")])).is_err());
        assert!(RecipeQuery::from_pairs(&pairs(&[("is_favorited", "yes")])).is_err());
        assert!(PageQuery::from_pairs(&pairs(&[("recipes_limit", "-1")])).is_err());
    }

    #[test]
    fn anonymous_viewer_ignores_membership_filters() {
        let filter = RecipeFilter {
            is_favorited: true,
            is_in_shopping_cart: true,
            ..RecipeFilter::default()
        };

        let mut builder = QueryBuilder::<Postgres>::new("SELECT r.* FROM recipes r WHERE TRUE");
        filter.push_conditions(&mut builder, None);

        assert_eq!(builder.sql(), "SELECT r.* FROM recipes r WHERE TRUE");
    }

    #[test]
    fn builds_all_conditions_for_viewer() {
        let filter = RecipeFilter {
            tags: vec![String::from("lunch")],
            author: Some(3),
            is_favorited: true,
            is_in_shopping_cart: true,
        };

        let mut builder = QueryBuilder::<Postgres>::new("SELECT r.* FROM recipes r WHERE TRUE");
        filter.push_conditions(&mut builder, Some(9));
        let sql = builder.sql();

        assert!(sql.contains("t.slug = ANY($1)"));
        assert!(sql.contains("r.author_id = $2"));
        assert!(sql.contains("f.user_id = $3"));
        assert!(sql.contains("sc.user_id = $4"));
    }

    #[test]
    fn escapes_like_wildcards() {
        assert_eq!(like_escape("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(like_escape("salt"), "salt");
    }
}
