use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    error::ApiError,
    media::MediaStore,
    schema::{Id, IngredientAmount, Recipe, ShoppingListLine, Tag, User},
};

/// What the current viewer has favorited, put in the cart and subscribed to.
/// Loaded once per request; empty for anonymous viewers.
#[derive(Debug, Clone, Default)]
pub struct ViewerContext {
    pub favorites: HashSet<Id>,
    pub shopping_cart: HashSet<Id>,
    pub subscriptions: HashSet<Id>,
}

impl ViewerContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_favorited(&self, recipe_id: Id) -> bool {
        self.favorites.contains(&recipe_id)
    }

    pub fn is_in_shopping_cart(&self, recipe_id: Id) -> bool {
        self.shopping_cart.contains(&recipe_id)
    }

    pub fn is_subscribed(&self, author_id: Id) -> bool {
        self.subscriptions.contains(&author_id)
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct UserResponse {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

impl UserResponse {
    pub fn render(user: &User, viewer: &ViewerContext) -> Self {
        Self {
            email: user.email.to_owned(),
            id: user.id,
            username: user.username.to_owned(),
            first_name: user.first_name.to_owned(),
            last_name: user.last_name.to_owned(),
            is_subscribed: viewer.is_subscribed(user.id),
        }
    }
}

/// Registration response; no viewer-relative fields.
#[derive(Serialize, Debug, Clone)]
pub struct CreatedUserResponse {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<User> for CreatedUserResponse {
    fn from(user: User) -> Self {
        Self {
            email: user.email,
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct IngredientAmountResponse {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

impl From<&IngredientAmount> for IngredientAmountResponse {
    fn from(row: &IngredientAmount) -> Self {
        Self {
            id: row.id,
            name: row.name.to_owned(),
            measurement_unit: row.measurement_unit.to_owned(),
            amount: row.amount,
        }
    }
}

/// Authors, tags and ingredient amounts for a batch of recipes, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct RecipeRelations {
    pub authors: HashMap<Id, User>,
    pub tags: HashMap<Id, Vec<Tag>>,
    pub ingredients: HashMap<Id, Vec<IngredientAmount>>,
}

#[derive(Serialize, Debug, Clone)]
pub struct RecipeResponse {
    pub id: Id,
    pub tags: Vec<Tag>,
    pub author: UserResponse,
    pub ingredients: Vec<IngredientAmountResponse>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,
}

impl RecipeResponse {
    pub fn render(
        recipe: Recipe,
        relations: &RecipeRelations,
        viewer: &ViewerContext,
        media: &MediaStore,
    ) -> Result<Self, ApiError> {
        let author = relations.authors.get(&recipe.author_id).ok_or_else(|| {
            ApiError::Internal(format!(
                "Author {} of recipe {} was not loaded",
                recipe.author_id, recipe.id
            ))
        })?;

        Ok(Self {
            id: recipe.id,
            tags: relations.tags.get(&recipe.id).cloned().unwrap_or_default(),
            author: UserResponse::render(author, viewer),
            ingredients: relations
                .ingredients
                .get(&recipe.id)
                .map(|rows| rows.iter().map(IngredientAmountResponse::from).collect())
                .unwrap_or_default(),
            is_favorited: viewer.is_favorited(recipe.id),
            is_in_shopping_cart: viewer.is_in_shopping_cart(recipe.id),
            image: media.url(&recipe.image),
            name: recipe.name,
            text: recipe.text,
            cooking_time: recipe.cooking_time,
            pub_date: recipe.pub_date,
        })
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ShortRecipeResponse {
    pub id: Id,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl ShortRecipeResponse {
    pub fn render(recipe: &Recipe, media: &MediaStore) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name.to_owned(),
            image: media.url(&recipe.image),
            cooking_time: recipe.cooking_time,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct SubscriptionResponse {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    pub recipes: Vec<ShortRecipeResponse>,
    pub recipes_count: i64,
}

impl SubscriptionResponse {
    pub fn render(
        author: &User,
        recipes: &[Recipe],
        recipes_count: i64,
        viewer: &ViewerContext,
        media: &MediaStore,
    ) -> Self {
        Self {
            email: author.email.to_owned(),
            id: author.id,
            username: author.username.to_owned(),
            first_name: author.first_name.to_owned(),
            last_name: author.last_name.to_owned(),
            is_subscribed: viewer.is_subscribed(author.id),
            recipes: recipes
                .iter()
                .map(|recipe| ShortRecipeResponse::render(recipe, media))
                .collect(),
            recipes_count,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct TokenResponse {
    pub auth_token: String,
}

/// One `name — total unit` line per ingredient.
pub fn render_shopping_list(lines: &[ShoppingListLine]) -> String {
    lines
        .iter()
        .map(|line| {
            format!(
                "{} — {} {}\n",
                line.name, line.total_amount, line.measurement_unit
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: Id) -> User {
        User {
            id,
            email: format!("user{id}@example.com"),
            username: format!("user{id}"),
            first_name: String::from("First"),
            last_name: String::from("Last"),
            password: String::from("hash"),
        }
    }

    fn recipe(id: Id, author_id: Id) -> Recipe {
        Recipe {
            id,
            author_id,
            name: format!("Recipe {id}"),
            text: String::from("Cook it"),
            cooking_time: 10,
            image: format!("recipes/images/{id}.png"),
            pub_date: Utc::now(),
        }
    }

    fn relations() -> RecipeRelations {
        let mut relations = RecipeRelations::default();
        relations.authors.insert(1, user(1));
        relations.tags.insert(
            10,
            vec![Tag {
                id: 1,
                name: String::from("Breakfast"),
                color: String::from("#E26C2D"),
                slug: String::from("breakfast"),
            }],
        );
        relations.ingredients.insert(
            10,
            vec![IngredientAmount {
                recipe_id: 10,
                id: 4,
                name: String::from("flour"),
                measurement_unit: String::from("g"),
                amount: 100,
            }],
        );
        relations
    }

    #[test]
    fn anonymous_viewer_sees_no_flags() {
        let viewer = ViewerContext::anonymous();
        let media = MediaStore::new("/tmp", "/media/");

        let response = RecipeResponse::render(recipe(10, 1), &relations(), &viewer, &media).unwrap();

        assert!(!response.is_favorited);
        assert!(!response.is_in_shopping_cart);
        assert!(!response.author.is_subscribed);
        assert_eq!(response.image, "/media/recipes/images/10.png");
        assert_eq!(response.ingredients[0].amount, 100);
        assert_eq!(response.tags[0].slug, "breakfast");
    }

    #[test]
    fn flags_come_from_viewer_sets() {
        let viewer = ViewerContext {
            favorites: HashSet::from([10]),
            shopping_cart: HashSet::from([11]),
            subscriptions: HashSet::from([1]),
        };
        let media = MediaStore::new("/tmp", "/media/");

        let response = RecipeResponse::render(recipe(10, 1), &relations(), &viewer, &media).unwrap();

        assert!(response.is_favorited);
        assert!(!response.is_in_shopping_cart);
        assert!(response.author.is_subscribed);
    }

    #[test]
    fn missing_author_is_internal_error() {
        let media = MediaStore::new("/tmp", "/media/");
        let result = RecipeResponse::render(
            recipe(10, 99),
            &relations(),
            &ViewerContext::anonymous(),
            &media,
        );

        assert!(matches!(result, Err(ApiError::Internal(_))));
    }

    #[test]
    fn password_is_never_serialized() {
        let value = serde_json::to_value(user(1)).unwrap();
        assert!(value.get("password").is_none());
    }

    #[test]
    fn renders_one_line_per_ingredient() {
        let lines = vec![
            ShoppingListLine {
                name: String::from("flour"),
                measurement_unit: String::from("g"),
                total_amount: 200,
            },
            ShoppingListLine {
                name: String::from("milk"),
                measurement_unit: String::from("ml"),
                total_amount: 300,
            },
        ];

        assert_eq!(
            render_shopping_list(&lines),
            "flour — 200 g\nmilk — 300 ml\n"
        );
        assert_eq!(render_shopping_list(&[]), "");
    }
}
