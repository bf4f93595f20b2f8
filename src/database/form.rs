use std::collections::HashSet;

use serde::Deserialize;

use crate::{
    constants::{EMAIL_MAX_LENGTH, RECIPE_NAME_MAX_LENGTH, USER_FIELD_MAX_LENGTH},
    error::ApiError,
    media::{decode_image, DecodedImage},
    schema::Id,
};

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngredientAmountForm {
    pub id: Id,
    pub amount: i32,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RecipeForm {
    #[serde(default)]
    pub ingredients: Vec<IngredientAmountForm>,
    #[serde(default)]
    pub tags: Vec<Id>,
    pub image: String,
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
}

/// PATCH body: scalars keep their stored value when absent, tags and ingredients are replaced.
#[derive(Deserialize, Debug, Clone)]
pub struct RecipeUpdateForm {
    #[serde(default)]
    pub ingredients: Vec<IngredientAmountForm>,
    #[serde(default)]
    pub tags: Vec<Id>,
    pub image: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
}

/// Tag set and ingredient amounts that replace whatever a recipe had before.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeComponents {
    pub tags: Vec<Id>,
    pub ingredients: Vec<IngredientAmountForm>,
}

impl RecipeComponents {
    pub fn validate(
        tags: Vec<Id>,
        ingredients: Vec<IngredientAmountForm>,
    ) -> Result<Self, ApiError> {
        if tags.is_empty() {
            return Err(ApiError::Validation(String::from(
                "At least one tag must be specified in tags",
            )));
        }
        if ingredients.is_empty() {
            return Err(ApiError::Validation(String::from(
                "At least one ingredient must be specified in ingredients",
            )));
        }

        let mut seen = HashSet::new();
        let tags = tags.into_iter().filter(|id| seen.insert(*id)).collect();

        let mut seen = HashSet::new();
        for ingredient in ingredients.iter() {
            if ingredient.amount < 1 {
                return Err(ApiError::Validation(format!(
                    "Amount of ingredient {} must be at least 1, got {}",
                    ingredient.id, ingredient.amount
                )));
            }
            if !seen.insert(ingredient.id) {
                return Err(ApiError::Validation(format!(
                    "Ingredient {} is listed more than once",
                    ingredient.id
                )));
            }
        }

        Ok(Self { tags, ingredients })
    }
}

#[derive(Debug, Clone)]
pub struct ValidRecipe {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub image: DecodedImage,
    pub components: RecipeComponents,
}

#[derive(Debug, Clone)]
pub struct RecipeChanges {
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
    pub image: Option<DecodedImage>,
    pub components: RecipeComponents,
}

impl RecipeForm {
    pub fn validate(self) -> Result<ValidRecipe, ApiError> {
        let components = RecipeComponents::validate(self.tags, self.ingredients)?;

        Ok(ValidRecipe {
            name: validate_recipe_name(self.name)?,
            text: validate_required("text", self.text)?,
            cooking_time: validate_cooking_time(self.cooking_time)?,
            image: decode_image(&self.image)?,
            components,
        })
    }
}

impl RecipeUpdateForm {
    pub fn validate(self) -> Result<RecipeChanges, ApiError> {
        let components = RecipeComponents::validate(self.tags, self.ingredients)?;

        Ok(RecipeChanges {
            name: self.name.map(validate_recipe_name).transpose()?,
            text: self
                .text
                .map(|text| validate_required("text", text))
                .transpose()?,
            cooking_time: self.cooking_time.map(validate_cooking_time).transpose()?,
            image: self.image.as_deref().map(decode_image).transpose()?,
            components,
        })
    }
}

fn validate_cooking_time(cooking_time: i32) -> Result<i32, ApiError> {
    if cooking_time < 1 {
        return Err(ApiError::Validation(format!(
            "Cooking time must be at least 1 minute, got {cooking_time}"
        )));
    }
    Ok(cooking_time)
}

fn validate_recipe_name(name: String) -> Result<String, ApiError> {
    let name = validate_required("name", name)?;
    validate_length("name", &name, RECIPE_NAME_MAX_LENGTH)?;
    Ok(name)
}

fn validate_required(field: &str, value: String) -> Result<String, ApiError> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(ApiError::Validation(format!("{field} may not be blank")));
    }
    Ok(value)
}

fn validate_length(field: &str, value: &str, max: usize) -> Result<(), ApiError> {
    if value.chars().count() > max {
        return Err(ApiError::Validation(format!(
            "{field} may not be longer than {max} characters"
        )));
    }
    Ok(())
}

#[derive(Deserialize, Debug, Clone)]
pub struct UserForm {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl UserForm {
    pub fn validate(self) -> Result<Self, ApiError> {
        let email = validate_required("email", self.email)?.to_lowercase();
        validate_length("email", &email, EMAIL_MAX_LENGTH)?;
        if !is_valid_email(&email) {
            return Err(ApiError::Validation(String::from(
                "Enter a valid email address",
            )));
        }

        let username = validate_required("username", self.username)?;
        validate_length("username", &username, USER_FIELD_MAX_LENGTH)?;
        if !username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '.' | '@' | '+' | '-' | '_'))
        {
            return Err(ApiError::Validation(String::from(
                "Username may contain only letters, digits and @/./+/-/_",
            )));
        }

        let first_name = validate_required("first_name", self.first_name)?;
        validate_length("first_name", &first_name, USER_FIELD_MAX_LENGTH)?;
        let last_name = validate_required("last_name", self.last_name)?;
        validate_length("last_name", &last_name, USER_FIELD_MAX_LENGTH)?;

        if self.password.is_empty() {
            return Err(ApiError::Validation(String::from(
                "password may not be blank",
            )));
        }

        Ok(Self {
            email,
            username,
            first_name,
            last_name,
            password: self.password,
        })
    }
}

fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct SetPasswordForm {
    pub current_password: String,
    pub new_password: String,
}

impl SetPasswordForm {
    /// Checks that only depend on the form itself; the current password is verified against the stored hash.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.new_password.is_empty() {
            return Err(ApiError::Validation(String::from(
                "new_password may not be blank",
            )));
        }
        if self.current_password == self.new_password {
            return Err(ApiError::Validation(String::from(
                "New password must differ from the current password",
            )));
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8BQDwAEhQGAhKmMIQAAAABJRU5ErkJggg==";

    fn recipe_form() -> RecipeForm {
        RecipeForm {
            ingredients: vec![IngredientAmountForm { id: 1, amount: 100 }],
            tags: vec![1],
            image: String::from(PIXEL),
            name: String::from("Pancakes"),
            text: String::from("Mix and fry"),
            cooking_time: 20,
        }
    }

    #[test]
    fn accepts_complete_recipe() {
        let recipe = recipe_form().validate().unwrap();

        assert_eq!(recipe.name, "Pancakes");
        assert_eq!(recipe.components.tags, vec![1]);
        assert_eq!(recipe.image.extension, "png");
    }

    #[test]
    fn empty_ingredients_fail_validation() {
        let form = RecipeForm {
            ingredients: vec![],
            ..recipe_form()
        };

        assert!(matches!(form.validate(), Err(ApiError::Validation(_))));
    }

    #[test]
    fn empty_tags_fail_validation() {
        let form = RecipeForm {
            tags: vec![],
            ..recipe_form()
        };

        assert!(matches!(form.validate(), Err(ApiError::Validation(_))));
    }

    #[test]
    fn missing_tags_and_ingredients_deserialize_as_empty() {
        let form: RecipeForm = serde_json::from_value(serde_json::json!({
            "image": PIXEL,
            "name": "Soup",
            "text": "Boil",
            "cooking_time": 5
        }))
        .unwrap();

        assert!(form.tags.is_empty());
        assert!(matches!(form.validate(), Err(ApiError::Validation(_))));
    }

    #[test]
    fn zero_cooking_time_fails_validation() {
        let form = RecipeForm {
            cooking_time: 0,
            ..recipe_form()
        };

        assert!(matches!(form.validate(), Err(ApiError::Validation(_))));
    }

    #[test]
    fn zero_amount_fails_validation() {
        let result = RecipeComponents::validate(
            vec![1],
            vec![IngredientAmountForm { id: 3, amount: 0 }],
        );

        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[test]
    fn repeated_ingredient_fails_validation() {
        let result = RecipeComponents::validate(
            vec![1],
            vec![
                IngredientAmountForm { id: 3, amount: 1 },
                IngredientAmountForm { id: 3, amount: 2 },
            ],
        );

        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[test]
    fn repeated_tags_are_collapsed_in_order() {
        let components = RecipeComponents::validate(
            vec![2, 1, 2, 1],
            vec![IngredientAmountForm { id: 3, amount: 1 }],
        )
        .unwrap();

        assert_eq!(components.tags, vec![2, 1]);
    }

    #[test]
    fn update_keeps_absent_scalars_unset() {
        let form: RecipeUpdateForm = serde_json::from_value(serde_json::json!({
            "tags": [1],
            "ingredients": [{ "id": 2, "amount": 5 }],
            "cooking_time": 15
        }))
        .unwrap();

        let changes = form.validate().unwrap();
        assert!(changes.name.is_none());
        assert!(changes.image.is_none());
        assert_eq!(changes.cooking_time, Some(15));
    }

    #[test]
    fn update_still_requires_ingredients() {
        let form: RecipeUpdateForm = serde_json::from_value(serde_json::json!({
            "tags": [1],
            "name": "Renamed"
        }))
        .unwrap();

        assert!(matches!(form.validate(), Err(ApiError::Validation(_))));
    }

    fn user_form() -> UserForm {
        UserForm {
            email: String::from("cook@example.com"),
            username: String::from("cook"),
            first_name: String::from("Ann"),
            last_name: String::from("Cook"),
            password: String::from("s3cret-pass"),
        }
    }

    #[test]
    fn accepts_valid_user() {
        assert!(user_form().validate().is_ok());
    }

    #[test]
    fn email_is_stored_lowercase() {
        let form = UserForm {
            email: String::from("  Cook@Example.COM "),
            ..user_form()
        };
        assert_eq!(form.validate().unwrap().email, "cook@example.com");
    }

    #[test]
    fn rejects_blank_last_name() {
        let form = UserForm {
            last_name: String::from("   "),
            ..user_form()
        };
        assert!(form.validate().is_err());
    }

    #[test]
    fn rejects_invalid_email_and_username() {
        let form = UserForm {
            email: String::from("not-an-email"),
            ..user_form()
        };
        assert!(form.validate().is_err());

        let form = UserForm {
            username: String::from("bad name"),
            ..user_form()
        };
        assert!(form.validate().is_err());
    }

    #[test]
    fn reused_password_is_rejected() {
        let form = SetPasswordForm {
            current_password: String::from("same"),
            new_password: String::from("same"),
        };
        assert!(matches!(form.validate(), Err(ApiError::Validation(_))));

        let form = SetPasswordForm {
            current_password: String::from("old"),
            new_password: String::from("new"),
        };
        assert!(form.validate().is_ok());
    }
}
