use crate::{error::ApiError, jwt::SessionData, schema::Recipe};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    ManageOwnRecipes,
}

impl SessionData {
    /// Writes require the session to own the recipe.
    pub fn authenticate(&self, action: ActionType, recipe: &Recipe) -> Result<(), ApiError> {
        match action {
            ActionType::ManageOwnRecipes if self.user_id == recipe.author_id => Ok(()),
            ActionType::ManageOwnRecipes => Err(ApiError::Forbidden(String::from(
                "You do not have permission to perform this action.",
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn recipe(author_id: i32) -> Recipe {
        Recipe {
            id: 1,
            author_id,
            name: String::from("Soup"),
            text: String::from("Boil"),
            cooking_time: 5,
            image: String::from("recipes/images/soup.png"),
            pub_date: Utc::now(),
        }
    }

    fn session(user_id: i32) -> SessionData {
        SessionData {
            user_id,
            username: String::from("cook"),
        }
    }

    #[test]
    fn author_may_manage_own_recipe() {
        assert!(session(3)
            .authenticate(ActionType::ManageOwnRecipes, &recipe(3))
            .is_ok());
    }

    #[test]
    fn other_users_are_forbidden() {
        assert!(matches!(
            session(4).authenticate(ActionType::ManageOwnRecipes, &recipe(3)),
            Err(ApiError::Forbidden(_))
        ));
    }
}
