pub mod ingredients;
pub mod membership;
pub mod recipes;
pub mod shopping_list;
pub mod subscriptions;
pub mod tags;
pub mod users;
pub mod viewer;
