use crate::{
    actions::{
        membership::{list_membership_ids, Membership},
        subscriptions::list_subscription_ids,
    },
    error::ApiError,
    response::ViewerContext,
    schema::Id,
};

use sqlx::{Pool, Postgres};

pub async fn load_viewer_context(
    user_id: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<ViewerContext, ApiError> {
    let user_id = match user_id {
        Some(user_id) => user_id,
        None => return Ok(ViewerContext::anonymous()),
    };

    let (favorites, shopping_cart, subscriptions) = tokio::try_join!(
        list_membership_ids(Membership::Favorites, user_id, pool),
        list_membership_ids(Membership::ShoppingCart, user_id, pool),
        list_subscription_ids(user_id, pool),
    )?;

    Ok(ViewerContext {
        favorites,
        shopping_cart,
        subscriptions,
    })
}
