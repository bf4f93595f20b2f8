use std::{convert::Infallible, sync::Arc};

use serde::de::DeserializeOwned;
use sqlx::PgPool;
use warp::{reject::Rejection, Filter};

use crate::{
    cache::cache::Cache,
    config::Config,
    constants::MAX_BODY_SIZE,
    jwt::SessionData,
    media::MediaStore,
    middleware::{with_possible_session, with_session},
};

/// Everything a handler needs, cloned into each route.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub cache: Cache,
    pub media: MediaStore,
    jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config, cache: Cache) -> Self {
        let media = MediaStore::new(config.media_root.clone(), &config.media_url);
        let jwt_secret = Arc::from(config.jwt_secret.as_str());

        Self {
            pool,
            config: Arc::new(config),
            cache,
            media,
            jwt_secret,
        }
    }

    pub fn session(&self) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
        with_session(self.jwt_secret.clone())
    }

    pub fn possible_session(
        &self,
    ) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
        with_possible_session(self.jwt_secret.clone())
    }
}

pub fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

pub fn json_body<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_SIZE).and(warp::body::json())
}

/// Raw query pairs; repeated keys such as `tags` are kept.
pub fn query_pairs() -> impl Filter<Extract = (Vec<(String, String)>,), Error = Rejection> + Clone {
    warp::query::<Vec<(String, String)>>()
}
