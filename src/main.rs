use std::{error::Error, path::Path};

use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;

use foodgram::{
    actions::{ingredients::create_ingredients, tags::create_tags},
    config::Config,
    routes::{api::routes, state::AppState},
    schema::{NewIngredient, NewTag},
    setup::{bootstrap_schema, connect},
    Cache,
};

#[derive(Parser)]
#[command(name = "foodgram")]
#[command(about = "Recipe sharing backend", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,

    /// Load `[{name, measurement_unit}]` into the ingredient catalog
    LoadIngredients {
        #[arg(long, value_name = "PATH")]
        json: String,
    },

    /// Load `[{name, color, slug}]` into the tag catalog
    LoadTags {
        #[arg(long, value_name = "PATH")]
        json: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::LoadIngredients { json } => {
            let ingredients: Vec<NewIngredient> = read_json(&json).await?;
            let pool = connect(&config).await?;
            bootstrap_schema(&pool).await?;

            let created = create_ingredients(&ingredients, &pool).await?;
            log::info!("Loaded {created} of {} ingredients", ingredients.len());
            invalidate_catalog(&config).await;
            Ok(())
        }
        Commands::LoadTags { json } => {
            let tags: Vec<NewTag> = read_json(&json).await?;
            let pool = connect(&config).await?;
            bootstrap_schema(&pool).await?;

            let created = create_tags(&tags, &pool).await?;
            log::info!("Loaded {created} of {} tags", tags.len());
            invalidate_catalog(&config).await;
            Ok(())
        }
    }
}

async fn serve(config: Config) -> Result<(), Box<dyn Error>> {
    let address = config.listen_address()?;
    let pool = connect(&config).await?;
    bootstrap_schema(&pool).await?;

    let cache = connect_cache(&config).await;
    let state = AppState::new(pool, config, cache);

    log::info!("Listening on http://{address}");
    warp::serve(routes(state)).run(address).await;

    Ok(())
}

async fn connect_cache(config: &Config) -> Cache {
    let url = match &config.redis_url {
        Some(url) => url,
        None => {
            log::info!("REDIS_URL not set, catalog cache disabled");
            return Cache::disabled();
        }
    };

    match Cache::connect(url).await {
        Ok(cache) => {
            log::info!("Connected to catalog cache");
            cache
        }
        Err(e) => {
            log::warn!("Could not connect to redis, catalog cache disabled: {e}");
            Cache::disabled()
        }
    }
}

async fn invalidate_catalog(config: &Config) {
    let cache = connect_cache(config).await;
    if let Err(e) = cache.invalidate_catalog().await {
        log::warn!("Could not invalidate catalog cache: {e}");
    }
}

async fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, Box<dyn Error>> {
    let contents = tokio::fs::read_to_string(path.as_ref()).await?;
    Ok(serde_json::from_str(&contents)?)
}
