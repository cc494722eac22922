//! Layers a cache, environment variables and a config file, then builds the
//! same typed config twice. The second build is answered by the cache.
//!
//! ```text
//! APP_DATABASE_URL=postgres://localhost/app cargo run --example layered -- app.toml
//! ```

use std::env;

use serde::Deserialize;
use serde_json::json;

use config_shape::format::{as_boolean, as_int};
use config_shape::sources::{CacheSource, EnvSource, EnvSourceOptions, JsonSource};
use config_shape::{BoxError, ConfigBuilder, Shape, ShapeBuilder};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct AppConfig {
    database_url: String,
    pool_size: u32,
    verbose: bool,
    region: String,
}

fn app_config(b: &mut ShapeBuilder) -> Result<Shape, BoxError> {
    Ok(Shape::object([
        ("database_url", Shape::from(b.required("database-url"))),
        ("pool_size", b.optional("database.pool_size").default_value(4).format(as_int()).into()),
        ("verbose", b.optional("verbose").format(as_boolean()).into()),
        ("region", b.optional("region").default_value("local").into()),
    ]))
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "config_shape=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let file = env::args().nth(1).unwrap_or_else(|| "app.toml".to_string());

    let env = EnvSource::with_options(EnvSourceOptions {
        prefix: Some("APP_".to_string()),
        ..Default::default()
    });
    let defaults = JsonSource::new(json!({ "region": "eu-west" }))?;

    let builder = ConfigBuilder::new(vec![
        Box::new(CacheSource::default()),
        Box::new(env),
        Box::new(JsonSource::from_file(file, false)),
        Box::new(defaults),
    ])?;

    for run in 1..=2 {
        let config: AppConfig = builder.build_typed(app_config).await?;
        println!("run {run}: {config:#?}");
    }
    Ok(())
}
