//! Builds a small config from the process environment.
//!
//! Run with `RUST_LOG=config_shape=trace` to see every key being resolved.

use config_shape::format::{as_int, as_list};
use config_shape::sources::EnvSource;
use config_shape::{BoxError, ConfigBuilder, Shape};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "config_shape=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let builder = ConfigBuilder::new(vec![Box::new(EnvSource::new())])?;

    let config = builder
        .build(|b| {
            Ok(Shape::object([
                ("home", Shape::from(b.required("HOME"))),
                ("path", b.required("PATH").format(as_list(Default::default())).into()),
                ("shell", b.optional(["SHELL", "COMSPEC"]).default_value("sh").into()),
                ("columns", b.optional("COLUMNS").default_value(80).format(as_int()).into()),
            ]))
        })
        .await?;

    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
