use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};

use config_shape::format::{as_boolean, as_int, as_list, ListOptions};
use config_shape::sources::cache::CACHE_KEY_SUFFIX;
use config_shape::sources::{
    CacheSource, CacheSourceOptions, EnvCacheMode, EnvSource, EnvSourceOptions, FnSource, JsonSource, MemorySource,
};
use config_shape::{BoxError, ConfigBuilder, ConfigError, ConfigSource, Shape, SharedData};

/// Counts `get` calls per key across all clones.
#[derive(Debug, Clone)]
struct Counting {
    inner: MemorySource,
    calls: Arc<Mutex<Vec<String>>>,
}

impl Counting {
    fn new(values: Value) -> Self {
        Self {
            inner: MemorySource::new(values),
            calls: Arc::default(),
        }
    }
}

#[async_trait]
impl ConfigSource for Counting {
    async fn get(&self, key: &str) -> Result<Option<Value>, BoxError> {
        self.calls.lock().push(key.to_string());
        self.inner.get(key).await
    }

    fn clone_source(&self) -> Box<dyn ConfigSource> {
        Box::new(self.clone())
    }
}

#[tokio::test]
async fn first_source_wins_and_later_sources_are_not_asked() {
    let first = Counting::new(json!({ "host": "primary" }));
    let second = Counting::new(json!({ "host": "secondary", "port": 8080 }));
    let builder = ConfigBuilder::new(vec![Box::new(first.clone()), Box::new(second.clone())]).unwrap();

    let config = builder
        .build(|b| {
            Ok(Shape::object([
                ("host", Shape::from(b.required("host"))),
                ("port", b.required("port").into()),
            ]))
        })
        .await
        .unwrap();

    assert_eq!(config, json!({ "host": "primary", "port": 8080 }));
    assert_eq!(*first.calls.lock(), ["host", "port"]);
    assert_eq!(*second.calls.lock(), ["port"]);
}

#[tokio::test]
async fn every_missing_required_key_is_reported() {
    let builder = ConfigBuilder::new(vec![Box::new(MemorySource::new(json!({ "present": 1 })))]).unwrap();

    let err = builder
        .build(|b| {
            Ok(Shape::object([
                ("a", Shape::from(b.required("foo2"))),
                ("b", b.required(["bar2", "bar3"]).into()),
                ("c", b.required("present").into()),
                ("d", Shape::array([b.required("foo2")])),
            ]))
        })
        .await
        .unwrap_err();

    assert_eq!(err.missing_keys(), Some(&["foo2".to_string(), "bar2".to_string()][..]));
    assert_eq!(
        err.to_string(),
        "missing required configuration keys: \"foo2, bar2\""
    );
}

#[tokio::test]
async fn source_errors_name_the_source() {
    let builder = ConfigBuilder::new(vec![
        Box::new(MemorySource::default()),
        Box::new(FnSource::new(|_| Err("connection refused".into()))),
    ])
    .unwrap();

    let err = builder
        .build(|b| Ok(Shape::object([("x", b.required("x"))])))
        .await
        .unwrap_err();

    match err {
        ConfigError::ResolveValue {
            key,
            source_index,
            source_name,
            ..
        } => {
            assert_eq!(key, "x");
            assert_eq!(source_index, 1);
            assert_eq!(source_name, "[anonymous source]");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[derive(Debug, Deserialize, PartialEq)]
struct Server {
    host: String,
    port: u16,
    debug: bool,
    tags: Vec<String>,
}

#[tokio::test]
async fn typed_build_across_layered_sources() {
    let env = EnvSource::from_vars(
        [("SERVER_PORT", "9090"), ("DEBUG", "0")],
        EnvSourceOptions {
            cache_mode: EnvCacheMode::PerBuild,
            ..Default::default()
        },
    );
    let defaults = JsonSource::new(json!({
        "server": { "host": "localhost", "port": 80 },
        "tags": "a,b;c",
    }))
    .unwrap();
    let builder = ConfigBuilder::new(vec![Box::new(env), Box::new(defaults)]).unwrap();

    let server: Server = builder
        .build_typed(|b| {
            Ok(Shape::object([
                ("host", Shape::from(b.required("server_host"))),
                ("port", b.required("server-port").format(as_int()).into()),
                ("debug", b.optional("debug").format(as_boolean()).into()),
                ("tags", b.required("tags").format(as_list(ListOptions::default())).into()),
            ]))
        })
        .await
        .unwrap();

    assert_eq!(
        server,
        Server {
            host: "localhost".into(),
            port: 9090,
            debug: false,
            tags: vec!["a".into(), "b".into(), "c".into()],
        }
    );
}

#[tokio::test]
async fn typed_build_reports_deserialize_errors() {
    let builder = ConfigBuilder::new(vec![Box::new(MemorySource::new(json!({ "port": "http" })))]).unwrap();

    let err = builder
        .build_typed::<Server, _>(|b| Ok(Shape::object([("port", b.required("port"))])))
        .await
        .unwrap_err();

    assert!(matches!(err, ConfigError::Deserialize(_)));
}

#[tokio::test]
async fn concurrent_builds_do_not_share_state() {
    let values = Arc::new(Mutex::new(json!({ "a": 1, "b": 2 })));
    let loader_values = values.clone();
    let json = JsonSource::from_loader(move || {
        let values = loader_values.lock().clone();
        async move { Ok::<_, BoxError>(values) }
    });
    let builder = ConfigBuilder::new(vec![Box::new(json)]).unwrap();

    let (a, b) = tokio::join!(
        builder.build(|b| Ok(Shape::object([("a", b.required("a"))]))),
        builder.build(|b| Ok(Shape::object([("b", b.required("b"))]))),
    );

    assert_eq!(a.unwrap(), json!({ "a": 1 }));
    assert_eq!(b.unwrap(), json!({ "b": 2 }));
}

#[tokio::test]
async fn cache_source_isolated_per_build_function() {
    let cache = CacheSource::new(CacheSourceOptions::default());
    let live = Counting::new(json!({ "a": "first", "b": "second" }));
    let builder = ConfigBuilder::new(vec![Box::new(cache), Box::new(live.clone())]).unwrap();

    fn shape_a(b: &mut config_shape::ShapeBuilder) -> Result<Shape, BoxError> {
        Ok(Shape::object([("a", b.required("a"))]))
    }
    fn shape_b(b: &mut config_shape::ShapeBuilder) -> Result<Shape, BoxError> {
        Ok(Shape::object([("b", b.required("b"))]))
    }

    assert_eq!(builder.build(shape_a).await.unwrap(), json!({ "a": "first" }));
    assert_eq!(live.calls.lock().len(), 1);

    // Second run of the same function is served from the cache.
    assert_eq!(builder.build(shape_a).await.unwrap(), json!({ "a": "first" }));
    assert_eq!(live.calls.lock().len(), 1);

    // A different function has its own cache entry.
    assert_eq!(builder.build(shape_b).await.unwrap(), json!({ "b": "second" }));
    assert_eq!(*live.calls.lock(), ["a", "b"]);
}

#[tokio::test]
async fn cache_suffix_from_shared_data() {
    let cache = CacheSource::default();
    let live = Counting::new(json!({ "a": 1 }));
    let builder = ConfigBuilder::new(vec![Box::new(cache), Box::new(live.clone())]).unwrap();

    let mut shared = SharedData::new();
    shared.insert(CACHE_KEY_SUFFIX.to_string(), json!("app"));

    builder
        .build_with(|b| Ok(Shape::object([("a", b.required("a"))])), shared.clone())
        .await
        .unwrap();
    builder
        .build_with(|b| Ok(Shape::object([("other", b.required("a"))])), shared)
        .await
        .unwrap();

    assert_eq!(live.calls.lock().len(), 1);
}

#[tokio::test]
async fn failed_build_is_not_cached() {
    let cache = CacheSource::default();
    let live = Counting::new(json!({ "a": 1 }));
    let builder = ConfigBuilder::new(vec![Box::new(cache), Box::new(live.clone())]).unwrap();

    fn shape(b: &mut config_shape::ShapeBuilder) -> Result<Shape, BoxError> {
        Ok(Shape::object([("a", b.required("a")), ("z", b.required("z"))]))
    }

    assert!(builder.build(shape).await.is_err());
    assert!(builder.build(shape).await.is_err());
    assert_eq!(*live.calls.lock(), ["a", "z", "a", "z"]);
}

fn tags_shape(as_items: bool) -> impl FnOnce(&mut config_shape::ShapeBuilder) -> Result<Shape, BoxError> + Send + 'static {
    move |b| {
        let tags = b.required("tags");
        let tags = if as_items { tags.format(as_list(ListOptions::default())) } else { tags };
        Ok(Shape::object([("tags", tags)]))
    }
}

#[tokio::test]
async fn closures_from_one_helper_are_cached_separately() {
    let builder = ConfigBuilder::new(vec![
        Box::new(CacheSource::default()),
        Box::new(MemorySource::new(json!({ "tags": "a,b" }))),
    ])
    .unwrap();

    assert_eq!(builder.build(tags_shape(true)).await.unwrap(), json!({ "tags": ["a", "b"] }));
    assert_eq!(builder.build(tags_shape(false)).await.unwrap(), json!({ "tags": "a,b" }));
}
