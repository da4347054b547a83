/// Cachet demo - reads a client through the cached repositories
///
/// Usage: cachet-demo [client-id] [include-path...]
///
/// Example:
///   cachet-demo 1 policies.policy_versions
///
/// Environment:
///   CACHET_CACHE_BACKEND    memory | lmdb | none (default: memory)
///   CACHET_LMDB_PATH        LMDB directory (default: ./cachet-cache)
///   CACHET_LOG_FORMAT       json | pretty (default: pretty)
///   RUST_LOG                log filter (default: cachet=debug,info)

use std::process::ExitCode;
use std::sync::Arc;

use cachet_core::{CacheConfig, CachetResult, Client, ClientId, ConfigError, IncludePath, StorageError};
use cachet_storage::{
    CacheAccessor, CacheStore, ClientRepo, LmdbCacheStore, MemoryCacheStore, Repositories,
    SyntheticSource,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const ENV_CACHE_BACKEND: &str = "CACHET_CACHE_BACKEND";
const ENV_LMDB_PATH: &str = "CACHET_LMDB_PATH";
const ENV_LOG_FORMAT: &str = "CACHET_LOG_FORMAT";

const DEFAULT_LMDB_PATH: &str = "./cachet-cache";
const LMDB_MAX_SIZE_MB: usize = 64;

fn main() -> ExitCode {
    init_tracing();

    match run(std::env::args().skip(1).collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "cachet-demo failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cachet=debug,info"));
    let json = std::env::var(ENV_LOG_FORMAT).is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let result = tracing_subscriber::registry()
        .with(env_filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .try_init();

    if let Err(e) = result {
        eprintln!("Failed to init subscriber: {}", e);
    }
}

fn open_store() -> CachetResult<Option<Arc<dyn CacheStore>>> {
    let backend = std::env::var(ENV_CACHE_BACKEND).unwrap_or_else(|_| "memory".to_string());
    match backend.trim().to_ascii_lowercase().as_str() {
        "memory" => {
            let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new());
            Ok(Some(store))
        }
        "lmdb" => {
            let path = std::env::var(ENV_LMDB_PATH).unwrap_or_else(|_| DEFAULT_LMDB_PATH.to_string());
            let store = LmdbCacheStore::new(&path, LMDB_MAX_SIZE_MB)?;
            let purged = store.purge_expired()?;
            tracing::info!(path = %path, purged, "Using LMDB cache store");
            let store: Arc<dyn CacheStore> = Arc::new(store);
            Ok(Some(store))
        }
        "none" => Ok(None),
        other => Err(ConfigError::InvalidValue {
            field: ENV_CACHE_BACKEND.to_string(),
            value: other.to_string(),
            reason: "expected memory, lmdb or none".to_string(),
        }
        .into()),
    }
}

fn run(args: Vec<String>) -> CachetResult<()> {
    let client_id: ClientId = match args.first() {
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            field: "client-id".to_string(),
            value: raw.clone(),
            reason: "expected an integer".to_string(),
        })?,
        None => 1,
    };
    let include_paths = args
        .iter()
        .skip(1)
        .map(|raw| IncludePath::<Client>::parse(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let config = CacheConfig::from_env();
    config.validate()?;

    let store = open_store()?;
    let cache = CacheAccessor::new(store.clone(), config);
    let repositories = Repositories::new(cache, Arc::new(SyntheticSource::new()));

    let include_paths = (!include_paths.is_empty()).then_some(include_paths.as_slice());

    // The second read is served from the cache when one is active.
    let client = repositories
        .clients
        .get_client_by_client_id(client_id, include_paths, false)?;
    let again = repositories
        .clients
        .get_client_by_client_id(client_id, include_paths, false)?;
    debug_assert_eq!(client, again);

    let output = serde_json::to_string_pretty(&client).map_err(|e| StorageError::Serialization {
        reason: e.to_string(),
    })?;
    println!("{}", output);

    if let Some(store) = store {
        let stats = store.stats()?;
        tracing::info!(
            hits = stats.hits,
            misses = stats.misses,
            entries = stats.entry_count,
            hit_rate = stats.hit_rate(),
            "Cache statistics"
        );
    }

    Ok(())
}
