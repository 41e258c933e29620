use std::env;

/// Runtime configuration, sourced from the environment once at startup and
/// shared behind an `Arc` afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub database_url: String,
    pub db_pool_size: u32,
    pub redis_url: String,
    pub blob_root: String,

    pub taxonomy_source_path: Option<String>,

    pub vector_dim: usize,
    pub worker_concurrency: usize,
    pub upload_batch_stagger_s: u64,
    pub max_file_size_bytes: u64,

    pub search_cache_ttl_s: u64,
    pub facet_cache_ttl_s: u64,

    pub session_ttl_s: u64,
    pub session_cookie_secure: bool,
    pub session_secret: String,

    pub require_auth: bool,
    pub app_password: String,
    pub allow_unauthenticated_on_session_failure: bool,

    pub use_enhanced_relevance: bool,
    pub require_embedding: bool,

    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub ai_provider_order: Vec<String>,

    pub ann_out_degree: u32,
    pub ann_build_candidates: u32,

    pub retry_base_s: u64,
    pub retry_cap_s: u64,
    pub retry_max_attempts: u32,
    pub job_visibility_timeout_s: u64,
    pub queue_depth_watermark: usize,

    pub scheduler_interval_s: u64,
    pub stuck_document_threshold_s: u64,
    pub shutdown_grace_s: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::Missing("DATABASE_URL".to_string()))?;

        let session_secret = env::var("SESSION_SECRET")
            .map_err(|_| ConfigError::Missing("SESSION_SECRET".to_string()))?;

        let require_auth = env_bool("REQUIRE_AUTH", true);
        let app_password = env::var("APP_PASSWORD").unwrap_or_default();
        if require_auth && app_password.is_empty() {
            return Err(ConfigError::Missing("APP_PASSWORD".to_string()));
        }

        Ok(Self {
            http_port: env_parse("HTTP_PORT", 3000),
            database_url,
            db_pool_size: env_parse("DB_POOL_SIZE", 16),
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            blob_root: env::var("BLOB_ROOT").unwrap_or_else(|_| "./blobs".to_string()),

            taxonomy_source_path: env_opt("TAXONOMY_SOURCE"),

            vector_dim: env_parse("VECTOR_DIM", 1536),
            worker_concurrency: env_parse("WORKER_CONCURRENCY", 4),
            upload_batch_stagger_s: env_parse("UPLOAD_BATCH_STAGGER_S", 30),
            max_file_size_bytes: env_parse("MAX_FILE_SIZE_BYTES", 104_857_600),

            search_cache_ttl_s: env_parse("SEARCH_CACHE_TTL_S", 1800),
            facet_cache_ttl_s: env_parse("FACET_CACHE_TTL_S", 86_400),

            session_ttl_s: env_parse("SESSION_TTL_S", 86_400),
            session_cookie_secure: env_bool("SESSION_COOKIE_SECURE", true),
            session_secret,

            require_auth,
            app_password,
            allow_unauthenticated_on_session_failure: env_bool(
                "ALLOW_UNAUTHENTICATED_ON_SESSION_FAILURE",
                false,
            ),

            use_enhanced_relevance: env_bool("USE_ENHANCED_RELEVANCE", true),
            require_embedding: env_bool("REQUIRE_EMBEDDING", true),

            anthropic_api_key: env_opt("ANTHROPIC_API_KEY"),
            openai_api_key: env_opt("OPENAI_API_KEY"),
            gemini_api_key: env_opt("GEMINI_API_KEY"),
            ai_provider_order: env::var("AI_PROVIDER_ORDER")
                .unwrap_or_else(|_| "anthropic,openai,gemini".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),

            ann_out_degree: env_parse("ANN_OUT_DEGREE", 32),
            ann_build_candidates: env_parse("ANN_BUILD_CANDIDATES", 128),

            retry_base_s: env_parse("RETRY_BASE_S", 5),
            retry_cap_s: env_parse("RETRY_CAP_S", 300),
            retry_max_attempts: env_parse("RETRY_MAX_ATTEMPTS", 5),
            job_visibility_timeout_s: env_parse("JOB_VISIBILITY_TIMEOUT_S", 300),
            queue_depth_watermark: env_parse("QUEUE_DEPTH_WATERMARK", 1000),

            scheduler_interval_s: env_parse("SCHEDULER_INTERVAL_S", 120),
            stuck_document_threshold_s: env_parse("STUCK_DOCUMENT_THRESHOLD_S", 600),
            shutdown_grace_s: env_parse("SHUTDOWN_GRACE_S", 30),
        })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(name) => write!(f, "Missing required setting: {}", name),
        }
    }
}

impl std::error::Error for ConfigError {}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_bool_parsing() {
        unsafe {
            env::set_var("ARCHIVUM_TEST_FLAG", "true");
        }
        assert!(env_bool("ARCHIVUM_TEST_FLAG", false));

        unsafe {
            env::set_var("ARCHIVUM_TEST_FLAG", "0");
        }
        assert!(!env_bool("ARCHIVUM_TEST_FLAG", true));

        assert!(env_bool("ARCHIVUM_TEST_FLAG_UNSET", true));
    }

    #[test]
    fn test_env_parse_falls_back_on_garbage() {
        unsafe {
            env::set_var("ARCHIVUM_TEST_NUM", "not-a-number");
        }
        let parsed: u32 = env_parse("ARCHIVUM_TEST_NUM", 42);
        assert_eq!(parsed, 42);
    }
}
