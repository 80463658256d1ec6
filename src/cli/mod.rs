use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Server Args ---
    /// Host address and port for the HTTP server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "0.0.0.0:8080")]
    pub server_addr: String,

    /// Optional API key. When set, every /api route except health requires it
    /// through the X-API-Key header or the api_key query parameter.
    #[arg(long, env = "SERVER_API_KEY")]
    pub server_api_key: Option<String>,

    /// Requests per second accepted across all /api routes.
    #[arg(long, env = "RATE_LIMIT_PER_SECOND", default_value = "10")]
    pub rate_limit_per_second: u32,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,

    /// Path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (openai, groq, xai, deepseek, ollama)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "openai")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API (e.g., https://api.openai.com)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, the provider type picks one
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider
    #[arg(long, env = "CHAT_API_KEY", default_value = "")]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., gpt-4-turbo, llama-3.3-70b-versatile)
    #[arg(long, env = "CHAT_MODEL")]
    pub chat_model: Option<String>,

    /// Timeout in seconds for a single model request.
    #[arg(long, env = "CHAT_TIMEOUT_SECS", default_value = "15")]
    pub chat_timeout_secs: u64,

    /// Maximum function-call round-trips per user turn.
    #[arg(long, env = "FUNCTION_CALL_ROUNDS", default_value = "1")]
    pub function_call_rounds: usize,

    // --- Cal.com Args ---
    #[arg(long, env = "CALCOM_API_KEY", default_value = "")]
    pub calcom_api_key: String,

    #[arg(long, env = "CALCOM_API_URL", default_value = "https://api.cal.com/v1")]
    pub calcom_api_url: String,

    /// Cal.com username that owns the event types, used by availability lookups.
    #[arg(long, env = "CALCOM_USERNAME", default_value = "")]
    pub calcom_username: String,

    #[arg(long, env = "CALCOM_TIMEOUT_SECS", default_value = "10")]
    pub calcom_timeout_secs: u64,

    /// Base URL for the v2 email verification endpoints.
    #[arg(long, env = "CALCOM_VERIFICATION_URL", default_value = "https://api.cal.com")]
    pub calcom_verification_url: String,

    // --- History Store Args ---
    /// History chat store type (file, redis, memory)
    #[arg(long, env = "HISTORY_TYPE", default_value = "file")]
    pub history_type: String,

    /// Directory holding one log file per conversation (file store).
    #[arg(long, env = "HISTORY_DIR", default_value = "history")]
    pub history_dir: String,

    /// History chat store host endpoint (e.g., redis://127.0.0.1:6379)
    #[arg(long, env = "HISTORY_HOST", default_value = "redis://127.0.0.1:6379")]
    pub history_host: String,

    /// Prefix for Redis history keys.
    #[arg(long, env = "HISTORY_REDIS_PREFIX", default_value = "history:")]
    pub history_redis_prefix: String,

    /// Batch size for Redis SCAN command when searching history.
    #[arg(long, env = "HISTORY_REDIS_SCAN_COUNT", default_value = "100")]
    pub history_redis_scan_count: usize,

    // --- General App Args ---
    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,
}
