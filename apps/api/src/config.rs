use anyhow::{bail, Context, Result};

/// Speech-to-text backend selected once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SttEngine {
    Vosk,
    Mock,
}

/// Text generation backend selected once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmEngine {
    TextGen,
    LlamaCpp,
    Mock,
}

impl SttEngine {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "vosk" => Ok(SttEngine::Vosk),
            "mock" => Ok(SttEngine::Mock),
            other => bail!("STT_ENGINE must be one of 'vosk', 'mock' (got '{other}')"),
        }
    }
}

impl LlmEngine {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "textgen" => Ok(LlmEngine::TextGen),
            "llama-cpp" | "llama_cpp" => Ok(LlmEngine::LlamaCpp),
            "mock" => Ok(LlmEngine::Mock),
            other => bail!("LLM_ENGINE must be one of 'textgen', 'llama-cpp', 'mock' (got '{other}')"),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. When absent the in-memory store is used.
    pub database_url: Option<String>,
    pub judge0_url: String,
    pub judge0_api_key: Option<String>,
    pub stt_engine: SttEngine,
    pub vosk_server_url: String,
    pub llm_engine: LlmEngine,
    pub textgen_url: String,
    pub llama_cpp_url: String,
    pub cors_origins: Vec<String>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: optional_env("DATABASE_URL"),
            judge0_url: env_or("JUDGE0_URL", "http://judge0:2358")
                .trim_end_matches('/')
                .to_string(),
            judge0_api_key: optional_env("JUDGE0_API_KEY"),
            stt_engine: SttEngine::parse(&env_or("STT_ENGINE", "mock"))?,
            vosk_server_url: env_or("VOSK_SERVER_URL", "http://vosk-server:2700"),
            llm_engine: LlmEngine::parse(&env_or("LLM_ENGINE", "mock"))?,
            textgen_url: env_or("TEXTGEN_URL", "http://textgen:5000"),
            llama_cpp_url: env_or("LLAMA_CPP_URL", "http://llama-cpp:8080"),
            cors_origins: parse_origins(&env_or(
                "CORS_ORIGINS",
                "http://localhost:3000,http://localhost:5173",
            )),
            port: env_or("PORT", "8000")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    optional_env(key).unwrap_or_else(|| default.to_string())
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_names_are_case_insensitive() {
        assert_eq!(SttEngine::parse("Vosk").unwrap(), SttEngine::Vosk);
        assert_eq!(LlmEngine::parse("LLAMA-CPP").unwrap(), LlmEngine::LlamaCpp);
        assert_eq!(LlmEngine::parse(" mock ").unwrap(), LlmEngine::Mock);
    }

    #[test]
    fn test_unknown_engine_is_rejected() {
        let err = LlmEngine::parse("gpt").unwrap_err();
        assert!(err.to_string().contains("gpt"));
        assert!(SttEngine::parse("whisper").is_err());
    }

    #[test]
    fn test_parse_origins_skips_blanks() {
        let origins = parse_origins("http://a.test, ,http://b.test,");
        assert_eq!(origins, vec!["http://a.test", "http://b.test"]);
    }
}
