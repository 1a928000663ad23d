use config::{Config, File, FileFormat};
use secrecy::Secret;
use serde::Deserialize;
use std::env;
use std::time::Duration;

const BASE_CONFIG: &str = include_str!("../configuration/base.yaml");
const LOCAL_CONFIG: &str = include_str!("../configuration/local.yaml");
const PRODUCTION_CONFIG: &str = include_str!("../configuration/production.yaml");

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub telegram: TelegramSettings,
    pub watcher: WatcherSettings,
    pub travis: TravisSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApplicationSettings {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramSettings {
    pub base_url: String,
    #[serde(deserialize_with = "deserialize_secret")]
    pub bot_token: Secret<String>,
    pub timeout_seconds: u64,
}

impl TelegramSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Timing of the polling loop.
///
/// `fetch_timeout_seconds` should stay below `interval_seconds` so a hung
/// status endpoint is abandoned before the next tick is due.
#[derive(Debug, Deserialize, Clone)]
pub struct WatcherSettings {
    pub interval_seconds: u64,
    pub fetch_timeout_seconds: u64,
    pub max_in_flight: usize,
}

impl WatcherSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TravisSettings {
    pub api_base_url: String,
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Secret<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(Secret::new(s))
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    dotenvy::dotenv().ok();

    let environment = get_environment()?;
    build_configuration(environment)
}

fn get_environment() -> Result<Environment, config::ConfigError> {
    let env_var = env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "local".to_string());

    env_var.try_into().map_err(config::ConfigError::Message)
}

fn build_configuration(environment: Environment) -> Result<Settings, config::ConfigError> {
    let environment_config = match environment {
        Environment::Local => LOCAL_CONFIG,
        Environment::Production => PRODUCTION_CONFIG,
    };

    let config = Config::builder()
        .add_source(File::from_str(BASE_CONFIG, FileFormat::Yaml))
        .add_source(File::from_str(environment_config, FileFormat::Yaml))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    config.try_deserialize::<Settings>()
}

#[derive(Debug, PartialEq, Eq)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{other} is not a supported environment. Use either `local` or `production`."
            )),
        }
    }
}
