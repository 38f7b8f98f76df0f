// Configuration loading
// Reads an INI file with a [global] section plus one section per service, then
// lets RESERVATION__* environment variables override any value
// (double underscore separates section and key, e.g. RESERVATION__HOTEL__KEY).

use std::{collections::BTreeMap, path::Path, time::Duration};

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::{client::ClientConfig, error::ClientError, retry::RetryConfig};

pub const DEFAULT_CONFIG_PATH: &str = "api.ini";
pub const ENV_PREFIX: &str = "RESERVATION";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub global: GlobalSection,
    // Every other section names a service
    #[serde(flatten)]
    pub services: BTreeMap<String, ServiceSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlobalSection {
    #[serde(default = "default_retries")]
    pub retries: u32,
    // Seconds to pause before each request attempt
    #[serde(default)]
    pub delay: f64,
}

impl Default for GlobalSection {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            delay: 0.0,
        }
    }
}

fn default_retries() -> u32 {
    3
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSection {
    pub url: String,
    pub key: String,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()).format(FileFormat::Ini))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let app: AppConfig = settings.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    // No environment overrides; used for inline configuration
    pub fn from_ini_str(content: &str) -> Result<Self, ClientError> {
        let app: AppConfig = Config::builder()
            .add_source(File::from_str(content, FileFormat::Ini))
            .build()?
            .try_deserialize()?;

        app.validate()?;
        Ok(app)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.global.retries == 0 {
            return Err(ClientError::ConfigError(
                "global.retries must be at least 1".to_string(),
            ));
        }
        if !self.global.delay.is_finite() || self.global.delay < 0.0 {
            return Err(ClientError::ConfigError(format!(
                "global.delay must be a non-negative number of seconds, got {}",
                self.global.delay
            )));
        }

        for (name, service) in &self.services {
            if service.url.trim().is_empty() {
                return Err(ClientError::ConfigError(format!("{name}.url is empty")));
            }
            if service.key.trim().is_empty() {
                return Err(ClientError::ConfigError(format!("{name}.key is empty")));
            }
        }
        Ok(())
    }

    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    /// Client settings for one named service section.
    pub fn client_config(&self, name: &str) -> Result<ClientConfig, ClientError> {
        let service = self
            .services
            .get(&name.to_lowercase())
            .ok_or_else(|| ClientError::ConfigError(format!("no [{name}] section configured")))?;

        Ok(ClientConfig::new(name, &service.url, &service.key)
            .with_retry(RetryConfig::default().with_max_attempts(self.global.retries))
            .with_request_delay(Duration::from_secs_f64(self.global.delay)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[global]
retries = 5
delay = 0.25

[hotel]
url = https://hotel.example.com
key = hotel-secret

[band]
url = https://band.example.com/
key = band-secret
"#;

    #[test]
    fn test_parse_ini() {
        let app = AppConfig::from_ini_str(SAMPLE).unwrap();

        assert_eq!(app.global.retries, 5);
        assert_eq!(app.global.delay, 0.25);
        assert_eq!(app.service_names().collect::<Vec<_>>(), vec!["band", "hotel"]);
        assert_eq!(app.services["hotel"].key, "hotel-secret");
    }

    #[test]
    fn test_client_config_for_service() {
        let app = AppConfig::from_ini_str(SAMPLE).unwrap();
        let hotel = app.client_config("hotel").unwrap();

        assert_eq!(hotel.service_name, "hotel");
        assert_eq!(hotel.base_url, "https://hotel.example.com");
        assert_eq!(hotel.api_key, "hotel-secret");
        assert_eq!(hotel.retry_config.max_attempts, 5);
        assert_eq!(hotel.retry_config.initial_backoff_ms, 100);
        assert_eq!(hotel.request_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_missing_service_section() {
        let app = AppConfig::from_ini_str(SAMPLE).unwrap();
        assert!(matches!(
            app.client_config("venue"),
            Err(ClientError::ConfigError(_))
        ));
    }

    #[test]
    fn test_global_defaults() {
        let app = AppConfig::from_ini_str("[hotel]\nurl = http://h\nkey = k\n").unwrap();
        assert_eq!(app.global.retries, 3);
        assert_eq!(app.global.delay, 0.0);
    }

    #[test]
    fn test_rejects_zero_retries() {
        let result = AppConfig::from_ini_str("[global]\nretries = 0\ndelay = 0\n");
        assert!(matches!(result, Err(ClientError::ConfigError(_))));
    }

    #[test]
    fn test_rejects_negative_delay() {
        let result = AppConfig::from_ini_str("[global]\nretries = 2\ndelay = -1\n");
        assert!(matches!(result, Err(ClientError::ConfigError(_))));
    }

    #[test]
    fn test_rejects_empty_key() {
        let result = AppConfig::from_ini_str("[hotel]\nurl = http://h\nkey =\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let app = AppConfig::load(file.path()).unwrap();
        assert_eq!(app.global.retries, 5);
        assert!(app.client_config("band").is_ok());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            AppConfig::load("/nonexistent/api.ini"),
            Err(ClientError::Load(_))
        ));
    }
}
