use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub web: WebConfig,
    // Populated from the .env file
    pub database_path: String,
    pub media_path: String,
    pub allowed_origins: String,
    pub log_level: String,
    pub session_secret_key: String,
    pub admin_url_prefix: String,
    pub use_secure_cookies: bool,
    // Populated from config/default.toml
    pub posts_per_page: u32,
    pub max_image_size_mb: u64,
}

fn required_var(name: &str) -> Result<String, config::ConfigError> {
    env::var(name).map_err(|_| {
        config::ConfigError::Message(format!(
            "FATAL: Environment variable '{}' is not set in your .env file.",
            name
        ))
    })
}

/// The session key must be 128 hexadecimal characters (64 bytes).
pub fn validate_session_secret_key(key: &str) -> Result<(), config::ConfigError> {
    if key.len() != 128 || !key.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(config::ConfigError::Message(
            "FATAL: 'SESSION_SECRET_KEY' must be 128 hexadecimal characters long (64 bytes).".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_admin_url_prefix(prefix: &str) -> Result<(), config::ConfigError> {
    if prefix.is_empty() || !prefix.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return Err(config::ConfigError::Message(
            "FATAL: 'ADMIN_URL_PREFIX' must not be empty and can only contain letters, numbers, underscores, and hyphens.".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_absolute_path(name: &str, value: &str) -> Result<(), config::ConfigError> {
    if Path::new(value).is_relative() {
        return Err(config::ConfigError::Message(format!(
            "FATAL: The '{}' in your .env file is a relative path ('{}'). It MUST be an absolute path.",
            name, value
        )));
    }
    Ok(())
}

impl Config {
    pub fn from_env(env_path: &Path) -> Result<Self, config::ConfigError> {
        dotenvy::from_path(env_path).map_err(|e| {
            config::ConfigError::Message(format!(
                "FATAL: Failed to load .env file from '{}'. Error: {}",
                env_path.display(),
                e
            ))
        })?;

        let database_path = required_var("DATABASE_PATH")?;
        let media_path = required_var("MEDIA_PATH")?;
        let session_secret_key = required_var("SESSION_SECRET_KEY")?;
        let admin_url_prefix = required_var("ADMIN_URL_PREFIX")?;

        validate_absolute_path("DATABASE_PATH", &database_path)?;
        validate_absolute_path("MEDIA_PATH", &media_path)?;
        validate_session_secret_key(&session_secret_key)?;
        validate_admin_url_prefix(&admin_url_prefix)?;

        let allowed_origins = env::var("ALLOWED_ORIGINS").unwrap_or_default();
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let use_secure_cookies = env::var("USE_SECURE_COOKIES")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);

        let builder = config::Config::builder()
            .set_default("posts_per_page", 10)?
            .set_default("max_image_size_mb", 5)?
            // Web host/port and listing sizes live in the TOML file.
            .add_source(config::File::new("config/default.toml", config::FileFormat::Toml))
            .set_override("database_path", database_path)?
            .set_override("media_path", media_path)?
            .set_override("session_secret_key", session_secret_key)?
            .set_override("allowed_origins", allowed_origins)?
            .set_override("log_level", log_level)?
            .set_override("use_secure_cookies", use_secure_cookies)?
            .set_override("admin_url_prefix", admin_url_prefix)?
            .build()?;

        builder.try_deserialize()
    }

    /// Full path to the blog database file inside its own folder.
    pub fn blog_db_path(&self) -> PathBuf {
        PathBuf::from(&self.database_path).join("blog").join("blog.db")
    }

    /// Folder where uploaded post illustrations are written.
    pub fn post_images_dir(&self) -> PathBuf {
        PathBuf::from(&self.media_path).join(crate::helper::upload_helpers::POST_IMAGES_DIR)
    }

    pub fn admin_base_url(&self) -> String {
        format!("/management/{}", self.admin_url_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_key_must_be_128_hex_chars() {
        assert!(validate_session_secret_key(&"ab".repeat(64)).is_ok());
        assert!(validate_session_secret_key(&"ab".repeat(32)).is_err());
        assert!(validate_session_secret_key(&"zz".repeat(64)).is_err());
    }

    #[test]
    fn admin_prefix_rejects_slashes_and_empty() {
        assert!(validate_admin_url_prefix("staff-area_1").is_ok());
        assert!(validate_admin_url_prefix("").is_err());
        assert!(validate_admin_url_prefix("a/b").is_err());
    }

    #[test]
    fn relative_paths_are_refused() {
        assert!(validate_absolute_path("MEDIA_PATH", "/srv/media").is_ok());
        assert!(validate_absolute_path("MEDIA_PATH", "media").is_err());
    }
}
