use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub media: MediaConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ServerConfig {
    pub bind_address: String,
    #[serde(default = "default_server_name")]
    pub server_name: String,
    /// Optional path to a directory containing the built viewer page
    pub web_dir: Option<String>,
    /// Public URL of this server (e.g., https://watch.example.com).
    /// Used to build the player links handed to viewers.
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4000".into(),
            server_name: default_server_name(),
            web_dir: None,
            public_url: None,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct MediaConfig {
    /// Directory scanned for playable video files. Streaming commands are
    /// rejected with an operator message while this is unset.
    pub video_dir: Option<String>,
}

fn default_server_name() -> String {
    "localhost".into()
}

/// Generate a commented config file template with the given values filled in.
fn generate_config_template(config: &Config) -> String {
    format!(
        r#"# Lockstep Server Configuration
# Generated automatically on first run. Edit as needed.

[server]
bind_address = "{bind_address}"
server_name = "{server_name}"
# Directory with the built viewer page (index.html and assets):
# web_dir = "./web/dist"
# Set explicitly for internet-facing deployments:
# public_url = "https://your-domain-or-ip:4000"

[media]
# Directory scanned recursively for .mp4/.mkv files:
# video_dir = "/srv/videos"
"#,
        bind_address = config.server.bind_address,
        server_name = config.server.server_name,
    )
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let mut config = if std::path::Path::new(path).exists() {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            tracing::info!("Config file not found at '{}', generating defaults...", path);
            let config = Config::default();

            // Ensure parent directory exists
            if let Some(parent) = std::path::Path::new(path).parent() {
                fs::create_dir_all(parent)?;
            }

            fs::write(path, generate_config_template(&config))?;
            tracing::info!("Generated default config at '{}'", path);
            config
        };

        // Environment variable overrides
        if let Ok(value) = std::env::var("LOCKSTEP_BIND_ADDRESS") {
            config.server.bind_address = value;
        }
        if let Ok(value) = std::env::var("LOCKSTEP_SERVER_NAME") {
            config.server.server_name = value;
        }
        if let Ok(value) = std::env::var("LOCKSTEP_WEB_DIR") {
            config.server.web_dir = Some(value);
        }
        if let Ok(value) = std::env::var("LOCKSTEP_PUBLIC_URL") {
            config.server.public_url = Some(value);
        }
        if let Ok(value) = std::env::var("LOCKSTEP_VIDEO_DIR") {
            let trimmed = value.trim();
            config.media.video_dir = if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            };
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn defaults_have_no_media_dir() {
        let config = Config::default();
        assert_eq!(config.server.bind_address, "0.0.0.0:4000");
        assert!(config.media.video_dir.is_none());
        assert!(config.server.public_url.is_none());
    }

    #[test]
    fn missing_file_generates_a_loadable_template() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config_path = temp.path().join("lockstep-test.toml");
        let path = config_path.to_str().expect("config path utf8");

        let first = Config::load(path).expect("generate defaults");
        assert!(config_path.exists());

        let second = Config::load(path).expect("reload generated file");
        assert_eq!(first.server.bind_address, second.server.bind_address);
        assert_eq!(first.server.server_name, second.server.server_name);
    }

    #[test]
    fn toml_file_round_trips_media_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config_path = temp.path().join("lockstep.toml");
        std::fs::write(
            &config_path,
            "[server]\nbind_address = \"127.0.0.1:9000\"\n\n[media]\nvideo_dir = \"/srv/videos\"\n",
        )
        .expect("write config");

        let config =
            Config::load(config_path.to_str().expect("config path utf8")).expect("load config");
        assert_eq!(config.server.bind_address, "127.0.0.1:9000");
        assert_eq!(config.media.video_dir.as_deref(), Some("/srv/videos"));
    }
}
