use bending_plugin::BendingConfig;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub logging: LoggingSection,
    #[serde(default)]
    pub server: ServerSection,
    /// Everything else belongs to the plugin.
    #[serde(flatten)]
    pub bending: BendingConfig,
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize)]
pub struct ServerSection {
    /// Milliseconds per tick. 50 = 20 TPS.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// World simulated players spawn in.
    #[serde(default = "default_world")]
    pub default_world: String,
}

fn default_tick_ms() -> u64 {
    50
}

fn default_world() -> String {
    "world".into()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            default_world: default_world(),
        }
    }
}

impl ServerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config() {
        let toml_str = r#"
            autosave_interval_ticks = 600

            [logging]
            level = "debug"

            [storage]
            engine = "memory"

            [resources]
            max = 80.0
        "#;
        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.logging.level, "debug");
        // server section defaults when absent
        assert_eq!(config.server.tick_ms, 50);
        assert_eq!(config.server.default_world, "world");
        assert_eq!(config.bending.autosave_interval_ticks, 600);
        assert_eq!(config.bending.game.resources.max, 80.0);
        assert_eq!(config.bending.storage.url, "sqlite://bending.db");
    }

    #[test]
    fn logging_section_required() {
        assert!(toml::from_str::<ServerConfig>("[server]\ntick_ms = 20").is_err());
    }

    #[test]
    fn sample_config_parses() {
        let config: ServerConfig = toml::from_str(include_str!("../bending.toml")).unwrap();
        assert_eq!(config.logging.level, "info");
        assert!(config
            .bending
            .game
            .abilities
            .iter()
            .any(|a| a.id == "fire-blast"));
    }
}
