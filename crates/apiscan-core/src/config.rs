use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name looked up in the scan directory and its ancestors.
pub const CONFIG_FILE_NAME: &str = ".apiscan.toml";

/// Top-level configuration from `.apiscan.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub library: LibraryConfig,
}

/// The target library whose usage is surveyed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Root package name matched against import statements.
    #[serde(default = "default_library_name")]
    pub name: String,
    /// Canonical names whose call arguments are captured verbatim.
    #[serde(default = "default_entry_points")]
    pub entry_points: Vec<String>,
}

fn default_library_name() -> String {
    "numba".to_string()
}

fn default_entry_points() -> Vec<String> {
    [
        "numba.jit",
        "numba.njit",
        "numba.generated_jit",
        "numba.vectorize",
        "numba.guvectorize",
        "numba.cfunc",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            name: default_library_name(),
            entry_points: default_entry_points(),
        }
    }
}

impl Config {
    /// Load configuration from an `.apiscan.toml` file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let config: Config = toml::from_str(&content).with_context(|| {
            format!(
                "failed to parse '{}'. Run `apiscan init` to create a valid config file",
                path.display()
            )
        })?;
        Ok(config)
    }

    /// Load from `.apiscan.toml` in the given directory or any ancestor, or return defaults.
    pub fn load_or_default(dir: &Path) -> Self {
        let start = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        let mut current = start.as_path();
        loop {
            let config_path = current.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return match Self::load(&config_path) {
                    Ok(config) => config,
                    Err(e) => {
                        eprintln!(
                            "Warning: failed to load config from '{}': {e:#}. Using defaults.",
                            config_path.display()
                        );
                        Self::default()
                    }
                };
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }
        Self::default()
    }

    /// Generate default TOML content for `apiscan init`.
    pub fn default_toml() -> String {
        r#"# apiscan - library usage survey configuration

[library]
# Root package whose imports and references are resolved.
name = "numba"
# Canonical names whose call arguments are recorded verbatim
# (the library's compilation entry points).
entry_points = [
    "numba.jit",
    "numba.njit",
    "numba.generated_jit",
    "numba.vectorize",
    "numba.guvectorize",
    "numba.cfunc",
]
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.library.name, "numba");
        assert_eq!(config.library.entry_points.len(), 6);
        assert!(config
            .library
            .entry_points
            .contains(&"numba.njit".to_string()));
    }

    #[test]
    fn test_deserialize_config() {
        let toml_str = r#"
[library]
name = "jax"
entry_points = ["jax.jit", "jax.pmap"]
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.library.name, "jax");
        assert_eq!(config.library.entry_points, vec!["jax.jit", "jax.pmap"]);
    }

    #[test]
    fn test_missing_sections_fall_back_to_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.library.name, "numba");
    }

    #[test]
    fn test_default_toml_is_valid() {
        let toml_str = Config::default_toml();
        let config: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.library.name, "numba");
        assert_eq!(config.library.entry_points.len(), 6);
    }

    #[test]
    fn test_load_or_default_walks_ancestors() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            "[library]\nname = \"cupy\"\n",
        )
        .unwrap();
        let nested = tmp.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();

        let config = Config::load_or_default(&nested);
        assert_eq!(config.library.name, "cupy");
    }
}
