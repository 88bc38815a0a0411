//! `simcheck.toml` discovery and parsing, split out from [`crate::Cli`]
//! the way the grounding teacher's `tokmd` keeps `tokmd-config`'s Clap
//! structs apart from its TOML structs.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Every file-config key mirrors one `Options` knob from spec.md §6.1.
/// All fields are optional: an absent key falls back to `Options::new`'s
/// default, and a CLI flag always wins over a config-file value.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub kgram_length: Option<u32>,
    pub window_size: Option<u32>,
    pub min_files_per_hash: Option<usize>,
    pub max_files_per_hash: Option<usize>,
    pub similarity_threshold: Option<f64>,
    pub max_pairs_returned: Option<usize>,
    pub analysis_timeout_ms: Option<u64>,
}

/// Load configuration for this run.
///
/// `explicit` (the CLI's `--config PATH`) must exist if given; absent
/// that, discovery follows `SIMCHECK_CONFIG`, then `simcheck.toml` in
/// the current directory and its ancestors, then the user config
/// directory. No file found anywhere means every default applies.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<FileConfig> {
    if let Some(path) = explicit {
        return parse_toml_file(path)
            .ok_or_else(|| anyhow::anyhow!("config file not found or unreadable: {}", path.display()));
    }
    Ok(discover_config().unwrap_or_default())
}

fn discover_config() -> Option<FileConfig> {
    if let Ok(path) = std::env::var("SIMCHECK_CONFIG") {
        if let Some(cfg) = parse_toml_file(Path::new(&path)) {
            return Some(cfg);
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = Some(cwd.as_path());
        while let Some(d) = dir {
            let candidate = d.join("simcheck.toml");
            if let Some(cfg) = parse_toml_file(&candidate) {
                return Some(cfg);
            }
            dir = d.parent();
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let candidate = config_dir.join("simcheck").join("simcheck.toml");
        if let Some(cfg) = parse_toml_file(&candidate) {
            return Some(cfg);
        }
    }

    None
}

fn parse_toml_file(path: &Path) -> Option<FileConfig> {
    if !path.is_file() {
        return None;
    }
    let text = std::fs::read_to_string(path).ok()?;
    toml::from_str(&text).ok()
}
