use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::Deserialize;

use crate::template::TemplateOptions;

pub const CONFIG_FILE_NAME: &str = "docx-templater.toml";
pub const CONFIG_ENV_VAR: &str = "DOCX_TEMPLATER_CONFIG";

const DEFAULT_CONFIG: &str = r#"# docx-templater configuration

[template]
# Delimiter written on both sides of every marker name, e.g. $name$.
marker_symbol = "$"
# Markers to repair when Word split them over several runs.
variables = []
# Repair every marker found in the template, not only the declared ones.
repair_all = true

[output]
# Replace an existing output file.
overwrite = true
"#;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub template: TemplateSection,
    #[serde(default)]
    pub output: OutputSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct TemplateSection {
    #[serde(default)]
    pub marker_symbol: Option<String>,
    #[serde(default)]
    pub variables: Vec<String>,
    /// Discover markers in the template and repair all of them.
    #[serde(default)]
    pub repair_all: Option<bool>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct OutputSection {
    #[serde(default)]
    pub overwrite: Option<bool>,
}

impl AppConfig {
    /// Session options with `symbol` (from the command line) taking precedence.
    pub fn template_options(&self, symbol: Option<&str>) -> TemplateOptions {
        let defaults = TemplateOptions::default();
        TemplateOptions {
            marker_symbol: symbol
                .map(str::to_string)
                .or_else(|| self.template.marker_symbol.clone())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.marker_symbol),
            variables: self.template.variables.clone(),
        }
    }

    pub fn repair_all(&self) -> bool {
        self.template.repair_all.unwrap_or(true)
    }

    pub fn overwrite(&self) -> bool {
        self.output.overwrite.unwrap_or(true)
    }
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

/// Looks in the environment, then upwards from the current directory, `workdir` and the
/// executable's directory.
pub fn find_default_config(workdir: &Path) -> Option<PathBuf> {
    if let Some(p) = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from) {
        if p.exists() {
            return Some(p);
        }
    }
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, CONFIG_FILE_NAME, 8) {
            return Some(p);
        }
    }
    if let Some(p) = find_file_upwards(workdir, CONFIG_FILE_NAME, 8) {
        return Some(p);
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, CONFIG_FILE_NAME, 10) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&text).context("parse config toml")?;
    Ok(cfg)
}

/// Writes the default config into `dir`; refuses to clobber an existing file unless `force`.
pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("create dir: {}", dir.display()))?;
    let path = dir.join(CONFIG_FILE_NAME);
    if path.exists() && !force {
        return Err(anyhow!(
            "config already exists: {} (use --force to overwrite)",
            path.display()
        ));
    }
    std::fs::write(&path, DEFAULT_CONFIG)
        .with_context(|| format!("write config: {}", path.display()))?;
    Ok(path)
}
