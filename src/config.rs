//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::Result;
use crate::error::Error;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Workspace directory path (holds the agency manifesto)
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,

    /// LLM provider to use
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Gemini API key
    #[serde(default)]
    pub gemini_api_key: String,

    /// Model to use
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum agent steps per run
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Character limit for file inspection
    #[serde(default = "default_text_limit")]
    pub text_limit: usize,

    /// Where uploaded files are stored
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Where tools write generated files
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// HTTP backend configuration
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Frontend assets (index.html plus the static/ directory)
    #[serde(default = "default_frontend_dir")]
    pub frontend_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            frontend_dir: default_frontend_dir(),
        }
    }
}

fn default_workspace() -> PathBuf {
    config_dir().join("workspace")
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_max_steps() -> usize {
    10
}

fn default_text_limit() -> usize {
    100_000
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data").join("output")
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_frontend_dir() -> PathBuf {
    PathBuf::from("frontend")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            provider: default_provider(),
            gemini_api_key: String::new(),
            model: default_model(),
            max_steps: default_max_steps(),
            text_limit: default_text_limit(),
            upload_dir: default_upload_dir(),
            output_dir: default_output_dir(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Apply environment overrides on top of the file values.
    ///
    /// Recognised: `GEMINI_API_KEY`, `SMART_MODEL`, `AGENCY_HOST`, `AGENCY_PORT`.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(key) = get("GEMINI_API_KEY").filter(|v| !v.is_empty()) {
            self.gemini_api_key = key;
        }
        if let Some(model) = get("SMART_MODEL").filter(|v| !v.is_empty()) {
            // LiteLLM-style ids carry a provider prefix ("gemini/gemini-2.0-flash")
            self.model = model.rsplit('/').next().unwrap_or(&model).to_string();
        }
        if let Some(host) = get("AGENCY_HOST").filter(|v| !v.is_empty()) {
            self.server.host = host;
        }
        if let Some(port) = get("AGENCY_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| Error::Config(format!("Invalid AGENCY_PORT: {port}")))?;
        }
        Ok(())
    }

    /// Directories whose files are served for download and listed in the UI.
    pub fn file_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = vec![self.output_dir.clone(), self.upload_dir.clone()];
        dirs.dedup();
        dirs
    }

    /// Path of the agency manifesto appended to the system prompt.
    pub fn manifesto_path(&self) -> PathBuf {
        self.workspace.join("agency_manifesto.md")
    }
}

/// Get the config directory path
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".agency")
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Load configuration from file (defaults when absent), then the environment.
pub fn load() -> Result<Config> {
    let _ = dotenvy::dotenv();
    let mut config = load_from(&config_path())?;
    config.apply_env()?;
    Ok(config)
}

/// Load configuration from a specific file; a missing file yields defaults.
pub fn load_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!("No config at {:?}, using defaults", path);
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid config at {:?}: {}", path, e)))?;
    Ok(config)
}

/// Save configuration to file
pub fn save(config: &Config) -> Result<()> {
    let path = config_path();

    // Create parent directory
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, content)?;
    Ok(())
}

/// Initialize configuration and workspace
pub fn onboard() -> Result<()> {
    use crate::ui;
    use inquire::{Confirm, Text};

    ui::print_header("Setup Wizard");
    println!("  Welcome! Let's get the agency configured.\n");

    let mut config = Config::default();

    // 1. API key
    let key = Text::new("Enter your Gemini API Key (leave empty to use GEMINI_API_KEY):")
        .prompt()
        .map_err(|e| Error::Config(format!("Prompt failed: {}", e)))?;
    config.gemini_api_key = key;

    // 2. Model
    let model = Text::new("Model:")
        .with_default(&config.model)
        .prompt()
        .map_err(|e| Error::Config(format!("Prompt failed: {}", e)))?;
    config.model = model;

    // 3. Workspace
    ui::print_step(&format!("Default workspace is at {:?}", config.workspace));
    let keep_path = Confirm::new("Use default workspace path?")
        .with_default(true)
        .prompt()
        .map_err(|e| Error::Config(format!("Prompt failed: {}", e)))?;

    if !keep_path {
        let new_path = Text::new("Enter custom workspace path:")
            .prompt()
            .map_err(|e| Error::Config(format!("Prompt failed: {}", e)))?;
        config.workspace = PathBuf::from(new_path);
    }

    // 4. Folders
    ui::print_thinking("Creating directories");
    std::fs::create_dir_all(&config.workspace)?;
    std::fs::create_dir_all(&config.upload_dir)?;
    std::fs::create_dir_all(&config.output_dir)?;

    ui::print_thinking("Bootstrapping agency_manifesto.md");
    create_manifesto(&config.manifesto_path())?;

    // 5. Save
    ui::print_thinking("Saving configuration");
    save(&config)?;

    println!();
    ui::print_success("Setup complete!");
    ui::print_step("Run 'agency serve' to start the web backend or 'agency run -m \"...\"'.");

    Ok(())
}

fn create_manifesto(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }

    let manifesto = r#"# Agency Manifesto

You coordinate a small agency of tools on behalf of the user.

## Guidelines

- Break the task into steps and use one tool per step
- Use `get_current_time` whenever the answer depends on today's date
- Research with `web_search` and read sources with `web_fetch`
- When the user provides files, inspect them with `inspect_file_as_text`
- Export tabular answers with `markdown_to_excel` when the user asks for a spreadsheet
- Finish with `final_answer`
"#;

    std::fs::write(path, manifesto)?;
    Ok(())
}
