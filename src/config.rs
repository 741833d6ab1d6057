// file: src/config.rs
// description: application configuration management with toml support
// reference: https://docs.rs/config

use crate::error::{PipelineError, Result};
use crate::models::StageId;
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub interpreter: InterpreterConfig,
    pub stages: StagesConfig,
    pub probe: ProbeConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InterpreterConfig {
    /// Explicit interpreter; when unset the locator searches for one.
    #[serde(default)]
    pub path: Option<PathBuf>,
    pub venv_dir: PathBuf,
    pub project_root: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StagesConfig {
    pub working_dir: PathBuf,
    pub log_dir: PathBuf,
    pub tail_lines: usize,
    pub lang: String,
    pub generation: StageConfig,
    pub processing: StageConfig,
    pub assembly: StageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StageConfig {
    pub script: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    pub log_file: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbeConfig {
    pub enabled: bool,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub expected_reply: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererPreference {
    #[default]
    Auto,
    Plain,
    Dashboard,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UiConfig {
    #[serde(default)]
    pub renderer: RendererPreference,
}

impl StagesConfig {
    pub fn stage(&self, stage: StageId) -> &StageConfig {
        match stage {
            StageId::Generation => &self.generation,
            StageId::Processing => &self.processing,
            StageId::Assembly => &self.assembly,
        }
    }

    pub fn log_path(&self, stage: StageId) -> PathBuf {
        self.log_dir.join(&self.stage(stage).log_file)
    }

    /// Configured args followed by the flags every stage receives.
    pub fn launch_args(&self, stage: StageId) -> Vec<String> {
        let mut args = self.stage(stage).args.clone();
        args.push(format!("--lang={}", self.lang));
        args.push("--log-level=INFO".to_string());
        args
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok();

        let defaults = config::Config::try_from(&Self::default_config())
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        } else {
            builder = builder
                .add_source(config::File::from(Path::new("config/default.toml")).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("STAGE_CONDUCTOR")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            interpreter: InterpreterConfig {
                path: None,
                venv_dir: PathBuf::from("venv"),
                project_root: PathBuf::from("."),
            },
            stages: StagesConfig {
                working_dir: PathBuf::from("."),
                log_dir: PathBuf::from("logs"),
                tail_lines: 40,
                lang: "en".to_string(),
                generation: StageConfig {
                    script: PathBuf::from("src/program1_generate_markdowns.py"),
                    args: vec![],
                    log_file: "generate_markdowns.log".to_string(),
                },
                processing: StageConfig {
                    script: PathBuf::from("src/program2_ai_processor.py"),
                    args: vec![],
                    log_file: "ai_processor.log".to_string(),
                },
                assembly: StageConfig {
                    script: PathBuf::from("src/program3_generate_website.py"),
                    args: vec![],
                    log_file: "generate_website.log".to_string(),
                },
            },
            probe: ProbeConfig {
                enabled: true,
                endpoint: None,
                api_key: None,
                timeout_secs: 30,
                expected_reply: "Status: OK".to_string(),
            },
            ui: UiConfig::default(),
        }
    }

    fn validate(&self) -> Result<()> {
        for stage in StageId::ALL {
            let stage_config = self.stages.stage(stage);
            if stage_config.script.as_os_str().is_empty() {
                return Err(PipelineError::Config(format!(
                    "stages.{stage}.script must not be empty"
                )));
            }
            if stage_config.log_file.trim().is_empty() {
                return Err(PipelineError::Config(format!(
                    "stages.{stage}.log_file must not be empty"
                )));
            }
        }

        if self.stages.tail_lines == 0 {
            return Err(PipelineError::Config(
                "tail_lines must be greater than 0".to_string(),
            ));
        }

        if self.probe.timeout_secs == 0 {
            return Err(PipelineError::Config(
                "probe.timeout_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
