use common::{Environment, LogLevel};
use inference::{DEFAULT_CLASS_NAMES, Device, ModelConfig};
use preprocess::Normalization;
use serde::Deserialize;
use std::time::Duration;

const BYTES_PER_MB: usize = 1024 * 1024;
const MAX_INPUT_SIDE: u32 = 4096;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelSettings {
    pub name: String,
    pub path: String,
    pub confidence_threshold: f64,
    pub input_width: u32,
    pub input_height: u32,
    pub enable_gpu: bool,
    pub inference_timeout_ms: u64,
    pub class_names: Vec<String>,
    pub load_retries: u32,
    pub normalization: Normalization,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitSettings {
    pub max_batch_size: usize,
    pub max_file_size_mb: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub log_level: LogLevel,
    pub environment: Environment,
    pub otel_endpoint: Option<String>,
    pub server: ServerSettings,
    pub model: ModelSettings,
    pub limits: LimitSettings,
}

impl Config {
    pub fn address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn max_file_size_bytes(&self) -> usize {
        self.limits.max_file_size_mb.saturating_mul(BYTES_PER_MB)
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.model.inference_timeout_ms)
    }

    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            name: self.model.name.clone(),
            model_path: self.model.path.clone(),
            device: Device::from_gpu_flag(self.model.enable_gpu),
            input_size: (self.model.input_width, self.model.input_height),
            normalization: self.model.normalization,
            class_names: self.model.class_names.clone(),
            load_retries: self.model.load_retries,
            ..ModelConfig::default()
        }
    }

    fn validate(&self) -> Result<(), String> {
        let threshold = self.model.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(format!(
                "model.confidence_threshold must be within [0, 1], got {}",
                threshold
            ));
        }
        if self.model.input_width == 0 || self.model.input_height == 0 {
            return Err("model.input_width and model.input_height must be positive".into());
        }
        if self.model.input_width > MAX_INPUT_SIDE || self.model.input_height > MAX_INPUT_SIDE {
            return Err(format!(
                "model.input_width and model.input_height must not exceed {}, got {}x{}",
                MAX_INPUT_SIDE, self.model.input_width, self.model.input_height
            ));
        }
        if self.model.class_names.is_empty() {
            return Err("model.class_names must not be empty".into());
        }
        if self.limits.max_batch_size == 0 {
            return Err("limits.max_batch_size must be positive".into());
        }
        if self.limits.max_file_size_mb == 0 {
            return Err("limits.max_file_size_mb must be positive".into());
        }
        Ok(())
    }
}

pub fn get_configuration() -> Result<Config, config::ConfigError> {
    load(environment_source())
}

fn environment_source() -> config::Environment {
    config::Environment::with_prefix("GATEWAY")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("model.class_names")
}

fn load(source: config::Environment) -> Result<Config, config::ConfigError> {
    let class_names: Vec<String> = DEFAULT_CLASS_NAMES.iter().map(|s| s.to_string()).collect();

    let config = config::Config::builder()
        .set_default("log_level", "info")?
        .set_default("environment", "development")?
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8000)?
        .set_default("model.name", "rtdetr-pcb")?
        .set_default("model.path", "models/model.onnx")?
        .set_default("model.confidence_threshold", 0.5)?
        .set_default("model.input_width", 640)?
        .set_default("model.input_height", 640)?
        .set_default("model.enable_gpu", false)?
        .set_default("model.inference_timeout_ms", 30_000)?
        .set_default("model.class_names", class_names)?
        .set_default("model.load_retries", 3)?
        .set_default("model.normalization", "unit")?
        .set_default("limits.max_batch_size", 10)?
        .set_default("limits.max_file_size_mb", 50)?
        .add_source(source)
        .build()?;

    let config: Config = config.try_deserialize::<Config>()?;
    config.validate().map_err(config::ConfigError::Message)?;

    Ok(config)
}
