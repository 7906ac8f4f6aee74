use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default, deserialize_with = "deserialize_log_level")]
    pub log_level: LogLevel,
    #[serde(default, deserialize_with = "deserialize_log_format")]
    pub log_format: LogFormat,
    #[serde(default)]
    pub assets: AssetSettings,
    #[serde(default)]
    pub model: ModelSettings,
    #[serde(default)]
    pub benchmark: BenchmarkSettings,
    #[serde(default)]
    pub output: OutputSettings,
}

fn deserialize_log_level<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.try_into().map_err(serde::de::Error::custom)
}

fn deserialize_log_format<'de, D>(deserializer: D) -> Result<LogFormat, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.try_into().map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssetSettings {
    #[serde(default = "default_assets_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_model_file")]
    pub model_file: String,
    #[serde(default = "default_image_file")]
    pub image_file: String,
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("assets")
}

fn default_model_file() -> String {
    "yolo11n.onnx".to_string()
}

fn default_image_file() -> String {
    "test_image.jpg".to_string()
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            dir: default_assets_dir(),
            model_file: default_model_file(),
            image_file: default_image_file(),
        }
    }
}

/// Which required input file is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingAsset {
    Model(PathBuf),
    Image(PathBuf),
}

impl AssetSettings {
    pub fn get_model_path(&self) -> PathBuf {
        self.dir.join(&self.model_file)
    }

    pub fn get_image_path(&self) -> PathBuf {
        self.dir.join(&self.image_file)
    }

    pub fn validate(&self) -> Result<(), MissingAsset> {
        if !self.get_model_path().exists() {
            return Err(MissingAsset::Model(self.get_model_path()));
        }
        if !self.get_image_path().exists() {
            return Err(MissingAsset::Image(self.get_image_path()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelSettings {
    #[serde(default = "default_input_size")]
    pub input_width: u32,
    #[serde(default = "default_input_size")]
    pub input_height: u32,
    #[serde(default = "default_min_probability")]
    pub min_probability: f32,
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,
}

fn default_input_size() -> u32 {
    640
}

fn default_min_probability() -> f32 {
    0.5
}

fn default_iou_threshold() -> f32 {
    0.7
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            input_width: default_input_size(),
            input_height: default_input_size(),
            min_probability: default_min_probability(),
            iou_threshold: default_iou_threshold(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BenchmarkSettings {
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
    #[serde(default = "default_pause_between_backends_ms")]
    pub pause_between_backends_ms: u64,
}

fn default_sample_interval_ms() -> u64 {
    100
}

fn default_pause_between_backends_ms() -> u64 {
    1000
}

impl Default for BenchmarkSettings {
    fn default() -> Self {
        Self {
            sample_interval_ms: default_sample_interval_ms(),
            pause_between_backends_ms: default_pause_between_backends_ms(),
        }
    }
}

impl BenchmarkSettings {
    pub fn get_sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms.max(1))
    }

    pub fn get_pause_between_backends(&self) -> Duration {
        Duration::from_millis(self.pause_between_backends_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputSettings {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default)]
    pub font_file: Option<PathBuf>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            font_file: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            other => Err(format!(
                "{} is not a supported minimum log level. Use either `debug` or `info`.",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl TryFrom<String> for LogFormat {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "{} is not a supported log format. Use either `pretty` or `json`.",
                other
            )),
        }
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("no current directory: {}", e)))?;
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")).required(false))
        .add_source(
            config::File::from(
                configuration_directory.join(format!("{}.yaml", environment.as_str())),
            )
            .required(false),
        )
        .add_source(
            config::Environment::with_prefix("BENCH")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
