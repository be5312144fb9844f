use secrecy::Secret;
use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub image_model: ImageModelSettings,
    pub generation: GenerationSettings,
    pub report: ReportSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
}

/// Location of the pretrained image classification artifacts.
///
/// The module is a TorchScript export; the label file maps class index
/// to a human readable name, one label per line.
#[derive(Debug, Deserialize, Clone)]
pub struct ImageModelSettings {
    pub module_path: String,
    pub labels_path: String,
}

/// Settings for the hosted chat-completion service used to write reports.
///
/// The credential is never kept in source: it comes from the configuration
/// files or, preferably, from the `APP_GENERATION__API_KEY` env variable.
#[derive(Debug, Deserialize, Clone)]
pub struct GenerationSettings {
    pub api_key: Secret<String>,
    pub base_url: String,
    pub model: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_tokens: u16,
    pub temperature: f32,
    /// Upper bound on the completion HTTP call, in seconds
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportSettings {
    /// Number of guidelines retrieved from the index for each report
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub retrieved_guidelines: usize,
    /// Pins the report date to a fixed value (ex: "March 22, 2025") for demos.
    /// When unset, reports carry the current date.
    pub date_override: Option<String>,
}

/// Extracts app settings from configuration files and env variables
///
/// `base.yaml` should contain shared settings for all environments.
/// A specific env file should be created for each environment: `local.yaml` and `production.yaml`
/// The environment is set with the env var `APP_ENVIRONMENT`.
/// If `APP_ENVIRONMENT` is not set, `local.yaml` is the default.
///
/// Settings are also taken from environment variables: with a prefix of APP and '__' as separator
/// For ex: `APP_APPLICATION__PORT=5001` would set `Settings.application.port`
pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let configuration_directory = base_path.join("configuration");

    // Detects the running environment.
    // Default to `local` if unspecified.
    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .expect("Failed to parse APP_ENVIRONMENT.");
    let environment_filename = format!("{}.yaml", environment.as_str());

    let settings = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(config::File::from(
            configuration_directory.join(environment_filename),
        ))
        // Adds in settings from environment variables (with a prefix of APP and '__' as separator)
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}

/// The possible runtime environment for our application.
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
