//! Environment configuration for the Hugging Face pipeline

use std::path::{Path, PathBuf};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

pub const API_KEY_VAR: &str = "HF_API_KEY";
pub const MODEL_ID_VAR: &str = "HF_MODEL_ID";
pub const INFERENCE_URL_VAR: &str = "HF_INFERENCE_URL";
pub const HUB_URL_VAR: &str = "HF_HUB_URL";
pub const TIMEOUT_VAR: &str = "HF_TIMEOUT_SECS";

pub const DEFAULT_MODEL_ID: &str = "meta-llama/Meta-Llama-3-8B-Instruct";
pub const DEFAULT_INFERENCE_URL: &str = "https://router.huggingface.co/v1";
pub const DEFAULT_HUB_URL: &str = "https://huggingface.co";

pub const DOTENV_FILE: &str = ".env";

/// Where the pipeline sends requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig
{   /// Chat completions base URL
    pub inference_url: String
  , /// Hub base URL, used to load the tokenizer
    pub hub_url: String
  , /// Request timeout in seconds, `None` waits forever
    pub timeout_secs: Option<u64>
}

impl Default for EndpointConfig
{   fn default() -> Self
    {   EndpointConfig
        {   inference_url: DEFAULT_INFERENCE_URL.to_string()
          , hub_url: DEFAULT_HUB_URL.to_string()
          , timeout_secs: None
        }
    }
}

/// Hugging Face client configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct HuggingFaceConfig
{   /// Access token, `None` when unset or blank
    #[serde(skip_serializing, default)]
    pub api_key: Option<String>
  , /// Model repository id
    pub model_id: String
  , pub endpoints: EndpointConfig
}

impl std::fmt::Debug for HuggingFaceConfig
{   fn fmt(&self, f: &mut std::fmt::Formatter<'_>)
      -> std::fmt::Result
    {   f.debug_struct("HuggingFaceConfig")
          .field("api_key", &self.api_key.as_ref().map(|_| "***"))
          .field("model_id", &self.model_id)
          .field("endpoints", &self.endpoints)
          .finish()
    }
}

impl Default for HuggingFaceConfig
{   fn default() -> Self
    {   HuggingFaceConfig
        {   api_key: None
          , model_id: DEFAULT_MODEL_ID.to_string()
          , endpoints: EndpointConfig::default()
        }
    }
}

impl HuggingFaceConfig
{   /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, crate::error::Error>
    {   Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F)
      -> Result<Self, crate::error::Error>
    where F: Fn(&str) -> Option<String>
    {   let non_empty = |key: &str| {
          lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
        };

        let defaults = HuggingFaceConfig::default();

        let timeout_secs = match non_empty(TIMEOUT_VAR)
        {   Some(raw) => Some(raw.parse::<u64>().map_err(|_| {
              crate::error::Error::InvalidConfiguration(
                format!("{} must be a whole number of seconds, got {:?}"
                  , TIMEOUT_VAR, raw)
              )
            })?)
          , None => None
        };

        // the credential is passed through untouched
        let api_key = lookup(API_KEY_VAR)
          .filter(|v| !v.trim().is_empty());

        let config = HuggingFaceConfig
        {   api_key
          , model_id: non_empty(MODEL_ID_VAR)
              .unwrap_or(defaults.model_id)
          , endpoints: EndpointConfig
            {   inference_url: non_empty(INFERENCE_URL_VAR)
                  .map(|u| u.trim_end_matches('/').to_string())
                  .unwrap_or(defaults.endpoints.inference_url)
              , hub_url: non_empty(HUB_URL_VAR)
                  .map(|u| u.trim_end_matches('/').to_string())
                  .unwrap_or(defaults.endpoints.hub_url)
              , timeout_secs
            }
        };

        debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }
}

/// Nearest `.env` in the working directory or one of its parents
fn find_dotenv() -> Option<PathBuf>
{   let cwd = std::env::current_dir().ok()?;
    cwd.ancestors()
      .map(|dir| dir.join(DOTENV_FILE))
      .find(|path| path.is_file())
}

/// Populate the environment from a local `.env` file, if there is one
pub fn load_dotenv()
{   match find_dotenv()
    {   Some(path) => {
          load_dotenv_from(&path);
        }
      , None => debug!("No .env file found")
    }
}

/// Load `path` into the environment line by line.
///
/// Unparseable lines are skipped with a warning and variables already
/// set in the environment win. Returns how many variables were set.
pub fn load_dotenv_from(path: &Path) -> usize
{   let entries = match dotenvy::from_path_iter(path)
    {   Ok(entries) => entries
      , Err(e) if e.not_found() => {
          debug!("No .env file at {}", path.display());
          return 0;
        }
      , Err(e) => {
          warn!("Ignoring unreadable {}: {}", path.display(), e);
          return 0;
        }
    };

    let mut loaded = 0;
    for entry in entries
    {   match entry
        {   Ok((key, value)) => {
              if std::env::var_os(&key).is_some()
              {   debug!("{} already set, keeping it", key);
                  continue;
              }
              std::env::set_var(&key, value);
              loaded += 1;
            }
          , Err(e) => {
              warn!("Skipping bad line in {}: {}", path.display(), e);
            }
        }
    }

    debug!("Loaded {} variables from {}", loaded, path.display());
    loaded
}

#[cfg(test)]
mod tests
{   use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)])
      -> impl Fn(&str) -> Option<String>
    {   let map: HashMap<String, String> = pairs
          .iter()
          .map(|(k, v)| (k.to_string(), v.to_string()))
          .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_environment_is_empty()
    {   let config = HuggingFaceConfig::from_lookup(lookup_from(&[]))
          .unwrap();
        assert!(config.api_key.is_none());
        assert_eq!(config.model_id, DEFAULT_MODEL_ID);
        assert_eq!(config.endpoints.inference_url, DEFAULT_INFERENCE_URL);
        assert_eq!(config.endpoints.hub_url, DEFAULT_HUB_URL);
        assert!(config.endpoints.timeout_secs.is_none());
    }

    #[test]
    fn reads_key_and_overrides()
    {   let config = HuggingFaceConfig::from_lookup(lookup_from(&[
          (API_KEY_VAR, "hf_abc")
        , (MODEL_ID_VAR, "meta-llama/Meta-Llama-3-70B-Instruct")
        , (INFERENCE_URL_VAR, "http://localhost:8080/v1/")
        , (TIMEOUT_VAR, "30")
        ])).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("hf_abc"));
        assert_eq!(config.model_id, "meta-llama/Meta-Llama-3-70B-Instruct");
        assert_eq!(config.endpoints.inference_url, "http://localhost:8080/v1");
        assert_eq!(config.endpoints.timeout_secs, Some(30));
    }

    #[test]
    fn blank_key_counts_as_absent()
    {   let config = HuggingFaceConfig::from_lookup(
          lookup_from(&[(API_KEY_VAR, "   ")])
        ).unwrap();
        assert!(config.api_key.is_none());
    }

    #[test]
    fn rejects_non_numeric_timeout()
    {   let result = HuggingFaceConfig::from_lookup(
          lookup_from(&[(TIMEOUT_VAR, "soon")])
        );
        assert!(matches!(
          result,
          Err(crate::error::Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn debug_hides_the_key()
    {   let config = HuggingFaceConfig::from_lookup(
          lookup_from(&[(API_KEY_VAR, "hf_secret")])
        ).unwrap();
        assert!(!format!("{:?}", config).contains("hf_secret"));
    }

    #[test]
    fn serialized_config_omits_the_key()
    {   let config = HuggingFaceConfig::from_lookup(
          lookup_from(&[(API_KEY_VAR, "hf_secret")])
        ).unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hf_secret"));
        assert!(!json.contains("api_key"));
    }

    #[test]
    fn key_is_kept_exactly_as_given()
    {   let config = HuggingFaceConfig::from_lookup(
          lookup_from(&[(API_KEY_VAR, " hf_abc\t")])
        ).unwrap();
        assert_eq!(config.api_key.as_deref(), Some(" hf_abc\t"));
    }

    fn write_dotenv(contents: &str) -> tempfile::TempDir
    {   let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DOTENV_FILE), contents).unwrap();
        dir
    }

    #[test]
    fn bad_dotenv_line_does_not_hide_later_keys()
    {   let dir = write_dotenv(
          "TACTICAL_DOTENV_BEFORE=1\n\
           this is not valid\n\
           TACTICAL_DOTENV_AFTER=hf_after\n"
        );

        let loaded = load_dotenv_from(&dir.path().join(DOTENV_FILE));

        assert_eq!(loaded, 2);
        assert_eq!(
          std::env::var("TACTICAL_DOTENV_BEFORE").as_deref(),
          Ok("1")
        );
        assert_eq!(
          std::env::var("TACTICAL_DOTENV_AFTER").as_deref(),
          Ok("hf_after")
        );
    }

    #[test]
    fn dotenv_does_not_override_environment()
    {   std::env::set_var("TACTICAL_DOTENV_PRESET", "from_env");
        let dir = write_dotenv("TACTICAL_DOTENV_PRESET=from_file\n");

        let loaded = load_dotenv_from(&dir.path().join(DOTENV_FILE));

        assert_eq!(loaded, 0);
        assert_eq!(
          std::env::var("TACTICAL_DOTENV_PRESET").as_deref(),
          Ok("from_env")
        );
    }

    #[test]
    fn missing_dotenv_is_not_an_error()
    {   let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_dotenv_from(&dir.path().join(DOTENV_FILE)), 0);
    }
}
