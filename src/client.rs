//! Text-generation pipeline acquisition

use std::fmt;
use std::time::Duration;
use async_trait::async_trait;
use log::{debug, error, info};
use tokio::sync::mpsc;
use crate::config::EndpointConfig;
use crate::providers::huggingface::{
  ChatCompletionRequest, Endpoints, HuggingFaceClient
};
use crate::request::{ChatMessage, GenerationOutput, GenerationParams};
use crate::tokenizer::Tokenizer;

/// Anything that can continue a chat transcript
#[async_trait]
pub trait TextGenerator: Send + Sync
{   /// Tokenizer of the bound model
    fn tokenizer(&self) -> &Tokenizer;

    /// Generate a continuation for `messages`
    async fn generate(
      &self
    , messages: Vec<ChatMessage>
    , params: GenerationParams
    ) -> Result<Vec<GenerationOutput>, crate::error::Error>;
}

/// Pipeline task designation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task
{   TextGeneration
}

impl fmt::Display for Task
{   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {   match self
        {   Task::TextGeneration => write!(f, "text-generation")
        }
    }
}

impl std::str::FromStr for Task
{   type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {   match s
        {   "text-generation" => Ok(Task::TextGeneration)
          , other => Err(crate::error::Error::UnsupportedTask(
              other.to_string()
            ))
        }
    }
}

/// Where the model runs; the router picks the hardware
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceMap
{   /// Let the router choose a provider
    Auto
  , /// Lowest-latency provider
    Fastest
  , /// Lowest-cost provider
    Cheapest
  , /// A named inference provider
    Provider(String)
}

impl DeviceMap
{   /// Model id as the inference router expects it
    pub fn route(&self, model: &str) -> String
    {   match self
        {   DeviceMap::Auto => model.to_string()
          , DeviceMap::Fastest => format!("{}:fastest", model)
          , DeviceMap::Cheapest => format!("{}:cheapest", model)
          , DeviceMap::Provider(name) => format!("{}:{}", model, name)
        }
    }
}

/// Numeric precision requested for the weights
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TorchDtype
{   Auto
  , BFloat16
  , Float16
  , Float32
}

/// Model loading options
#[derive(Clone, PartialEq, Eq)]
pub struct ModelKwargs
{   pub torch_dtype: TorchDtype
  , pub token: Option<String>
}

impl fmt::Debug for ModelKwargs
{   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {   f.debug_struct("ModelKwargs")
          .field("torch_dtype", &self.torch_dtype)
          .field("token", &self.token.as_ref().map(|_| "***"))
          .finish()
    }
}

/// A model bound to a hosted inference client
pub struct TextGenerationPipeline
{   model: String
  , device_map: DeviceMap
  , torch_dtype: TorchDtype
  , tokenizer: Tokenizer
  , client: HuggingFaceClient
}

/// Acquire a pipeline for `model`
///
/// Fails before any generation can happen when the credential is
/// missing or the Hub refuses it.
pub async fn pipeline(
  task: Task
, model: &str
, device_map: DeviceMap
, model_kwargs: ModelKwargs
, endpoints: &EndpointConfig
) -> Result<TextGenerationPipeline, crate::error::Error>
{   info!("Loading {} pipeline for {}", task, model);
    debug!("device_map={:?} model_kwargs={:?}", device_map, model_kwargs);

    let api_key = model_kwargs.token
      .filter(|t| !t.trim().is_empty())
      .ok_or_else(|| {
        error!("No credential for {}", model);
        crate::error::Error::MissingApiKey(
          crate::config::API_KEY_VAR.to_string()
        )
      })?;

    let client = HuggingFaceClient::new(Endpoints
    {   inference_url: endpoints.inference_url.clone()
      , hub_url: endpoints.hub_url.clone()
      , api_key
      , timeout: endpoints.timeout_secs.map(Duration::from_secs)
    })?;

    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
    client.load_tokenizer_config(model.to_string(), reply_tx)?;
    let loaded = match reply_rx.recv().await
    {   Some(result) => result
      , None => Err(crate::error::Error::Other(
          "Hugging Face client dropped the reply".to_string()
        ))
    };

    let tokenizer = match loaded
      .and_then(|raw| Tokenizer::from_config_json(&raw))
    {   Ok(tokenizer) => tokenizer
      , Err(e) => {
          let _ = client.shutdown();
          return Err(e);
        }
    };

    info!("Pipeline ready for {}", model);
    Ok(TextGenerationPipeline
    {   model: model.to_string()
      , device_map
      , torch_dtype: model_kwargs.torch_dtype
      , tokenizer
      , client
    })
}

impl TextGenerationPipeline
{   pub fn model(&self) -> &str
    {   &self.model
    }

    pub fn device_map(&self) -> &DeviceMap
    {   &self.device_map
    }

    pub fn torch_dtype(&self) -> TorchDtype
    {   self.torch_dtype
    }

    /// Stop the background client
    pub fn shutdown(self) -> Result<(), crate::error::Error>
    {   self.client.shutdown()
    }

    fn stop_sequences(&self, ids: &[u32])
      -> Result<Vec<String>, crate::error::Error>
    {   let mut stop: Vec<String> = Vec::with_capacity(ids.len());
        for id in ids
        {   let token = self.tokenizer.convert_ids_to_tokens(*id)?;
            if !stop.iter().any(|s| s == token)
            {   stop.push(token.to_string());
            }
        }
        Ok(stop)
    }
}

#[async_trait]
impl TextGenerator for TextGenerationPipeline
{   fn tokenizer(&self) -> &Tokenizer
    {   &self.tokenizer
    }

    async fn generate(
      &self
    , messages: Vec<ChatMessage>
    , params: GenerationParams
    ) -> Result<Vec<GenerationOutput>, crate::error::Error>
    {   debug!(
          "Generating with {} turns, max_new_tokens={}",
          messages.len(), params.max_new_tokens
        );

        let request = ChatCompletionRequest
        {   model: self.device_map.route(&self.model)
          , messages
          , max_tokens: Some(params.max_new_tokens)
          , temperature: Some(params.temperature)
          , stop: Some(self.stop_sequences(&params.eos_token_id)?)
          , stream: Some(false)
        };

        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
        self.client.generate(request, reply_tx)?;
        match reply_rx.recv().await
        {   Some(result) => result
          , None => {
              error!("Hugging Face client dropped the reply");
              Err(crate::error::Error::Other(
                "Hugging Face client dropped the reply".to_string()
              ))
            }
        }
    }
}
