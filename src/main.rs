use log::{debug, error};
use tactical_ai::config::{load_dotenv, HuggingFaceConfig};
use tactical_ai::{pipeline, tactical, DeviceMap, ModelKwargs, Task, TorchDtype};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), tactical_ai::Error>
{   env_logger::init();

    // .env stays out of git
    load_dotenv();
    let config = HuggingFaceConfig::from_env()?;

    let llama_tactical = pipeline(
      Task::TextGeneration
    , &config.model_id
    , DeviceMap::Auto
    , ModelKwargs
      {   torch_dtype: TorchDtype::BFloat16
        , token: config.api_key.clone()
      }
    , &config.endpoints
    ).await?;

    let stdout = std::io::stdout();
    let result = tactical::run(&llama_tactical, &mut stdout.lock()).await;
    if let Err(e) = &result
    {   error!("Tactical request failed: {}", e);
    }

    if let Err(e) = llama_tactical.shutdown()
    {   debug!("Client already gone: {}", e);
    }
    result
}
