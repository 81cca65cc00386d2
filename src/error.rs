use std::fmt;

/// Error type for every step of a tactical-ai run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error
{   /// No credential was found in the environment
    MissingApiKey(String)
  , /// The Hub or inference endpoint rejected the credential
    Unauthorized(String)
  , /// Model repository does not exist or is not visible
    ModelNotFound(String)
  , /// Pipeline task not supported by this client
    UnsupportedTask(String)
  , /// HTTP transport error
    HttpError(String)
  , /// API returned an error response
    ApiError(String)
  , /// Failed to parse API response
    ParseError(String)
  , /// Generated output had no turn to read
    NoGeneratedText
  , /// Token or id absent from the tokenizer vocabulary
    UnknownToken(String)
  , /// Invalid configuration
    InvalidConfiguration(String)
  , /// Timeout error
    Timeout
  , /// Writing the response failed
    Io(String)
  , /// Generic error
    Other(String)
}

impl fmt::Display for Error
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   match self
        {   Error::MissingApiKey(var) => {
              write!(f, "Missing API key: {} is not set", var)
            }
          , Error::Unauthorized(msg) => {
              write!(f, "Unauthorized: {}", msg)
            }
          , Error::ModelNotFound(model) => {
              write!(f, "Model not found: {}", model)
            }
          , Error::UnsupportedTask(task) => {
              write!(f, "Unsupported pipeline task: {}", task)
            }
          , Error::HttpError(msg) => {
              write!(f, "HTTP error: {}", msg)
            }
          , Error::ApiError(msg) => {
              write!(f, "API error: {}", msg)
            }
          , Error::ParseError(msg) => {
              write!(f, "Parse error: {}", msg)
            }
          , Error::NoGeneratedText => {
              write!(f, "Generated output contained no turns")
            }
          , Error::UnknownToken(token) => {
              write!(f, "Token not in vocabulary: {}", token)
            }
          , Error::InvalidConfiguration(msg) => {
              write!(f, "Invalid configuration: {}", msg)
            }
          , Error::Timeout => {
              write!(f, "Request timed out")
            }
          , Error::Io(msg) => {
              write!(f, "I/O error: {}", msg)
            }
          , Error::Other(msg) => {
              write!(f, "Error: {}", msg)
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<String> for Error
{   fn from(s: String) -> Self
    {   Error::Other(s)
    }
}

impl From<&str> for Error
{   fn from(s: &str) -> Self
    {   Error::Other(s.to_string())
    }
}

/// Classify a reqwest failure
pub(crate) fn error_from_reqwest(e: reqwest::Error) -> Error
{   if e.is_timeout()
    {   Error::Timeout
    } else
    {   Error::HttpError(e.to_string())
    }
}
