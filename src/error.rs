use std::fmt;

/// Custom error type for comparison operations
/// Implements Clone for sending through channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error
{   /// Transport-level failure (connection refused, DNS, TLS...)
    HttpError(String)
  , /// Server answered with a non-success status
    ServerError
    {   status: u16
      , /// `message` field of the error body, when the server sent one
        message: Option<String>
    }
  , /// Failed to parse a server payload
    ParseError(String)
  , /// Prompt was empty or whitespace only
    EmptyPrompt
  , /// Invalid configuration
    InvalidConfiguration(String)
  , /// Timeout error
    Timeout
  , /// Generic error
    Other(String)
}

impl Error
{   /// Most specific description of a failed round trip:
    /// server-supplied message, else the transport message,
    /// else `generic`.
    pub fn failure_description(&self, generic: &str) -> String
    {   let specific = match self
        {   Error::ServerError { message: Some(msg), .. }
              if !msg.trim().is_empty() => msg.clone()
          , Error::ServerError { status, .. } => {
              format!("Request failed with status code {}", status)
            }
          , Error::HttpError(msg)
          | Error::ParseError(msg)
          | Error::Other(msg) => msg.clone()
          , other => other.to_string()
        };

        if specific.trim().is_empty()
        {   generic.to_string()
        } else
        {   specific
        }
    }
}

impl fmt::Display for Error
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   match self
        {   Error::HttpError(msg) => {
              write!(f, "HTTP error: {}", msg)
            }
          , Error::ServerError { status, message: Some(msg) } => {
              write!(f, "Server error ({}): {}", status, msg)
            }
          , Error::ServerError { status, message: None } => {
              write!(f, "Server error ({})", status)
            }
          , Error::ParseError(msg) => {
              write!(f, "Parse error: {}", msg)
            }
          , Error::EmptyPrompt => {
              write!(f, "Prompt must not be empty")
            }
          , Error::InvalidConfiguration(msg) => {
              write!(f, "Invalid configuration: {}", msg)
            }
          , Error::Timeout => {
              write!(f, "Request timed out")
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

impl From<reqwest::Error> for Error
{   fn from(e: reqwest::Error) -> Self
    {   if e.is_timeout()
        {   Error::Timeout
        } else if e.is_decode()
        {   Error::ParseError(e.to_string())
        } else
        {   Error::HttpError(e.to_string())
        }
    }
}
