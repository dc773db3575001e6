use thiserror::Error;

/// Unified application error type to simplify bubbling errors through async flows.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Errored while handling a file. {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not parse owner and repo from url: {0}")]
    UrlParse(String),
    #[error("{0}")]
    MissingToken(String),
    #[error("Error from git. {0}")]
    Git(#[from] git2::Error),
    #[error("Error reaching the hosting API. {0}")]
    Http(#[from] reqwest::Error),
    #[error("{provider} API returned {status}: {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },
    #[error("could not find a common ancestor for the compared branches")]
    NoMergeBase,
    #[error("Error serializing json. {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unable to parse string. {0}")]
    Utf8Parse(#[from] std::string::FromUtf8Error),
    #[error("Command '{command}' failed: {detail}")]
    Command { command: String, detail: String },
    #[error("error running producer '{name}': {source}")]
    Producer {
        name: String,
        #[source]
        source: Box<AppError>,
    },
    #[error("Error formatting a timestamp. {0}")]
    TimeFormat(#[from] time::error::Format),
    #[error("Invalid authorization header. {0}")]
    AuthHeader(#[from] reqwest::header::InvalidHeaderValue),
    #[error("{0}")]
    Summarizer(String),
    #[error("{0}")]
    Config(String),
}

/// Convenience alias for results that bubble `AppError`.
pub type AppResult<T> = Result<T, AppError>;
