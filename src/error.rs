use derive_more::{Display, From};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, From)]
pub enum Error {
    #[display("invalid input: {_0}")]
    #[from(skip)]
    InvalidInput(String),

    #[display("{service} unavailable: {message}")]
    #[from(skip)]
    UpstreamUnavailable {
        service: &'static str,
        message: String,
    },

    #[display("config error: {_0}")]
    #[from(skip)]
    Config(String),

    #[display("{_0}")]
    #[from(skip)]
    Custom(String),

    #[display("io error: {_0}")]
    Io(std::io::Error),

    #[display("database error: {_0}")]
    Database(sqlx::Error),

    #[display("http error: {_0}")]
    Http(reqwest::Error),

    #[display("json error: {_0}")]
    Json(serde_json::Error),

    #[display("toml error: {_0}")]
    Toml(toml::de::Error),

    #[display("openai error: {_0}")]
    OpenAI(async_openai::error::OpenAIError),
}

impl Error {
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn upstream(service: &'static str, message: impl ToString) -> Self {
        Self::UpstreamUnavailable {
            service,
            message: message.to_string(),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Database(e) => Some(e),
            Error::Http(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Toml(e) => Some(e),
            Error::OpenAI(e) => Some(e),
            _ => None,
        }
    }
}
