use std::path::PathBuf;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The catalog could not be read or decoded. Fatal for that file only.
    #[error("failed to load catalog {}: {reason}", path.display())]
    CatalogLoad { path: PathBuf, reason: String },

    /// The catalog or its compiled artifact could not be written.
    #[error("failed to write {}: {reason}", path.display())]
    CatalogWrite { path: PathBuf, reason: String },

    /// Every attempt against the remote service failed. Fatal for one batch.
    #[error("service call failed after {attempts} attempt(s): {message}")]
    ServiceCall { attempts: usize, message: String },

    /// No JSON object or array could be recovered from the model output.
    #[error("malformed response: {snippet}")]
    MalformedResponse { snippet: String },

    #[error("config: {0}")]
    Config(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("toml: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn catalog_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::CatalogLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn catalog_write(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::CatalogWrite {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
