/// Errors raised while defining, flattening or saving modules and stores.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("name must not be empty")]
    EmptyName,

    #[error("{name} has version {version}; versions start at 1")]
    InvalidVersion { name: String, version: u32 },

    #[error("module {module} defines `{name}` more than once")]
    NameCollision { module: String, name: String },

    #[error("module {module} has no mutation named `{name}`")]
    UnknownMutation { module: String, name: String },

    #[error("backend error: {0}")]
    Backend(#[from] modstore_core_store::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
