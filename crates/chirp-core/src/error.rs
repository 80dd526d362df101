use thiserror::Error;

pub type ChirpResult<T> = anyhow::Result<T>;

#[derive(Error, Debug)]
pub enum ChirpError {
    /// An empty body was provided for the post.
    #[error("Post cannot be empty")]
    EmptyPost,
    /// The post body exceeds the maximum length.
    #[error("Max allowed size of post: {max_size}, current size: {curr_size}")]
    InvalidPostLength {
        max_size: usize,
        curr_size: usize,
    },
    /// The requested/specified ID does not exist in the entity table.
    #[error("Post does not exist with the given ID")]
    UnknownPost {},
    /// A config file could not be read or written.
    #[error("Config error: {msg}")]
    ConfigError { msg: String },
    /// Custom Error type for errors not covered by the above errors.
    #[error("{msg}")]
    CustomError {
        msg: String,
    },
}

impl ChirpError {
    pub fn custom_error(msg: String) -> Self {
        Self::CustomError { msg }
    }

    pub fn config_error(msg: String) -> Self {
        Self::ConfigError { msg }
    }
}
