use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown machine: {0}")]
    UnknownMachine(String),

    #[error("Unknown transition: {0}")]
    UnknownTransition(String),

    #[error("Invalid transition '{transition}' from state '{current_state}'")]
    InvalidTransition {
        machine_id: String,
        transition: String,
        current_state: String,
        available_transitions: Vec<String>,
    },

    #[error("Cluster error: {0}")]
    Cluster(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
