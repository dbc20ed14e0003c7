use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostcycleError {
    #[error("config not found: create hostcycle.yaml or pass --config")]
    ConfigNotFound,

    #[error("host not found in inventory: {0}")]
    HostNotFound(String),

    #[error("secret for host '{host}' not set: export {var}")]
    MissingSecret { host: String, var: String },

    #[error("{probe} probe is misconfigured: {message}")]
    ProbeMisconfigured { probe: String, message: String },

    #[error("remote command failed on {host}: {message}")]
    Remote { host: String, message: String },

    #[error("home directory not found: set HOME environment variable")]
    HomeNotFound,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, HostcycleError>;
