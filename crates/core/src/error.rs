use thiserror::Error;

#[derive(Error, Debug)]
pub enum NousError {
    #[error("config error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("thread pool error: {0}")]
    ThreadPool(String),

    #[error("scheduler has been shut down")]
    Stopped,
}
