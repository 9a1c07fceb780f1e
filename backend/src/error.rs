use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommodityError {
    #[error("Price generation failed: {0}")]
    Generation(String),

    #[error("Fallback generation failed: {0}")]
    Fallback(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CommodityError>;
