use std::error::Error;
use std::fmt;

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    UnknownPreset(String),
    InvalidConfig(String),
    MissingField(&'static str),
    NoEnabledProviders,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::UnknownPreset(name) => write!(f, "unknown provider preset: {name}"),
            ProviderError::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            ProviderError::MissingField(field) => write!(f, "missing provider field: {field}"),
            ProviderError::NoEnabledProviders => write!(
                f,
                "no enabled providers: configure GLM_API_KEY, MODELSCOPE_API_KEY, KIMI_API_KEY or FALLBACK_PROVIDERS"
            ),
        }
    }
}

impl Error for ProviderError {}
