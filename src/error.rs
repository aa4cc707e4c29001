use std::{error, fmt, io};

// -------------------------------------------------------------------------------------------------

/// Provides an enumeration of all possible errors reported by aetheryte.
#[derive(Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// A required sound asset is missing or could not be decoded.
    AssetLoadError { name: String, reason: String },
    /// The signal graph could not be wired, e.g. because of an unsupported output format.
    GraphConstructionError(String),
    /// The audio hardware or session could not be activated.
    EngineStartError(Box<dyn error::Error + Send + Sync>),
    OutputDeviceError(Box<dyn error::Error + Send + Sync>),
    AudioDecodingError(Box<dyn error::Error + Send + Sync>),
    ParameterError(String),
    SendError(String),
    IoError(io::Error),
}

impl Error {
    pub(crate) fn asset_load_error<S: Into<String>, R: fmt::Display>(name: S, reason: R) -> Self {
        Self::AssetLoadError {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AssetLoadError { name, reason } => {
                write!(f, "Failed to load sound asset '{name}': {reason}")
            }
            Self::GraphConstructionError(str) => {
                write!(f, "Failed to construct audio graph: {str}")
            }
            Self::EngineStartError(err) => write!(f, "Failed to start audio engine: {err}"),
            Self::OutputDeviceError(err) | Self::AudioDecodingError(err) => err.fmt(f),
            Self::ParameterError(str) => write!(f, "Invalid parameter: {str}"),
            Self::SendError(str) => write!(f, "Failed to send channel message: {str}"),
            Self::IoError(err) => err.fmt(f),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

impl<T> From<crossbeam_channel::SendError<T>> for Error {
    fn from(err: crossbeam_channel::SendError<T>) -> Self {
        Error::SendError(err.to_string())
    }
}

impl<T> From<crossbeam_channel::TrySendError<T>> for Error {
    fn from(err: crossbeam_channel::TrySendError<T>) -> Self {
        Error::SendError(err.to_string())
    }
}

// -------------------------------------------------------------------------------------------------
