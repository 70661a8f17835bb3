use std::fmt;

/// Programming errors raised by the data-set model
///
/// Range and race anomalies are never reported through this type; they are
/// clamped or dropped where they occur.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSetError {
    /// The caller asked for something structurally impossible
    InvalidOperation(String),
    /// No data set has been loaded yet
    NotLoaded,
}

impl DataSetError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }
}

impl fmt::Display for DataSetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSetError::InvalidOperation(message) => write!(f, "Invalid operation: {}", message),
            DataSetError::NotLoaded => write!(f, "No data set is loaded"),
        }
    }
}

impl std::error::Error for DataSetError {}
