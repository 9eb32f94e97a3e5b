//! Error types for PC/SC transport

use nfc_access_apdu_core::TransportError;

/// PC/SC-specific errors
#[derive(Debug, thiserror::Error)]
pub enum PcscError {
    /// PC/SC error
    #[error("PC/SC error: {0}")]
    Pcsc(#[from] pcsc::Error),

    /// No readers available
    #[error("No readers available")]
    NoReadersAvailable,

    /// Reader not found
    #[error("Reader not found: {0}")]
    ReaderNotFound(String),

    /// Reader name cannot be passed to PC/SC
    #[error("Invalid reader name: {0}")]
    InvalidReaderName(String),

    /// No card present in reader
    #[error("No card present in reader: {0}")]
    NoCard(String),
}

impl From<PcscError> for TransportError {
    fn from(error: PcscError) -> Self {
        let message = error.to_string();
        match error {
            PcscError::Pcsc(pcsc::Error::Timeout) => Self::Timeout,
            PcscError::Pcsc(pcsc::Error::ReaderUnavailable | pcsc::Error::UnknownReader)
            | PcscError::NoReadersAvailable
            | PcscError::ReaderNotFound(_) => Self::ReaderUnavailable(message),
            PcscError::Pcsc(pcsc::Error::NoSmartcard | pcsc::Error::RemovedCard) => {
                Self::NoCard(message)
            }
            PcscError::NoCard(reader) => Self::NoCard(reader),
            _ => Self::Other(message),
        }
    }
}
