use crate::probe::DebugProbeError;

/// The overarching error type which contains all possible errors as variants.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An error with the usage of the probe occurred.
    #[error("An error with the usage of the probe occurred")]
    Probe(#[from] DebugProbeError),
    /// The register name does not name a Cortex-M core register.
    #[error("Unknown core register '{0}'")]
    UnknownRegister(String),
    /// The core did not reach the expected state in time.
    #[error("Timeout while waiting for the core to {0}")]
    Timeout(&'static str),
}

impl Error {
    /// Returns `true` if the error was caused by a fault on the USB transport.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Probe(e) if e.is_transport())
    }
}
