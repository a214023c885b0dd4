use std::io;

/// Errors produced by the APRS-IS side of remoteweather.
///
/// "no data" is deliberately absent: the calculators in [`crate::calc`] answer
/// zero when there is nothing to sum.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// missing or invalid configuration, fatal when constructing a backend
    #[error("configuration error: {0}")]
    Configuration(String),
    /// dial / read / write failure or timeout. aborts the current attempt only
    #[error("connection error ({context}): {source}")]
    Connection {
        context: &'static str,
        #[source]
        source: io::Error,
    },
    /// the server answered with something that does not fit the handshake
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("cannot encode telemetry value {0} (maximum is 8280)")]
    EncodingRange(u16),
}

impl Error {
    pub(crate) fn connection(context: &'static str, source: io::Error) -> Self {
        Self::Connection { context, source }
    }

    pub(crate) fn timed_out(context: &'static str) -> Self {
        Self::Connection {
            context,
            source: io::Error::new(io::ErrorKind::TimedOut, "deadline elapsed"),
        }
    }
}
