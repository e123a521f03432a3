use thiserror::Error;

/// # Port Error
///
/// Recoverable failures of the port lifecycle. The `Display` text of each
/// variant is exactly what the console log shows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    /// Another port (or the same one) is already open.
    #[error("cannot open {requested}: {open} is already open")]
    PortBusy {
        /// Port the caller asked for.
        requested: String,
        /// Port currently holding the session.
        open: String,
    },

    /// The port is not enumerated or the operating system refused it.
    #[error("cannot open {port_id}: {reason}")]
    PortUnavailable {
        /// Port the caller asked for.
        port_id: String,
        /// Why it could not be opened.
        reason: String,
    },

    /// The open port stopped delivering bytes.
    #[error("{port_id} disconnected: {reason}")]
    PortDisconnected {
        /// Port that went away.
        port_id: String,
        /// Read error or end-of-stream description.
        reason: String,
    },
}
