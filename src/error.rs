//! Failure taxonomy surfaced by device operations.

use std::time::Duration;

use thiserror::Error;

use crate::bus::BusError;

/// Failures surfaced by [`Device`](crate::Device) operations.
///
/// Timeouts and repeated essential-read failures propagate; expected
/// transient conditions (optional properties being absent, RSSI dropping
/// out) are absorbed by the accessor that hits them.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The peripheral did not report `Connected` within the wait bound. The
    /// connect request may still complete later; connection state is
    /// unknown to the caller.
    #[error("timed out after {timeout:?} waiting for the device to connect")]
    ConnectTimeout { timeout: Duration },

    /// The peripheral did not report disconnection within the wait bound.
    #[error("timed out after {timeout:?} waiting for the device to disconnect")]
    DisconnectTimeout { timeout: Duration },

    /// The bus failed to answer an essential request.
    #[error(transparent)]
    Bus(#[from] BusError),

    /// The bus handed back a UUID string this layer cannot parse.
    #[error("malformed UUID {value:?} from bus")]
    InvalidUuid {
        value: String,
        #[source]
        source: uuid::Error,
    },
}
