//! Connection and property-synchronization layer for a single BLE peripheral.
//!
//! The operating-system Bluetooth stack lives behind an object/property/signal
//! bus. Connect and disconnect are asynchronous at that level: the bus call
//! returns as soon as the transport acknowledges the request, and the real
//! state transition arrives later as a property-change notification on the
//! transport's own dispatch context. Device metadata (advertised UUIDs,
//! discovered services and characteristics) fills in incrementally while
//! background discovery runs, and the bus itself may transiently fail to
//! answer property queries.
//!
//! [`Device`] wraps one remote peripheral object and turns all of that into
//! awaitable calls with explicit timeouts.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                   Device                     │
//! │  connect / disconnect / discover / accessors │
//! └────────┬─────────────────────┬───────────────┘
//!          │                     │
//!          ▼                     ▼
//! ┌─────────────────┐   ┌──────────────────┐
//! │   DeviceObject  │   │   BusProvider    │
//! │                 │   │                  │
//! │ - control calls │   │ - service/char   │
//! │ - property Get  │   │   enumeration    │
//! │ - change signal │   │                  │
//! └─────────────────┘   └──────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`bus`] - the bus-transport abstraction: value/error types, object and
//!   provider traits, property-change subscription
//! - [`config`] - timing configuration owned by each device handle
//! - [`device`] - the device handle itself
//! - [`gatt`] - service/characteristic/battery wrapper objects
//! - [`error`] - the failure taxonomy surfaced to callers

pub mod bus;
pub mod config;
pub mod device;
pub mod error;
pub mod gatt;
mod latch;

pub use config::LinkConfig;
pub use device::Device;
pub use error::LinkError;
