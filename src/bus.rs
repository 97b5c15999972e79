//! Bus Transport Abstraction
//!
//! The Bluetooth stack is reached through an object/property/signal bus.
//! This module defines the narrow slice of that bus the link layer depends
//! on: typed property reads, fire-and-forget control requests, object
//! enumeration, and a property-change subscription. Concrete transports
//! implement these traits; the rest of the crate never sees anything else.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Bus interface implemented by remote device objects.
pub const DEVICE_INTERFACE: &str = "org.bluez.Device1";

/// A value read from a bus object property.
///
/// The set of shapes is closed: it covers exactly the properties this layer
/// reads. Downcast helpers return [`BusError::TypeMismatch`] when the bus
/// hands back a different shape than the property is documented to have.
#[derive(Debug, Clone, PartialEq)]
pub enum BusValue {
    Bool(bool),
    I16(i16),
    U8(u8),
    Str(String),
    StrSeq(Vec<String>),
    /// Stringified service UUID mapped to raw advertisement bytes.
    DataMap(HashMap<String, Vec<u8>>),
}

impl BusValue {
    fn kind(&self) -> &'static str {
        match self {
            BusValue::Bool(_) => "bool",
            BusValue::I16(_) => "i16",
            BusValue::U8(_) => "u8",
            BusValue::Str(_) => "string",
            BusValue::StrSeq(_) => "string sequence",
            BusValue::DataMap(_) => "data map",
        }
    }

    pub fn as_bool(&self) -> Result<bool, BusError> {
        match self {
            BusValue::Bool(v) => Ok(*v),
            other => Err(BusError::type_mismatch("bool", other)),
        }
    }

    pub fn as_i16(&self) -> Result<i16, BusError> {
        match self {
            BusValue::I16(v) => Ok(*v),
            other => Err(BusError::type_mismatch("i16", other)),
        }
    }

    pub fn as_u8(&self) -> Result<u8, BusError> {
        match self {
            BusValue::U8(v) => Ok(*v),
            other => Err(BusError::type_mismatch("u8", other)),
        }
    }

    pub fn as_str(&self) -> Result<&str, BusError> {
        match self {
            BusValue::Str(v) => Ok(v),
            other => Err(BusError::type_mismatch("string", other)),
        }
    }

    pub fn into_str_seq(self) -> Result<Vec<String>, BusError> {
        match self {
            BusValue::StrSeq(v) => Ok(v),
            other => Err(BusError::type_mismatch("string sequence", &other)),
        }
    }

    pub fn into_data_map(self) -> Result<HashMap<String, Vec<u8>>, BusError> {
        match self {
            BusValue::DataMap(v) => Ok(v),
            other => Err(BusError::type_mismatch("data map", &other)),
        }
    }
}

/// Failure answering a bus request.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum BusError {
    /// The object exists but has no such property. Optional properties
    /// (advertised UUIDs, service data) legitimately fail this way.
    #[error("no property {property:?} on {interface}")]
    UnknownProperty { interface: String, property: String },

    /// The remote end refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The request never got an answer.
    #[error("bus transport failure: {0}")]
    Transport(String),

    /// A property value did not have the shape this layer expects.
    #[error("expected {expected} property value, got {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

impl BusError {
    fn type_mismatch(expected: &'static str, found: &BusValue) -> Self {
        BusError::TypeMismatch {
            expected,
            found: found.kind(),
        }
    }

    /// True when the failure means the property does not exist, as opposed
    /// to the bus failing to answer the query.
    pub fn is_unknown_property(&self) -> bool {
        matches!(self, BusError::UnknownProperty { .. })
    }
}

/// One property-change notification as delivered by the bus.
#[derive(Debug, Clone)]
pub struct PropertyChange {
    /// Interface the change belongs to.
    pub interface: String,
    /// Property name mapped to its new value.
    pub changed: HashMap<String, BusValue>,
    /// Properties whose value became unavailable.
    pub invalidated: Vec<String>,
}

/// Callback invoked for every property-change notification.
///
/// The transport calls this on its own dispatch context, concurrently with
/// any caller of the public API. Implementations must not block.
pub type PropertyChangeHandler = Arc<dyn Fn(&PropertyChange) + Send + Sync>;

/// Registration handle for an active property-change subscription.
///
/// Not cloneable: the token is consumed exactly once by
/// [`DeviceObject::unsubscribe_properties`].
#[derive(Debug, PartialEq, Eq)]
pub struct SubscriptionToken(u64);

impl SubscriptionToken {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// An addressable remote entity on the bus.
#[async_trait]
pub trait BusObject: Send + Sync {
    /// Object path of this entity.
    fn path(&self) -> &str;

    /// Read one property of one interface.
    async fn get_property(&self, interface: &str, property: &str) -> Result<BusValue, BusError>;
}

/// The device-control view of a remote peripheral object.
#[async_trait]
pub trait DeviceObject: BusObject {
    /// Ask the stack to connect. Returns once the transport acknowledges
    /// the request; the actual transition arrives as a later `Connected`
    /// property change.
    async fn request_connect(&self) -> Result<(), BusError>;

    /// Ask the stack to disconnect. Same fire-and-forget contract as
    /// [`request_connect`](DeviceObject::request_connect).
    async fn request_disconnect(&self) -> Result<(), BusError>;

    /// Register a handler for property-change notifications on this object.
    fn subscribe_properties(
        &self,
        handler: PropertyChangeHandler,
    ) -> Result<SubscriptionToken, BusError>;

    /// Drop a registration made by
    /// [`subscribe_properties`](DeviceObject::subscribe_properties).
    fn unsubscribe_properties(&self, token: SubscriptionToken);
}

/// Enumerates bus objects implementing an interface below a path prefix.
#[async_trait]
pub trait BusProvider: Send + Sync {
    async fn find_objects(
        &self,
        interface: &str,
        path_prefix: &str,
    ) -> Result<Vec<Arc<dyn BusObject>>, BusError>;
}
