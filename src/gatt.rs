//! GATT Wrapper Objects
//!
//! Thin value types over the bus objects the stack publishes for discovered
//! services and characteristics, plus the fixed battery sub-interface of the
//! device object itself. Wrappers are constructed fresh per query and never
//! cached by the device handle; they carry identity only (value read/write
//! lives elsewhere).

use std::sync::Arc;

use uuid::Uuid;

use crate::bus::BusObject;
use crate::error::LinkError;

/// Bus interface implemented by discovered GATT service objects.
pub const SERVICE_INTERFACE: &str = "org.bluez.GattService1";
/// Bus interface implemented by discovered GATT characteristic objects.
pub const CHARACTERISTIC_INTERFACE: &str = "org.bluez.GattCharacteristic1";
/// Fixed battery sub-interface of the device object itself.
pub const BATTERY_INTERFACE: &str = "org.bluez.Battery1";

/// A discovered GATT service.
pub struct GattService {
    object: Arc<dyn BusObject>,
}

impl GattService {
    pub fn new(object: Arc<dyn BusObject>) -> Self {
        Self { object }
    }

    pub fn path(&self) -> &str {
        self.object.path()
    }

    /// UUID naming this service.
    pub async fn uuid(&self) -> Result<Uuid, LinkError> {
        read_uuid(self.object.as_ref(), SERVICE_INTERFACE).await
    }
}

/// A discovered GATT characteristic.
pub struct GattCharacteristic {
    object: Arc<dyn BusObject>,
}

impl GattCharacteristic {
    pub fn new(object: Arc<dyn BusObject>) -> Self {
        Self { object }
    }

    pub fn path(&self) -> &str {
        self.object.path()
    }

    /// UUID naming this characteristic.
    pub async fn uuid(&self) -> Result<Uuid, LinkError> {
        read_uuid(self.object.as_ref(), CHARACTERISTIC_INTERFACE).await
    }
}

/// Battery level access over the device's own bus object.
pub struct GattBatteryService {
    object: Arc<dyn BusObject>,
}

impl GattBatteryService {
    pub fn new(object: Arc<dyn BusObject>) -> Self {
        Self { object }
    }

    pub fn path(&self) -> &str {
        self.object.path()
    }

    /// Remaining charge in percent.
    pub async fn percentage(&self) -> Result<u8, LinkError> {
        let value = self
            .object
            .get_property(BATTERY_INTERFACE, "Percentage")
            .await?;
        Ok(value.as_u8()?)
    }
}

async fn read_uuid(object: &dyn BusObject, interface: &str) -> Result<Uuid, LinkError> {
    let value = object.get_property(interface, "UUID").await?;
    parse_uuid(value.as_str()?)
}

/// Parse a UUID string handed back by the bus.
pub(crate) fn parse_uuid(raw: &str) -> Result<Uuid, LinkError> {
    Uuid::parse_str(raw).map_err(|source| LinkError::InvalidUuid {
        value: raw.to_string(),
        source,
    })
}
