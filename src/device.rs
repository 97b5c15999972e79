//! Device Handle
//!
//! Wraps one remote peripheral's bus object and drives its connection state
//! machine. The bus answers connect/disconnect requests with a bare
//! transport acknowledgment; the real transition arrives later as a
//! `Connected` property change on the transport's dispatch context. The
//! handle latches those transitions so callers can await them with explicit
//! timeouts. Metadata trickles in while background discovery runs, so
//! property reads are hardened per property: essential reads retry,
//! optional reads degrade to absent values.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::bus::{
    BusObject, BusProvider, BusValue, DeviceObject, PropertyChange, PropertyChangeHandler,
    SubscriptionToken, DEVICE_INTERFACE,
};
use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::gatt::{
    self, GattBatteryService, GattCharacteristic, GattService, CHARACTERISTIC_INTERFACE,
    SERVICE_INTERFACE,
};
use crate::latch::Latch;

/// Handle to one remote BLE peripheral.
///
/// Public operations may sleep the calling task (on waits, retries and poll
/// intervals) but never block the notification-delivery context: the change
/// handler registered at construction only flips latches.
pub struct Device {
    object: Arc<dyn DeviceObject>,
    provider: Arc<dyn BusProvider>,
    config: LinkConfig,
    connected: Arc<Latch>,
    disconnected: Arc<Latch>,
    rssi_cache: Mutex<Option<i16>>,
    subscription: Mutex<Option<SubscriptionToken>>,
}

impl Device {
    /// Wrap a peripheral object and register for its property changes.
    ///
    /// The subscription stays active until [`Device::close`]; dropping the
    /// handle without closing leaks the registration.
    pub fn new(
        object: Arc<dyn DeviceObject>,
        provider: Arc<dyn BusProvider>,
        config: LinkConfig,
    ) -> Result<Self, LinkError> {
        let connected = Arc::new(Latch::new());
        let disconnected = Arc::new(Latch::new());

        let handler: PropertyChangeHandler = {
            let connected = Arc::clone(&connected);
            let disconnected = Arc::clone(&disconnected);
            Arc::new(move |change: &PropertyChange| {
                // Runs on the bus dispatch context; latch sets never block.
                if change.interface != DEVICE_INTERFACE {
                    return;
                }
                match change.changed.get("Connected") {
                    Some(BusValue::Bool(true)) => {
                        debug!("Device reported connected");
                        connected.set();
                    }
                    Some(BusValue::Bool(false)) => {
                        debug!("Device reported disconnected");
                        disconnected.set();
                    }
                    _ => {}
                }
            })
        };
        let subscription = object.subscribe_properties(handler)?;

        Ok(Self {
            object,
            provider,
            config,
            connected,
            disconnected,
            rssi_cache: Mutex::new(None),
            subscription: Mutex::new(Some(subscription)),
        })
    }

    /// Object path of the wrapped peripheral.
    pub fn path(&self) -> &str {
        self.object.path()
    }

    /// Connect to the peripheral.
    ///
    /// Clears the connected latch, fires the asynchronous connect request
    /// and awaits the `Connected=true` notification. The clear happens
    /// before the request goes out so a stale notification from a previous
    /// cycle cannot satisfy this wait. On timeout the request may still
    /// complete later; connection state is unknown to the caller.
    pub async fn connect(&self, timeout: Option<Duration>) -> Result<(), LinkError> {
        let timeout = timeout.unwrap_or(self.config.operation_timeout);
        self.connected.clear();
        info!("Connecting to device {}", self.object.path());
        self.object.request_connect().await?;
        if !self.connected.wait_for(timeout).await {
            return Err(LinkError::ConnectTimeout { timeout });
        }
        info!("Connected to device {}", self.object.path());
        Ok(())
    }

    /// Disconnect from the peripheral.
    ///
    /// A disconnect request the bus rejects outright is logged and
    /// swallowed: the device is already gone or unreachable, and there is
    /// nothing left to wait for.
    pub async fn disconnect(&self, timeout: Option<Duration>) -> Result<(), LinkError> {
        let timeout = timeout.unwrap_or(self.config.operation_timeout);
        self.disconnected.clear();
        info!("Disconnecting from device {}", self.object.path());
        if let Err(e) = self.object.request_disconnect().await {
            error!("Disconnect request failed: {}", e);
            return Ok(());
        }
        if !self.disconnected.wait_for(timeout).await {
            return Err(LinkError::DisconnectTimeout { timeout });
        }
        debug!("Disconnected from device {}", self.object.path());
        Ok(())
    }

    /// Wait for background discovery to surface at least the given service
    /// and characteristic UUIDs.
    ///
    /// Both sets are re-queried fresh on every poll iteration; discovery
    /// progress has no notification to subscribe to, only connection state
    /// does. Returns `Ok(false)` once the timeout elapses unsatisfied; an
    /// incomplete discovery is an expected outcome, not an error.
    pub async fn discover(
        &self,
        service_uuids: &[Uuid],
        characteristic_uuids: &[Uuid],
        timeout: Option<Duration>,
    ) -> Result<bool, LinkError> {
        let timeout = timeout.unwrap_or(self.config.operation_timeout);
        let expected_services: HashSet<Uuid> = service_uuids.iter().copied().collect();
        let expected_characteristics: HashSet<Uuid> =
            characteristic_uuids.iter().copied().collect();

        let start = Instant::now();
        loop {
            let advertised: HashSet<Uuid> = self.advertised().await?.into_iter().collect();

            let mut discovered = HashSet::new();
            for characteristic in self.characteristics().await? {
                discovered.insert(characteristic.uuid().await?);
            }

            if expected_services.is_subset(&advertised)
                && expected_characteristics.is_subset(&discovered)
            {
                return Ok(true);
            }
            if start.elapsed() >= timeout {
                debug!(
                    "Discovery on {} timed out after {:?}",
                    self.object.path(),
                    timeout
                );
                return Ok(false);
            }
            sleep(self.config.poll_interval).await;
        }
    }

    /// Stable identifier of the peripheral: the MAC address on platforms
    /// that expose one, a generated unique id elsewhere.
    pub async fn address(&self) -> Result<String, LinkError> {
        let value = self.essential_property("Address").await?;
        Ok(value.as_str()?.to_string())
    }

    /// Whether the system currently holds a connection to the peripheral.
    pub async fn is_connected(&self) -> Result<bool, LinkError> {
        Ok(self.essential_property("Connected").await?.as_bool()?)
    }

    /// Object path of the adapter that owns this device.
    pub async fn adapter(&self) -> Result<String, LinkError> {
        let value = self.essential_property("Adapter").await?;
        Ok(value.as_str()?.to_string())
    }

    /// Human-readable device name, if the stack has one.
    pub async fn name(&self) -> Option<String> {
        self.optional_property("Name")
            .await?
            .as_str()
            .ok()
            .map(str::to_string)
    }

    /// User-editable alias, if the stack has one.
    pub async fn alias(&self) -> Option<String> {
        self.optional_property("Alias")
            .await?
            .as_str()
            .ok()
            .map(str::to_string)
    }

    /// Whether the device is paired. Absent until the stack knows.
    pub async fn paired(&self) -> Option<bool> {
        self.optional_property("Paired").await?.as_bool().ok()
    }

    /// Advertised transmit power in dBm, when the advertisement carries it.
    pub async fn tx_power(&self) -> Option<i16> {
        self.optional_property("TxPower").await?.as_i16().ok()
    }

    /// Signal strength in dBm.
    ///
    /// The reading drops out transiently (typically right after
    /// connecting), so a failed read falls back to the last value seen.
    pub async fn rssi(&self) -> Option<i16> {
        match self
            .object
            .get_property(DEVICE_INTERFACE, "RSSI")
            .await
            .and_then(|value| value.as_i16())
        {
            Ok(rssi) => {
                *self.rssi_cache.lock() = Some(rssi);
                Some(rssi)
            }
            Err(e) => {
                debug!("RSSI unavailable, using last reading: {}", e);
                *self.rssi_cache.lock()
            }
        }
    }

    /// UUIDs of the services this peripheral advertises.
    ///
    /// A device without a `UUIDs` property advertises nothing; that is an
    /// empty list, not an error. Every other failure is surfaced.
    pub async fn advertised(&self) -> Result<Vec<Uuid>, LinkError> {
        let raw = match self.object.get_property(DEVICE_INTERFACE, "UUIDs").await {
            Ok(value) => value.into_str_seq()?,
            Err(e) if e.is_unknown_property() => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        raw.iter().map(|s| gatt::parse_uuid(s)).collect()
    }

    /// Advertisement bytes attached to `service_uuid`, when present.
    ///
    /// Absent when the device publishes no service data at all or none for
    /// this UUID.
    pub async fn advertised_data(
        &self,
        service_uuid: &Uuid,
    ) -> Result<Option<Vec<u8>>, LinkError> {
        let mut map = match self
            .object
            .get_property(DEVICE_INTERFACE, "ServiceData")
            .await
        {
            Ok(value) => value.into_data_map()?,
            Err(e) if e.is_unknown_property() => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(map.remove(&service_uuid.to_string()))
    }

    /// Service wrappers for every service object discovered under this
    /// device. Wrappers are constructed fresh on every call; calling again
    /// re-enumerates.
    pub async fn services(&self) -> Result<Vec<GattService>, LinkError> {
        let objects = self
            .provider
            .find_objects(SERVICE_INTERFACE, self.object.path())
            .await?;
        Ok(objects.into_iter().map(GattService::new).collect())
    }

    /// Characteristic wrappers for every characteristic object discovered
    /// under this device. Same freshness contract as [`Device::services`].
    pub async fn characteristics(&self) -> Result<Vec<GattCharacteristic>, LinkError> {
        let objects = self
            .provider
            .find_objects(CHARACTERISTIC_INTERFACE, self.object.path())
            .await?;
        Ok(objects.into_iter().map(GattCharacteristic::new).collect())
    }

    /// Battery access over this device's own bus object. The battery
    /// service is a fixed well-known sub-interface; no enumeration.
    pub fn battery_service(&self) -> GattBatteryService {
        let object: Arc<dyn BusObject> = self.object.clone();
        GattBatteryService::new(object)
    }

    /// Cancel the property-change subscription.
    ///
    /// Must be called before the handle is dropped; there is no teardown on
    /// drop. Later calls are no-ops. Invoking any other operation after
    /// close is undefined.
    pub fn close(&self) {
        if let Some(token) = self.subscription.lock().take() {
            info!("Closing device {}", self.object.path());
            self.object.unsubscribe_properties(token);
        }
    }

    /// Read a property that must eventually succeed. The bus transiently
    /// fails to answer while the stack is still loading the object, so the
    /// read is retried before the last error is surfaced.
    async fn essential_property(&self, property: &str) -> Result<BusValue, LinkError> {
        let attempts = self.config.read_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.object.get_property(DEVICE_INTERFACE, property).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts => {
                    warn!(
                        "Failed to read {} (attempt {}/{}): {}",
                        property, attempt, attempts, e
                    );
                    sleep(self.config.retry_delay).await;
                }
                Err(e) => {
                    error!("Failed to read {} after {} attempts: {}", property, attempts, e);
                    return Err(e.into());
                }
            }
        }
    }

    /// Best-effort read; any failure yields `None`.
    async fn optional_property(&self, property: &str) -> Option<BusValue> {
        self.object
            .get_property(DEVICE_INTERFACE, property)
            .await
            .ok()
    }
}
