//! In-memory fake bus for driving a [`Device`] end to end.
//!
//! The fake scripts property replies per property name (consumed in order,
//! last reply repeated), acknowledges control requests with configurable
//! results, and lets tests deliver property-change notifications through
//! the registered handler the way a real transport dispatch context would.

// Each test binary exercises a different slice of the fake.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use ble_link::bus::{
    BusError, BusObject, BusProvider, BusValue, DeviceObject, PropertyChange,
    PropertyChangeHandler, SubscriptionToken, DEVICE_INTERFACE,
};
use ble_link::{Device, LinkConfig};

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

pub fn uuid_of(raw: &str) -> Uuid {
    Uuid::parse_str(raw).unwrap()
}

/// Scripted stand-in for a remote peripheral bus object.
pub struct FakePeripheral {
    path: String,
    responses: Mutex<HashMap<String, VecDeque<Result<BusValue, BusError>>>>,
    pub get_calls: Mutex<Vec<(String, String)>>,
    connect_reply: Mutex<Result<(), BusError>>,
    disconnect_reply: Mutex<Result<(), BusError>>,
    notify_on_connect: AtomicBool,
    notify_on_disconnect: AtomicBool,
    handler: Mutex<Option<PropertyChangeHandler>>,
    next_token: AtomicU64,
    pub subscribes: AtomicUsize,
    pub unsubscribes: AtomicUsize,
}

impl FakePeripheral {
    pub fn new(path: &str) -> Arc<Self> {
        Arc::new(Self {
            path: path.to_string(),
            responses: Mutex::new(HashMap::new()),
            get_calls: Mutex::new(Vec::new()),
            connect_reply: Mutex::new(Ok(())),
            disconnect_reply: Mutex::new(Ok(())),
            notify_on_connect: AtomicBool::new(false),
            notify_on_disconnect: AtomicBool::new(false),
            handler: Mutex::new(None),
            next_token: AtomicU64::new(1),
            subscribes: AtomicUsize::new(0),
            unsubscribes: AtomicUsize::new(0),
        })
    }

    /// Make every read of `property` succeed with `value`.
    pub fn put_property(&self, property: &str, value: BusValue) {
        self.script_property(property, vec![Ok(value)]);
    }

    /// Script the replies for `property`, consumed in order; the last reply
    /// keeps repeating.
    pub fn script_property(&self, property: &str, replies: Vec<Result<BusValue, BusError>>) {
        self.responses
            .lock()
            .insert(property.to_string(), replies.into());
    }

    pub fn set_connect_reply(&self, reply: Result<(), BusError>) {
        *self.connect_reply.lock() = reply;
    }

    pub fn set_disconnect_reply(&self, reply: Result<(), BusError>) {
        *self.disconnect_reply.lock() = reply;
    }

    /// Deliver `Connected=true` through the handler as soon as a connect
    /// request is acknowledged.
    pub fn notify_on_connect(&self) {
        self.notify_on_connect.store(true, Ordering::SeqCst);
    }

    /// Deliver `Connected=false` through the handler as soon as a
    /// disconnect request is acknowledged.
    pub fn notify_on_disconnect(&self) {
        self.notify_on_disconnect.store(true, Ordering::SeqCst);
    }

    /// Invoke the registered handler the way the transport dispatch context
    /// would.
    pub fn deliver(&self, change: PropertyChange) {
        let handler = self.handler.lock().clone();
        if let Some(handler) = handler {
            handler(&change);
        }
    }

    pub fn deliver_connected(&self, connected: bool) {
        self.deliver(device_change("Connected", BusValue::Bool(connected)));
    }

    pub fn reads_of(&self, property: &str) -> usize {
        self.get_calls
            .lock()
            .iter()
            .filter(|(_, p)| p == property)
            .count()
    }
}

pub fn device_change(property: &str, value: BusValue) -> PropertyChange {
    PropertyChange {
        interface: DEVICE_INTERFACE.to_string(),
        changed: HashMap::from([(property.to_string(), value)]),
        invalidated: Vec::new(),
    }
}

#[async_trait]
impl BusObject for FakePeripheral {
    fn path(&self) -> &str {
        &self.path
    }

    async fn get_property(&self, interface: &str, property: &str) -> Result<BusValue, BusError> {
        self.get_calls
            .lock()
            .push((interface.to_string(), property.to_string()));
        let mut responses = self.responses.lock();
        match responses.get_mut(property) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap_or_else(|| {
                Err(BusError::UnknownProperty {
                    interface: interface.to_string(),
                    property: property.to_string(),
                })
            }),
            None => Err(BusError::UnknownProperty {
                interface: interface.to_string(),
                property: property.to_string(),
            }),
        }
    }
}

#[async_trait]
impl DeviceObject for FakePeripheral {
    async fn request_connect(&self) -> Result<(), BusError> {
        let reply = self.connect_reply.lock().clone();
        if reply.is_ok() && self.notify_on_connect.load(Ordering::SeqCst) {
            self.deliver_connected(true);
        }
        reply
    }

    async fn request_disconnect(&self) -> Result<(), BusError> {
        let reply = self.disconnect_reply.lock().clone();
        if reply.is_ok() && self.notify_on_disconnect.load(Ordering::SeqCst) {
            self.deliver_connected(false);
        }
        reply
    }

    fn subscribe_properties(
        &self,
        handler: PropertyChangeHandler,
    ) -> Result<SubscriptionToken, BusError> {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        *self.handler.lock() = Some(handler);
        Ok(SubscriptionToken::new(
            self.next_token.fetch_add(1, Ordering::SeqCst),
        ))
    }

    fn unsubscribe_properties(&self, _token: SubscriptionToken) {
        self.unsubscribes.fetch_add(1, Ordering::SeqCst);
        *self.handler.lock() = None;
    }
}

/// A discovered GATT object answering only its `UUID` property.
pub struct FakeGattObject {
    path: String,
    uuid: String,
}

impl FakeGattObject {
    pub fn new(path: &str, uuid: &str) -> Arc<Self> {
        Arc::new(Self {
            path: path.to_string(),
            uuid: uuid.to_string(),
        })
    }
}

#[async_trait]
impl BusObject for FakeGattObject {
    fn path(&self) -> &str {
        &self.path
    }

    async fn get_property(&self, interface: &str, property: &str) -> Result<BusValue, BusError> {
        if property == "UUID" {
            Ok(BusValue::Str(self.uuid.clone()))
        } else {
            Err(BusError::UnknownProperty {
                interface: interface.to_string(),
                property: property.to_string(),
            })
        }
    }
}

/// Registry of discovered bus objects keyed by interface.
pub struct FakeProvider {
    objects: Mutex<Vec<(String, Arc<dyn BusObject>)>>,
    pub find_calls: Mutex<Vec<(String, String)>>,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            objects: Mutex::new(Vec::new()),
            find_calls: Mutex::new(Vec::new()),
        })
    }

    pub fn add_object(&self, interface: &str, object: Arc<dyn BusObject>) {
        self.objects.lock().push((interface.to_string(), object));
    }
}

#[async_trait]
impl BusProvider for FakeProvider {
    async fn find_objects(
        &self,
        interface: &str,
        path_prefix: &str,
    ) -> Result<Vec<Arc<dyn BusObject>>, BusError> {
        self.find_calls
            .lock()
            .push((interface.to_string(), path_prefix.to_string()));
        Ok(self
            .objects
            .lock()
            .iter()
            .filter(|(i, o)| i == interface && o.path().starts_with(path_prefix))
            .map(|(_, o)| Arc::clone(o))
            .collect())
    }
}

pub const DEVICE_PATH: &str = "/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF";

/// A device wired to a fresh fake peripheral and provider.
pub fn linked_device() -> (Device, Arc<FakePeripheral>, Arc<FakeProvider>) {
    init_logging();
    let peripheral = FakePeripheral::new(DEVICE_PATH);
    let provider = FakeProvider::new();
    let device = Device::new(
        Arc::clone(&peripheral) as Arc<dyn DeviceObject>,
        Arc::clone(&provider) as Arc<dyn BusProvider>,
        LinkConfig::default(),
    )
    .unwrap();
    (device, peripheral, provider)
}
