//! Mock Flair API and fixtures shared by the integration's tests.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use serde_json::Value;
use serde_json::json;
use tokio::sync::Notify;
use tokio::sync::mpsc;

use super::client::Connector;
use super::client::FlairApi;
use super::config::Credentials;
use super::context::FlairContext;
use super::error::ApiError;
use super::host::Host;
use super::identity::NameHashMapper;
use super::resource::Attributes;
use super::resource::Related;
use super::resource::Resource;
use crate::engine::Driver;
use crate::engine::FromIntegrationMessage;
use crate::engine::FromIntegrationReceiver;
use crate::engine::NodeInfo;

type Key = (String, String);

fn key(kind: &str, id: &str) -> Key {
    (kind.to_string(), id.to_string())
}

/// In-memory Flair API
///
/// Relations hold resource references; following one returns the current
/// copy of each referenced resource.
#[derive(Default)]
pub struct MockFlairApi {
    resources: Mutex<HashMap<Key, Resource>>,
    collections: Mutex<HashMap<String, Vec<Key>>>,
    relations: Mutex<HashMap<(String, String, String), Result<Related, ApiError>>>,
    failing_fetches: Mutex<HashSet<Key>>,
    update_overrides: Mutex<HashMap<Key, Attributes>>,
    fail_renew: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl MockFlairApi {
    pub fn insert(&self, kind: &str, id: &str, attributes: Value) -> Resource {
        let resource = Resource::new(kind, id, attributes);
        self.resources
            .lock()
            .unwrap()
            .insert(key(kind, id), resource.clone());
        resource
    }

    pub fn resource(&self, kind: &str, id: &str) -> Resource {
        self.resources.lock().unwrap()[&key(kind, id)].clone()
    }

    pub fn set_attr(&self, kind: &str, id: &str, attr: &str, value: Value) {
        let mut resources = self.resources.lock().unwrap();
        if let Some(resource) = resources.get_mut(&key(kind, id)) {
            resource.attributes.insert(attr.to_string(), value);
        }
    }

    pub fn rename(&self, kind: &str, id: &str, name: &str) {
        self.set_attr(kind, id, "name", json!(name));
    }

    pub fn set_collection(&self, kind: &str, members: &[&Resource]) {
        let keys = members.iter().map(|r| key(&r.kind, &r.id)).collect();
        self.collections
            .lock()
            .unwrap()
            .insert(kind.to_string(), keys);
    }

    pub fn set_related(&self, parent: &Resource, rel: &str, result: Result<Related, ApiError>) {
        self.relations.lock().unwrap().insert(
            (parent.kind.clone(), parent.id.clone(), rel.to_string()),
            result,
        );
    }

    pub fn link(&self, parent: &Resource, rel: &str, children: &[&Resource]) {
        let children = children.iter().map(|r| (*r).clone()).collect();
        self.set_related(parent, rel, Ok(Related::Many(children)));
    }

    pub fn link_one(&self, parent: &Resource, rel: &str, child: &Resource) {
        self.set_related(parent, rel, Ok(Related::One(child.clone())));
    }

    pub fn fail_fetch(&self, kind: &str, id: &str) {
        self.failing_fetches.lock().unwrap().insert(key(kind, id));
    }

    /// Make the API store `attributes` whatever an update asks for
    pub fn override_update(&self, kind: &str, id: &str, attributes: Value) {
        if let Value::Object(map) = attributes {
            self.update_overrides
                .lock()
                .unwrap()
                .insert(key(kind, id), map);
        }
    }

    pub fn fail_renew(&self) {
        self.fail_renew.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn current(&self, resource: &Resource) -> Resource {
        self.resources
            .lock()
            .unwrap()
            .get(&key(&resource.kind, &resource.id))
            .cloned()
            .unwrap_or_else(|| resource.clone())
    }
}

#[async_trait]
impl FlairApi for MockFlairApi {
    async fn renew_token(&self) -> Result<(), ApiError> {
        self.record("renew_token".to_string());
        if self.fail_renew.load(Ordering::SeqCst) {
            return Err(ApiError::Authentication("invalid_client".to_string()));
        }
        Ok(())
    }

    async fn refresh_root(&self) -> Result<(), ApiError> {
        self.record("refresh_root".to_string());
        Ok(())
    }

    async fn list(&self, kind: &str) -> Result<Vec<Resource>, ApiError> {
        self.record(format!("list {}", kind));
        let keys = self
            .collections
            .lock()
            .unwrap()
            .get(kind)
            .cloned()
            .unwrap_or_default();
        let resources = self.resources.lock().unwrap();
        Ok(keys
            .iter()
            .filter_map(|k| resources.get(k).cloned())
            .collect())
    }

    async fn fetch(&self, resource: &Resource) -> Result<Resource, ApiError> {
        self.record(format!("fetch {}/{}", resource.kind, resource.id));
        if self
            .failing_fetches
            .lock()
            .unwrap()
            .contains(&key(&resource.kind, &resource.id))
        {
            return Err(ApiError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(self.current(resource))
    }

    async fn related(&self, resource: &Resource, rel: &str) -> Result<Related, ApiError> {
        self.record(format!("related {}/{} {}", resource.kind, resource.id, rel));
        let stored = self
            .relations
            .lock()
            .unwrap()
            .get(&(resource.kind.clone(), resource.id.clone(), rel.to_string()))
            .cloned()
            .unwrap_or(Err(ApiError::EmptyBody))?;

        Ok(match stored {
            Related::One(r) => Related::One(self.current(&r)),
            Related::Many(rs) => Related::Many(rs.iter().map(|r| self.current(r)).collect()),
        })
    }

    async fn update(
        &self,
        resource: &Resource,
        attributes: Attributes,
    ) -> Result<Resource, ApiError> {
        self.record(format!("update {}/{}", resource.kind, resource.id));
        let mut updated = self.current(resource).merged(&attributes);
        if let Some(forced) = self
            .update_overrides
            .lock()
            .unwrap()
            .get(&key(&resource.kind, &resource.id))
        {
            updated = updated.merged(forced);
        }
        self.resources
            .lock()
            .unwrap()
            .insert(key(&resource.kind, &resource.id), updated.clone());
        Ok(updated)
    }
}

/// Connector handing out one shared mock API
pub struct MockConnector {
    api: Arc<MockFlairApi>,
    gate: Option<Arc<Notify>>,
    fail: bool,
    connects: AtomicUsize,
}

impl MockConnector {
    pub fn new(api: Arc<MockFlairApi>) -> Self {
        Self {
            api,
            gate: None,
            fail: false,
            connects: AtomicUsize::new(0),
        }
    }

    /// Reject every connection attempt
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Hold every connection attempt until `gate()` is notified
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Notify::new()));
        self
    }

    pub fn gate(&self) -> Arc<Notify> {
        self.gate.clone().unwrap_or_default()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _credentials: &Credentials) -> Result<Arc<dyn FlairApi>, ApiError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail {
            return Err(ApiError::Authentication("invalid_client".to_string()));
        }
        let api: Arc<dyn FlairApi> = self.api.clone();
        Ok(api)
    }
}

/// One structure "Home" with two rooms:
///
/// - "Office": "Puck 1" and "Vent 1", both with readings
/// - "Den": no pucks, "Vent 2" without a reading
pub fn home_fixture() -> Arc<MockFlairApi> {
    let api = Arc::new(MockFlairApi::default());

    let home = api.insert(
        "structures",
        "s1",
        json!({
            "name": "Home",
            "is-active": true,
            "home": true,
            "set-point-temperature-c": 20.0,
            "mode": "auto",
            "home-away-mode": "Manual",
            "set-point-mode": "Home Evenness For Active Rooms Flair Setpoint",
        }),
    );
    let office = api.insert(
        "rooms",
        "r1",
        json!({
            "name": "Office",
            "active": true,
            "current-temperature-c": 21.0,
            "current-humidity": 40.0,
            "set-point-c": 21.0,
        }),
    );
    let den = api.insert(
        "rooms",
        "r2",
        json!({
            "name": "Den",
            "active": false,
            "current-temperature-c": null,
            "current-humidity": null,
            "set-point-c": null,
        }),
    );
    let puck = api.insert(
        "pucks",
        "p1",
        json!({"name": "Puck 1", "inactive": false, "current-temperature-c": 20.5}),
    );
    let puck_reading = api.insert(
        "sensor-readings",
        "pr1",
        json!({
            "room-temperature-c": 21.0,
            "humidity": 40.0,
            "system-voltage": 3.0,
            "rssi": -60,
        }),
    );
    let vent_one = api.insert(
        "vents",
        "v1",
        json!({"name": "Vent 1", "inactive": false, "percent-open": 50, "voltage": 2.9}),
    );
    let vent_reading = api.insert(
        "vent-sensor-readings",
        "vr1",
        json!({
            "duct-pressure": 99.5,
            "duct-temperature-c": 20.0,
            "system-voltage": 3.1,
            "rssi": -62,
        }),
    );
    let vent_two = api.insert(
        "vents",
        "v2",
        json!({"name": "Vent 2", "inactive": false, "percent-open": 100}),
    );

    api.set_collection("structures", &[&home]);
    api.link(&home, "rooms", &[&office, &den]);
    api.link(&office, "pucks", &[&puck]);
    api.link(&office, "vents", &[&vent_one]);
    api.link(&den, "vents", &[&vent_two]);
    api.link_one(&puck, "current-reading", &puck_reading);
    api.link_one(&vent_one, "current-reading", &vent_reading);

    api
}

/// Context wired to a channel the test can drain
pub fn test_context() -> (FlairContext, FromIntegrationReceiver) {
    let (tx, rx) = mpsc::channel(1024);
    let ctx = FlairContext::new(Host::new(tx, "flair"), Arc::new(NameHashMapper));
    (ctx, rx)
}

pub fn drain(rx: &mut FromIntegrationReceiver) -> Vec<FromIntegrationMessage> {
    let mut messages = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        messages.push(msg);
    }
    messages
}

pub fn added_nodes(messages: &[FromIntegrationMessage]) -> Vec<NodeInfo> {
    messages
        .iter()
        .filter_map(|m| match m {
            FromIntegrationMessage::NodeAdded { node, .. } => Some(node.clone()),
            _ => None,
        })
        .collect()
}

pub fn driver_updates(messages: &[FromIntegrationMessage], address: &str) -> Vec<(Driver, f64)> {
    messages
        .iter()
        .filter_map(|m| match m {
            FromIntegrationMessage::DriverChanged {
                address: a,
                driver,
                value,
                ..
            } if a == address => Some((*driver, *value)),
            _ => None,
        })
        .collect()
}
