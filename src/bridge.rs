//! Host-facing command surface.
//!
//! An embedding host (a parent window, a script, the CLI) drives the chart
//! through messages of the form `{action, payload, chartType}`. Each accepted
//! command produces notifications, which are returned to the caller and
//! published to every live subscription.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};

use crate::chart::OrgChart;
use crate::config::Config;
use crate::error::ChartError;
use crate::identity::scalar_to_string;
use crate::ir::ChartVariant;
use crate::search::Stats;

/// Keys tried, in order, when an identity payload is an object.
const IDENTITY_KEYS: [&str; 5] = ["nodeId", "identifier", "jobTitleCode", "id", "code"];

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetData {
        data: Value,
        variant: Option<ChartVariant>,
    },
    UpdateData {
        data: Value,
        variant: Option<ChartVariant>,
    },
    Clear,
    Toggle(String),
    Expand(String),
    Collapse(String),
    ExpandAll,
    CollapseAll,
    Search(String),
    FilterByLevel(String),
    ResetFilters,
    Focus(String),
    GetStats,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HostMessage {
    action: String,
    #[serde(default)]
    payload: Value,
    #[serde(default, alias = "chart_type")]
    chart_type: Option<String>,
}

impl Command {
    /// Parses a host message. `Ok(None)` means the action is not one the
    /// bridge knows.
    pub fn from_message(message: &Value) -> Result<Option<Self>, ChartError> {
        let message = HostMessage::deserialize(message)
            .map_err(|err| ChartError::MalformedData(format!("unreadable host message: {err}")))?;
        let action = message.action.as_str();
        let variant = match message.chart_type.as_deref() {
            None => None,
            Some(token) => Some(ChartVariant::from_token(token).ok_or_else(|| {
                ChartError::invalid_payload(action, format!("unknown chart type `{token}`"))
            })?),
        };
        let payload = message.payload;

        let command = match action {
            "setData" | "init" => Self::SetData {
                data: payload,
                variant,
            },
            "updateData" => Self::UpdateData {
                data: payload,
                variant,
            },
            "updateCompanyData" => Self::UpdateData {
                data: payload,
                variant: variant.or(Some(ChartVariant::CompanyChart)),
            },
            "clearChart" => Self::Clear,
            "toggleNode" => Self::Toggle(identity_key(action, &payload)?),
            "expandNode" => Self::Expand(identity_key(action, &payload)?),
            "collapseNode" => Self::Collapse(identity_key(action, &payload)?),
            "expandAll" => Self::ExpandAll,
            "collapseAll" => Self::CollapseAll,
            "searchEmployee" => Self::Search(text_arg(action, &payload, &["term", "query"])?),
            "filterByLevel" => Self::FilterByLevel(text_arg(action, &payload, &["level"])?),
            "resetFilters" => Self::ResetFilters,
            "focusOnEmployee" => Self::Focus(identity_key(action, &payload)?),
            "getStats" => Self::GetStats,
            _ => return Ok(None),
        };
        Ok(Some(command))
    }
}

fn identity_key(action: &str, payload: &Value) -> Result<String, ChartError> {
    let key = match payload {
        Value::Object(map) => IDENTITY_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(scalar_to_string)),
        other => scalar_to_string(other),
    };
    key.ok_or_else(|| ChartError::invalid_payload(action, "expected an identifier"))
}

/// Search text may be blank (clears the filter), so only its shape is
/// checked.
fn text_arg(action: &str, payload: &Value, keys: &[&str]) -> Result<String, ChartError> {
    let value = match payload {
        Value::Object(map) => keys.iter().find_map(|key| map.get(*key)),
        other => Some(other),
    };
    match value {
        Some(Value::String(text)) => Ok(text.clone()),
        Some(Value::Number(number)) => Ok(number.to_string()),
        Some(Value::Null) | None => Ok(String::new()),
        Some(_) => Err(ChartError::invalid_payload(action, "expected a string")),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Notification {
    Ready,
    Initialized {
        chart_type: ChartVariant,
        total_items: usize,
    },
    Updated {
        chart_type: ChartVariant,
        total_items: usize,
    },
    Cleared,
    Expanded {
        /// `None` for expand-all.
        node_id: Option<String>,
        changed: bool,
        visible_items: usize,
    },
    Collapsed {
        node_id: Option<String>,
        changed: bool,
        visible_items: usize,
    },
    Toggled {
        node_id: String,
        expanded: bool,
        visible_items: usize,
    },
    Searched {
        term: String,
        matches: usize,
    },
    Filtered {
        level: String,
        matches: usize,
    },
    FiltersReset,
    Focused {
        target: String,
        found: bool,
        path: Vec<String>,
    },
    Stats(Stats),
}

type Listener = Box<dyn FnMut(&Notification)>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
    publishing: bool,
    dropped_while_publishing: Vec<u64>,
}

/// Fan-out of notifications to host callbacks.
#[derive(Clone, Default)]
pub struct NotificationBus {
    inner: Rc<RefCell<Listeners>>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` until the returned guard is dropped.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, listener: impl FnMut(&Notification) + 'static) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.push((id, Box::new(listener)));
        Subscription {
            id,
            bus: Rc::downgrade(&self.inner),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn publish(&self, notification: &Notification) {
        // Listeners run without the borrow held so they may subscribe or drop
        // their own guard.
        let mut running = {
            let mut inner = self.inner.borrow_mut();
            inner.publishing = true;
            std::mem::take(&mut inner.entries)
        };
        for (_, listener) in running.iter_mut() {
            listener(notification);
        }
        let mut inner = self.inner.borrow_mut();
        inner.publishing = false;
        let dropped = std::mem::take(&mut inner.dropped_while_publishing);
        running.retain(|(id, _)| !dropped.contains(id));
        running.append(&mut inner.entries);
        inner.entries = running;
    }
}

pub struct Subscription {
    id: u64,
    bus: Weak<RefCell<Listeners>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(bus) = self.bus.upgrade() else {
            return;
        };
        let Ok(mut inner) = bus.try_borrow_mut() else {
            return;
        };
        if inner.publishing {
            inner.dropped_while_publishing.push(self.id);
        }
        inner.entries.retain(|(id, _)| *id != self.id);
    }
}

/// Allow-list of message origins. Nothing is trusted unless listed; a `"*"`
/// entry accepts every origin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginPolicy {
    any: bool,
    allowed: BTreeSet<String>,
}

impl OriginPolicy {
    pub fn new<S: AsRef<str>>(origins: &[S]) -> Self {
        let mut policy = Self::default();
        for origin in origins {
            match origin.as_ref().trim() {
                "*" => policy.any = true,
                "" => {}
                origin => {
                    policy.allowed.insert(origin.trim_end_matches('/').to_string());
                }
            }
        }
        policy
    }

    pub fn allows(&self, origin: &str) -> bool {
        self.any || self.allowed.contains(origin.trim_end_matches('/'))
    }
}

pub struct CommandBridge {
    chart: OrgChart,
    policy: OriginPolicy,
    bus: NotificationBus,
}

impl CommandBridge {
    pub fn new(config: Config) -> Self {
        Self::with_chart(OrgChart::new(config))
    }

    pub fn with_chart(chart: OrgChart) -> Self {
        let policy = OriginPolicy::new(chart.config().bridge.trusted_origins.as_slice());
        info!(
            "command bridge attached ({} trusted origins)",
            chart.config().bridge.trusted_origins.len()
        );
        Self {
            chart,
            policy,
            bus: NotificationBus::new(),
        }
    }

    pub fn chart(&self) -> &OrgChart {
        &self.chart
    }

    pub fn chart_mut(&mut self) -> &mut OrgChart {
        &mut self.chart
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    pub fn subscribe(&self, listener: impl FnMut(&Notification) + 'static) -> Subscription {
        self.bus.subscribe(listener)
    }

    /// Tells the host the bridge is listening.
    pub fn announce_ready(&self) -> Notification {
        let ready = Notification::Ready;
        self.bus.publish(&ready);
        ready
    }

    pub fn handle_message(
        &mut self,
        origin: &str,
        message: &Value,
    ) -> Result<Vec<Notification>, ChartError> {
        if !self.policy.allows(origin) {
            warn!("rejecting message from untrusted origin `{origin}`");
            return Err(ChartError::UntrustedOrigin(origin.to_string()));
        }
        match Command::from_message(message)? {
            Some(command) => self.dispatch(command),
            None => {
                let action = message.get("action").and_then(Value::as_str).unwrap_or("?");
                warn!("ignoring unknown action `{action}`");
                Ok(Vec::new())
            }
        }
    }

    pub fn dispatch(&mut self, command: Command) -> Result<Vec<Notification>, ChartError> {
        debug!("dispatching {command:?}");
        let chart = &mut self.chart;
        let notification = match command {
            Command::SetData { data, variant } => {
                let total_items = chart.set_data(&data, variant)?;
                Notification::Initialized {
                    chart_type: chart.variant(),
                    total_items,
                }
            }
            Command::UpdateData { data, variant } => {
                let total_items = chart.update_data(&data, variant)?;
                Notification::Updated {
                    chart_type: chart.variant(),
                    total_items,
                }
            }
            Command::Clear => {
                chart.clear();
                Notification::Cleared
            }
            Command::Toggle(key) => {
                let id = chart.resolve(&key);
                let expanded = chart.toggle(&id);
                Notification::Toggled {
                    node_id: id.to_string(),
                    expanded,
                    visible_items: chart.layout().nodes.len(),
                }
            }
            Command::Expand(key) => {
                let id = chart.resolve(&key);
                let changed = chart.expand_node(&id);
                Notification::Expanded {
                    node_id: Some(id.to_string()),
                    changed,
                    visible_items: chart.layout().nodes.len(),
                }
            }
            Command::Collapse(key) => {
                let id = chart.resolve(&key);
                let changed = chart.collapse_node(&id);
                Notification::Collapsed {
                    node_id: Some(id.to_string()),
                    changed,
                    visible_items: chart.layout().nodes.len(),
                }
            }
            Command::ExpandAll => {
                chart.expand_all();
                Notification::Expanded {
                    node_id: None,
                    changed: true,
                    visible_items: chart.layout().nodes.len(),
                }
            }
            Command::CollapseAll => {
                chart.collapse_all();
                Notification::Collapsed {
                    node_id: None,
                    changed: true,
                    visible_items: chart.layout().nodes.len(),
                }
            }
            Command::Search(term) => {
                let matches = chart.search(&term);
                Notification::Searched { term, matches }
            }
            Command::FilterByLevel(level) => {
                let matches = chart.filter_by_level(&level);
                Notification::Filtered { level, matches }
            }
            Command::ResetFilters => {
                chart.reset_filters();
                Notification::FiltersReset
            }
            Command::Focus(target) => {
                let path = chart.focus(&target).unwrap_or_default();
                Notification::Focused {
                    found: !path.is_empty(),
                    path: path.iter().map(ToString::to_string).collect(),
                    target,
                }
            }
            Command::GetStats => Notification::Stats(chart.stats()),
        };
        self.bus.publish(&notification);
        Ok(vec![notification])
    }
}

impl Drop for CommandBridge {
    fn drop(&mut self) {
        info!(
            "command bridge detached ({} listeners still subscribed)",
            self.bus.listener_count()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use serde_json::json;

    const HOST: &str = "https://host.example";

    fn bridge() -> CommandBridge {
        let config = Config {
            bridge: BridgeConfig {
                trusted_origins: vec![HOST.to_string()],
                ..BridgeConfig::default()
            },
            ..Config::default()
        };
        CommandBridge::new(config)
    }

    fn abcd() -> Value {
        json!({
            "name": "A",
            "job_title_code": 1,
            "children": [
                {"name": "B", "job_title_code": 2, "children": [{"name": "D", "job_title_code": 4}]},
                {"name": "C", "job_title_code": 3}
            ]
        })
    }

    fn send(bridge: &mut CommandBridge, message: Value) -> Vec<Notification> {
        bridge.handle_message(HOST, &message).unwrap()
    }

    #[test]
    fn set_data_then_toggle_walkthrough() {
        let mut bridge = bridge();
        let out = send(&mut bridge, json!({"action": "setData", "payload": abcd(), "chartType": "orgChart"}));
        assert_eq!(
            out,
            vec![Notification::Initialized {
                chart_type: ChartVariant::OrgChart,
                total_items: 4
            }]
        );

        let out = send(&mut bridge, json!({"action": "toggleNode", "payload": "root-A-0"}));
        assert_eq!(
            out,
            vec![Notification::Toggled {
                node_id: "root-A-0".to_string(),
                expanded: true,
                visible_items: 3
            }]
        );

        let out = send(&mut bridge, json!({"action": "expandNode", "payload": {"jobTitleCode": 2}}));
        assert_eq!(
            out,
            vec![Notification::Expanded {
                node_id: Some("root-A-0-B-0".to_string()),
                changed: true,
                visible_items: 4
            }]
        );
    }

    #[test]
    fn null_data_is_rejected_and_state_kept() {
        let mut bridge = bridge();
        let err = bridge
            .handle_message(HOST, &json!({"action": "setData", "payload": null}))
            .unwrap_err();
        assert!(matches!(err, ChartError::MalformedData(_)));
        assert!(!bridge.chart().is_initialized());
        assert!(bridge.chart().forest().is_empty());

        send(&mut bridge, json!({"action": "setData", "payload": abcd()}));
        assert!(bridge.handle_message(HOST, &json!({"action": "setData"})).is_err());
        assert_eq!(bridge.chart().forest().len(), 4);
        assert!(bridge.chart().is_initialized());
    }

    #[test]
    fn untrusted_origin_is_rejected() {
        let mut bridge = bridge();
        let err = bridge
            .handle_message("https://evil.example", &json!({"action": "setData", "payload": abcd()}))
            .unwrap_err();
        assert_eq!(err, ChartError::UntrustedOrigin("https://evil.example".to_string()));
        assert!(bridge.chart().forest().is_empty());
    }

    #[test]
    fn wildcard_origin_is_opt_in() {
        assert!(!OriginPolicy::new::<&str>(&[]).allows(HOST));
        assert!(OriginPolicy::new(&["*"]).allows("https://anything.example"));
        assert!(OriginPolicy::new(&["https://host.example/"]).allows(HOST));
    }

    #[test]
    fn unknown_action_is_ignored() {
        let mut bridge = bridge();
        assert!(send(&mut bridge, json!({"action": "launchRockets"})).is_empty());
    }

    #[test]
    fn bad_payloads_are_reported() {
        let mut bridge = bridge();
        let err = bridge
            .handle_message(HOST, &json!({"action": "expandNode", "payload": {"other": 1}}))
            .unwrap_err();
        assert!(matches!(err, ChartError::InvalidPayload { ref action, .. } if action == "expandNode"));
        let err = bridge
            .handle_message(HOST, &json!({"action": "setData", "payload": {}, "chartType": "pie"}))
            .unwrap_err();
        assert!(matches!(err, ChartError::InvalidPayload { .. }));
        assert!(matches!(
            bridge.handle_message(HOST, &json!("setData")),
            Err(ChartError::MalformedData(_))
        ));
    }

    #[test]
    fn focus_reports_path_or_miss() {
        let mut bridge = bridge();
        send(&mut bridge, json!({"action": "setData", "payload": abcd()}));
        let out = send(&mut bridge, json!({"action": "focusOnEmployee", "payload": 4}));
        assert_eq!(
            out,
            vec![Notification::Focused {
                target: "4".to_string(),
                found: true,
                path: vec![
                    "root-A-0".to_string(),
                    "root-A-0-B-0".to_string(),
                    "root-A-0-B-0-D-0".to_string()
                ]
            }]
        );
        let before = bridge.chart().expansion().clone();
        let out = send(&mut bridge, json!({"action": "focusOnEmployee", "payload": 99}));
        assert!(matches!(out[0], Notification::Focused { found: false, .. }));
        assert_eq!(bridge.chart().expansion(), &before);
    }

    #[test]
    fn stats_and_filters() {
        let mut bridge = bridge();
        send(&mut bridge, json!({"action": "setData", "payload": abcd()}));
        send(&mut bridge, json!({"action": "expandAll"}));
        let out = send(&mut bridge, json!({"action": "searchEmployee", "payload": {"term": "b"}}));
        assert_eq!(
            out,
            vec![Notification::Searched {
                term: "b".to_string(),
                matches: 1
            }]
        );
        let out = send(&mut bridge, json!({"action": "getStats"}));
        let Notification::Stats(stats) = &out[0] else {
            panic!("expected stats, got {out:?}");
        };
        assert_eq!(stats.visible_items, 4);
        assert_eq!(stats.total_items, 4);
        assert_eq!(stats.matches, 1);
        assert!(stats.initialized);

        let value = serde_json::to_value(&out[0]).unwrap();
        assert_eq!(value["event"], "stats");
        assert_eq!(value["visibleItems"], 4);
    }

    #[test]
    fn notifications_serialize_with_event_tag() {
        let value = serde_json::to_value(Notification::Toggled {
            node_id: "x".to_string(),
            expanded: false,
            visible_items: 1,
        })
        .unwrap();
        assert_eq!(
            value,
            json!({"event": "toggled", "nodeId": "x", "expanded": false, "visibleItems": 1})
        );
        assert_eq!(
            serde_json::to_value(Notification::FiltersReset).unwrap(),
            json!({"event": "filtersReset"})
        );
    }

    #[test]
    fn subscriptions_end_when_dropped() {
        let mut bridge = bridge();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let subscription = bridge.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        bridge.announce_ready();
        send(&mut bridge, json!({"action": "clearChart"}));
        assert_eq!(*seen.borrow(), vec![Notification::Ready, Notification::Cleared]);

        drop(subscription);
        assert_eq!(bridge.bus().listener_count(), 0);
        send(&mut bridge, json!({"action": "resetFilters"}));
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn listener_may_drop_its_own_guard() {
        let bus = NotificationBus::new();
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let inner = slot.clone();
        let calls = Rc::new(RefCell::new(0));
        let counter = calls.clone();
        let guard = bus.subscribe(move |_| {
            *counter.borrow_mut() += 1;
            inner.borrow_mut().take();
        });
        *slot.borrow_mut() = Some(guard);
        bus.publish(&Notification::Ready);
        bus.publish(&Notification::Ready);
        assert_eq!(*calls.borrow(), 1);
        assert_eq!(bus.listener_count(), 0);
    }
}
