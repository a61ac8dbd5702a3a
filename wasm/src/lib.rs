use orgchart_rs::render::render_svg;
use orgchart_rs::viewport::Clock;
#[cfg(not(target_arch = "wasm32"))]
use orgchart_rs::viewport::SystemClock;
use orgchart_rs::{Command, CommandBridge, Config, OrgChart, parse_config};
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = Date, js_name = now)]
    fn date_now() -> f64;
}

/// Page clock: `Date.now()` in the browser, the system clock elsewhere.
struct HostClock;

impl Clock for HostClock {
    #[cfg(target_arch = "wasm32")]
    fn now_ms(&self) -> u64 {
        date_now() as u64
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn now_ms(&self) -> u64 {
        SystemClock.now_ms()
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|error| error.to_string())
}

fn build_bridge(config_json: Option<&str>) -> Result<CommandBridge, String> {
    let config = match config_json {
        Some(raw) if !raw.trim().is_empty() => {
            parse_config(raw).map_err(|error| format!("{error:#}"))?
        }
        _ => Config::default(),
    };
    let chart = OrgChart::with_clock(config, Box::new(HostClock));
    Ok(CommandBridge::with_chart(chart))
}

/// One chart bound to one host page. Every method that returns a string
/// returns JSON.
#[wasm_bindgen]
pub struct OrgChartHandle {
    bridge: CommandBridge,
}

impl OrgChartHandle {
    fn try_new(config_json: Option<&str>) -> Result<Self, String> {
        Ok(Self {
            bridge: build_bridge(config_json)?,
        })
    }

    fn try_handle_message(&mut self, origin: &str, message_json: &str) -> Result<String, String> {
        let message: Value =
            serde_json::from_str(message_json).map_err(|error| error.to_string())?;
        let notifications = self
            .bridge
            .handle_message(origin, &message)
            .map_err(|error| error.to_string())?;
        to_json(&notifications)
    }

    fn try_toggle(&mut self, id: &str) -> Result<String, String> {
        let notifications = self
            .bridge
            .dispatch(Command::Toggle(id.to_string()))
            .map_err(|error| error.to_string())?;
        to_json(&notifications)
    }
}

#[wasm_bindgen]
impl OrgChartHandle {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<OrgChartHandle, JsValue> {
        Self::try_new(config_json.as_deref()).map_err(|error| JsValue::from_str(&error))
    }

    /// Announces readiness; returns the `ready` notification.
    pub fn ready(&self) -> Result<String, JsValue> {
        to_json(&self.bridge.announce_ready()).map_err(|error| JsValue::from_str(&error))
    }

    /// Feeds one `postMessage` payload through the origin check and returns
    /// the resulting notifications.
    pub fn handle_message(&mut self, origin: &str, message_json: &str) -> Result<String, JsValue> {
        self.try_handle_message(origin, message_json)
            .map_err(|error| JsValue::from_str(&error))
    }

    /// Expand-button click on the drawing surface.
    pub fn toggle(&mut self, id: &str) -> Result<String, JsValue> {
        self.try_toggle(id).map_err(|error| JsValue::from_str(&error))
    }

    pub fn drawing(&self) -> Result<String, JsValue> {
        to_json(&self.bridge.chart().drawing()).map_err(|error| JsValue::from_str(&error))
    }

    /// Fit-view options once the debounce has elapsed, otherwise `undefined`.
    pub fn poll_fit_view(&mut self) -> Result<Option<String>, JsValue> {
        self.bridge
            .chart_mut()
            .poll_fit_view()
            .map(|options| to_json(&options))
            .transpose()
            .map_err(|error| JsValue::from_str(&error))
    }

    pub fn svg(&self) -> String {
        let chart = self.bridge.chart();
        render_svg(&chart.layout(), &chart.config().theme, &chart.config().render)
    }
}

#[cfg(test)]
mod tests {
    use crate::OrgChartHandle;

    #[test]
    fn drives_a_chart_through_host_messages() {
        let mut handle =
            OrgChartHandle::try_new(Some(r#"{"bridge": {"trustedOrigins": ["https://app.example"]}}"#))
                .expect("config should parse");

        let out = handle
            .try_handle_message(
                "https://app.example",
                r#"{"action": "setData", "payload": {"name": "A", "children": [{"name": "B"}]}, "chartType": "orgChart"}"#,
            )
            .expect("setData should be accepted");
        assert!(out.contains("\"event\":\"initialized\""));

        let out = handle.try_toggle("root-A-0").expect("toggle should succeed");
        assert!(out.contains("\"visibleItems\":2"));
        assert!(handle.svg().contains("<svg"));

        let err = handle
            .try_handle_message("https://other.example", r#"{"action": "clearChart"}"#)
            .unwrap_err();
        assert!(err.contains("untrusted origin"));
    }
}
