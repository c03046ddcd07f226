use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::GatewayError;
use crate::types::{DeviceMode, DeviceSnapshot, Temperature};

pub const DEFAULT_BASE_URL: &str = "https://salus-it500.com";

const LOGIN_PATH: &str = "/public/login.php";
const CONTROL_PATH: &str = "/public/control.php";
const STATUS_PATH: &str = "/public/ajax_device_values.php";
const SET_PATH: &str = "/includes/set.php";

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

const SNIPPET_LEN: usize = 300;

const DEFAULT_MODE_FLAG: &str = "1";
const DEFAULT_OUTPUT_FLAG: &str = "0";

/// Tried in order; the first pattern that matches anywhere wins.
static TOKEN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?i)id=["']token["'][^>]*value=["']([^"']+)["']"#,
        r#"(?i)name=["']token["'][^>]*value=["']([^"']+)["']"#,
        r#"(?i)token'\s*:\s*'([^']+)'"#,
        r#"(?i)"token"\s*:\s*"([^"]+)""#,
        r#"(?i)token\s*=\s*['"]([^'"]+)['"]"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("token pattern is a valid regex"))
    .collect()
});

#[derive(Debug, Clone)]
pub struct Endpoints {
    base_url: String,
}

impl Endpoints {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn login(&self) -> String {
        format!("{}{LOGIN_PATH}", self.base_url)
    }

    pub fn control(&self) -> String {
        format!("{}{CONTROL_PATH}", self.base_url)
    }

    pub fn status(&self) -> String {
        format!("{}{STATUS_PATH}", self.base_url)
    }

    pub fn set(&self) -> String {
        format!("{}{SET_PATH}", self.base_url)
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

pub fn login_form<'a>(username: &'a str, password: &'a str) -> [(&'static str, &'a str); 3] {
    [("IDemail", username), ("password", password), ("login", "Login")]
}

pub fn control_query(device_id: &str) -> [(&'static str, &str); 1] {
    [("devId", device_id)]
}

pub fn status_query<'a>(token: &'a str, device_id: &'a str) -> [(&'static str, &'a str); 2] {
    [("token", token), ("devId", device_id)]
}

/// Body of the single `set.php` command. The setpoint is omitted when unknown.
pub fn set_form(
    token: &str,
    device_id: &str,
    off: bool,
    setpoint: Option<Temperature>,
) -> Vec<(&'static str, String)> {
    let mode = if off { DeviceMode::Off } else { DeviceMode::On };
    let mut form = vec![
        ("token", token.to_string()),
        ("devId", device_id.to_string()),
        ("heatOnOff", mode.as_salus_flag().to_string()),
    ];
    if let Some(sp) = setpoint {
        form.push(("currentSetPoint", sp.to_salus_setpoint()));
    }
    form
}

pub fn extract_token(html: &str) -> Option<String> {
    TOKEN_PATTERNS
        .iter()
        .find_map(|re| re.captures(html))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Bounded, single-line excerpt of a page for diagnostics.
pub fn snippet(html: &str) -> String {
    html.chars()
        .take(SNIPPET_LEN)
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

/// Parse an `ajax_device_values.php` body into an available snapshot.
pub fn parse_status_body(body: &str) -> Result<DeviceSnapshot, GatewayError> {
    if body.trim().is_empty() {
        return Err(GatewayError::EmptyResponse);
    }
    let data: Value =
        serde_json::from_str(body).map_err(|e| GatewayError::InvalidBody(e.to_string()))?;
    match &data {
        Value::Object(map) if !map.is_empty() => {}
        _ => return Err(GatewayError::EmptyResponse),
    }

    let mode_flag = flag_field(&data, "CH1heatOnOff", DEFAULT_MODE_FLAG);
    let output_flag = flag_field(&data, "CH1heatOnOffStatus", DEFAULT_OUTPUT_FLAG);
    let is_heating = output_flag == "1";

    Ok(DeviceSnapshot {
        current_temperature: temperature_field(&data, "CH1currentRoomTemp"),
        target_temperature: temperature_field(&data, "CH1currentSetPoint"),
        mode: DeviceMode::from_salus_flag(&mode_flag),
        heating_output_raw: Some(output_flag),
        is_heating: Some(is_heating),
        available: true,
        last_updated: None,
    })
}

fn temperature_field(data: &Value, key: &str) -> Option<Temperature> {
    let value = match data.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    value.is_finite().then(|| Temperature::from_celsius(value))
}

/// `default` applies only to an absent key. An explicit `null` is present but
/// empty, so it never equals "1".
fn flag_field(data: &Value, key: &str, default: &str) -> String {
    match data.get(key) {
        None => default.to_string(),
        Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
