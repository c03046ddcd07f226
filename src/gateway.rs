use std::sync::Mutex;

use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::GatewayError;
use crate::logger::with_logger;
use crate::protocol;
use crate::session::SessionManager;
use crate::types::{DeviceSnapshot, Temperature};

/// Reads and writes channel 1 of one device through its session.
pub struct DeviceGateway {
    session: SessionManager,
    last_setpoint: Mutex<Option<Temperature>>,
}

impl DeviceGateway {
    pub fn new(session: SessionManager) -> Self {
        Self {
            session,
            last_setpoint: Mutex::new(None),
        }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Last setpoint read from or sent to the device.
    pub fn last_setpoint(&self) -> Option<Temperature> {
        self.last_setpoint.lock().ok().and_then(|sp| *sp)
    }

    pub async fn read_status(&self) -> Result<DeviceSnapshot, GatewayError> {
        let token = self.session.ensure_valid_session().await?;
        let url = self.session.endpoints().status();
        let query = protocol::status_query(&token, self.session.device_id());
        debug!(url = %url, device = %self.session.device_id(), "reading device status");

        let resp = self.session.http().get(&url).query(&query[..]).send().await?;
        let status = resp.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            warn!(status = status.as_u16(), "portal rejected token, forcing re-login");
            self.session.invalidate().await;
            return Err(GatewayError::Unauthorized);
        }
        if !status.is_success() {
            return Err(GatewayError::Status(status.as_u16()));
        }

        let body = resp.text().await?;
        with_logger(self.session.logger(), |l| {
            let json = serde_json::from_str(&body).unwrap_or(Value::Null);
            l.log_poll(status.as_u16(), &json);
        });

        let snapshot = protocol::parse_status_body(&body)?;
        if let Some(sp) = snapshot.target_temperature {
            self.remember_setpoint(sp);
        }
        Ok(snapshot)
    }

    pub async fn write_setpoint(&self, temperature: Temperature) -> Result<(), GatewayError> {
        let temperature = temperature.to_setpoint_resolution();
        self.remember_setpoint(temperature);
        self.set(Some(temperature), false).await
    }

    /// Switch channel 1 on or off, re-sending the last known setpoint.
    pub async fn write_mode(&self, off: bool) -> Result<(), GatewayError> {
        let setpoint = self.last_setpoint();
        self.set(setpoint, off).await
    }

    async fn set(&self, setpoint: Option<Temperature>, off: bool) -> Result<(), GatewayError> {
        let token = self.session.ensure_valid_session().await?;
        let url = self.session.endpoints().set();
        let form = protocol::set_form(&token, self.session.device_id(), off, setpoint);
        debug!(url = %url, off, setpoint = ?setpoint.map(|t| t.celsius()), "sending set command");

        let resp = self.session.http().post(&url).form(&form).send().await?;
        let status = resp.status();

        with_logger(self.session.logger(), |l| {
            let pairs: Vec<(&str, &str)> = form.iter().map(|(k, v)| (*k, v.as_str())).collect();
            l.log_command("set", status.as_u16(), &pairs);
        });

        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            warn!(status = status.as_u16(), "portal rejected token on write, forcing re-login");
            self.session.invalidate().await;
        }
        if !status.is_success() {
            error!(status = status.as_u16(), "error setting data");
            return Err(GatewayError::WriteFailed(status.as_u16()));
        }
        Ok(())
    }

    fn remember_setpoint(&self, temperature: Temperature) {
        if let Ok(mut sp) = self.last_setpoint.lock() {
            *sp = Some(temperature);
        }
    }
}
