//! In-memory [`DeviceApi`] used by unit tests.

use crate::client::{ApiResponse, ClientError, DeviceApi};
use crate::models::sdm::Command;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// An online Celsius thermostat in HEAT mode with a 20 °C heat setpoint.
pub fn thermostat_document() -> Value {
    json!({
        "name": "enterprises/project-1/devices/device-1",
        "type": "sdm.devices.types.THERMOSTAT",
        "traits": {
            "sdm.devices.traits.Connectivity": {"status": "ONLINE"},
            "sdm.devices.traits.Humidity": {"ambientHumidityPercent": 45.0},
            "sdm.devices.traits.Settings": {"temperatureScale": "CELSIUS"},
            "sdm.devices.traits.Temperature": {"ambientTemperatureCelsius": 21.0},
            "sdm.devices.traits.ThermostatEco": {"availableModes": ["MANUAL_ECO", "OFF"], "mode": "OFF"},
            "sdm.devices.traits.ThermostatHvac": {"status": "HEATING"},
            "sdm.devices.traits.ThermostatMode": {"availableModes": ["HEAT", "COOL", "HEATCOOL", "OFF"], "mode": "HEAT"},
            "sdm.devices.traits.ThermostatTemperatureSetpoint": {"heatCelsius": 20.0}
        }
    })
}

pub struct FakeApi {
    document: Mutex<Value>,
    read_status: AtomicU16,
    command_status: AtomicU16,
    transport_down: AtomicBool,
    delay: Duration,
    reads: AtomicUsize,
    commands: Mutex<Vec<Command>>,
}

impl FakeApi {
    pub fn new(document: Value) -> Self {
        FakeApi {
            document: Mutex::new(document),
            read_status: AtomicU16::new(200),
            command_status: AtomicU16::new(200),
            transport_down: AtomicBool::new(false),
            delay: Duration::ZERO,
            reads: AtomicUsize::new(0),
            commands: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().unwrap().clone()
    }

    pub fn set_read_status(&self, status: u16) {
        self.read_status.store(status, Ordering::SeqCst);
    }

    pub fn set_command_status(&self, status: u16) {
        self.command_status.store(status, Ordering::SeqCst);
    }

    pub fn fail_transport(&self, down: bool) {
        self.transport_down.store(down, Ordering::SeqCst);
    }

    /// Replace one trait group of the served document.
    pub fn set_trait(&self, key: &str, value: Value) {
        let mut doc = self.document.lock().unwrap();
        doc["traits"][key] = value;
    }

    pub fn remove_trait(&self, key: &str) {
        let mut doc = self.document.lock().unwrap();
        if let Some(traits) = doc["traits"].as_object_mut() {
            traits.remove(key);
        }
    }

    pub fn set_connectivity(&self, status: &str) {
        self.set_trait("sdm.devices.traits.Connectivity", json!({ "status": status }));
    }
}

#[async_trait]
impl DeviceApi for FakeApi {
    async fn get_device(&self, _device_id: &str) -> Result<ApiResponse<Value>, ClientError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.transport_down.load(Ordering::SeqCst) {
            return Err(ClientError::Transport("connection refused".into()));
        }

        let status = self.read_status.load(Ordering::SeqCst);
        let body = if status == 200 {
            self.document.lock().unwrap().clone()
        } else {
            Value::Null
        };
        Ok(ApiResponse { status, body })
    }

    async fn execute_command(&self, _device_id: &str, command: &Command) -> Result<ApiResponse<()>, ClientError> {
        self.commands.lock().unwrap().push(command.clone());
        if self.transport_down.load(Ordering::SeqCst) {
            return Err(ClientError::Transport("connection refused".into()));
        }
        Ok(ApiResponse {
            status: self.command_status.load(Ordering::SeqCst),
            body: (),
        })
    }
}
