use crate::client::DeviceApi;
use crate::models::sdm::Command;
use log::{error, info};
use serde_json::Value;
use std::sync::Arc;

/// Sends remote mutations for one device. Failures are logged, never raised:
/// the device stays the source of truth and the next read shows what happened.
pub struct CommandExecutor {
    api: Arc<dyn DeviceApi>,
    device_id: String,
}

impl CommandExecutor {
    pub fn new(api: Arc<dyn DeviceApi>, device_id: impl Into<String>) -> Self {
        CommandExecutor {
            api,
            device_id: device_id.into(),
        }
    }

    pub async fn execute(&self, command: &Command) {
        let params = Value::Object(command.params.clone());
        info!("Device {}: executing {} {}", self.device_id, command.name, params);

        match self.api.execute_command(&self.device_id, command).await {
            Ok(resp) if resp.is_ok() => {}
            Ok(resp) => error!(
                "Device {}: {} rejected with http {}",
                self.device_id, command.name, resp.status
            ),
            Err(e) => error!("Device {}: {} failed: {}", self.device_id, command.name, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{thermostat_document, FakeApi};

    #[tokio::test]
    async fn sends_command_to_device() {
        let api = Arc::new(FakeApi::new(thermostat_document()));
        let executor = CommandExecutor::new(api.clone(), "device-1");

        executor.execute(&Command::set_heat(21.5)).await;

        assert_eq!(api.commands(), vec![Command::set_heat(21.5)]);
    }

    #[tokio::test]
    async fn failures_are_swallowed() {
        let api = Arc::new(FakeApi::new(thermostat_document()));
        let executor = CommandExecutor::new(api.clone(), "device-1");

        api.set_command_status(400);
        executor.execute(&Command::set_cool(25.0)).await;
        api.fail_transport(true);
        executor.execute(&Command::set_eco(true)).await;

        assert_eq!(api.commands().len(), 2);
    }
}
