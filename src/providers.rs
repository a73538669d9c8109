use std::sync::Arc;

use duck_provider::DuckProvider;
use duck_provider_local::{LocalDuck, LOCAL_PROVIDER_ID};
use duck_provider_process::{ProcessDuck, ProcessDuckConfig, PROCESS_PROVIDER_ID};

use crate::config::EnvConfig;

pub fn provider_from_config(config: &EnvConfig) -> Result<Arc<dyn DuckProvider>, String> {
    match config.provider.as_str() {
        LOCAL_PROVIDER_ID => Ok(Arc::new(LocalDuck)),
        PROCESS_PROVIDER_ID => {
            let command = config.command.as_deref().ok_or_else(|| {
                format!("Provider '{PROCESS_PROVIDER_ID}' requires RUBBER_DUCK_COMMAND to be set")
            })?;
            let process_config = ProcessDuckConfig::from_command_line(command, config.query_timeout)
                .map_err(|error| error.to_string())?;
            let duck = ProcessDuck::new(process_config).map_err(|error| error.to_string())?;
            Ok(Arc::new(duck))
        }
        unknown => Err(format!(
            "Unsupported provider '{unknown}'. Available providers: {LOCAL_PROVIDER_ID}, {PROCESS_PROVIDER_ID}"
        )),
    }
}
