//! Start the HTTP gateway server.

use hearth_gateway::AppState;
use std::sync::Arc;

pub async fn run(port: Option<u16>) -> anyhow::Result<()> {
    let config = super::load_config()?;
    let host = config.gateway.host.clone();
    let port = port.unwrap_or(config.gateway.port);
    let state = Arc::new(AppState::from_config(config));
    hearth_gateway::serve(state, &host, port).await?;
    Ok(())
}
