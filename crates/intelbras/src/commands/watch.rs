//! Continuous event polling until interrupted.

use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use intelbras_core::Device;

use crate::error::CliError;

/// Print every newly observed access event as one JSON line until Ctrl-C.
pub async fn handle(device: &Device) -> Result<(), CliError> {
    let mut events = device.subscribe_events();
    device.start().await?;
    info!("watching for access events, press Ctrl-C to stop");

    let result = loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                break signal.map_err(CliError::from);
            }
            event = events.recv() => match event {
                Ok(event) => match serde_json::to_string(&*event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => break Err(e.into()),
                },
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "output fell behind, events dropped");
                }
                Err(RecvError::Closed) => break Ok(()),
            },
        }
    };

    device.stop().await;
    result
}
