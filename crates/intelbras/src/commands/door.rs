//! Door command handlers.

use serde::Serialize;

use intelbras_core::{Device, DoorState};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct OpenResult<'a> {
    channel: u32,
    response: &'a str,
}

#[derive(Serialize)]
struct StatusResult<'a> {
    channel: u32,
    state: &'a DoorState,
}

pub async fn open(device: &Device, global: &GlobalOpts) -> Result<(), CliError> {
    let channel = device.config().channel;
    let response = device.open_door().await?;
    let result = OpenResult {
        channel,
        response: response.trim(),
    };

    let out = output::render_single(global.output, &result, |r| {
        format!("Door opened (channel {}): {}", r.channel, r.response)
    })?;
    output::print_output(&out);
    Ok(())
}

pub async fn status(device: &Device, global: &GlobalOpts) -> Result<(), CliError> {
    let state = device.door_state().await?;
    let result = StatusResult {
        channel: device.config().channel,
        state: &state,
    };

    let color = output::should_color(global.color);
    let out = output::render_single(global.output, &result, |r| {
        format!(
            "Door (channel {}): {}",
            r.channel,
            output::door_state_label(r.state, color)
        )
    })?;
    output::print_output(&out);
    Ok(())
}
