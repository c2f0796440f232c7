//! Command dispatch: bridges CLI args -> device calls -> output formatting.

pub mod config_cmd;
pub mod device;
pub mod door;
pub mod events;
pub mod watch;

use intelbras_core::Device;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a device-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, device: &Device, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::OpenDoor => door::open(device, global).await,
        Command::Status => door::status(device, global).await,
        Command::Events(args) => events::handle(device, args, global).await,
        Command::Watch => watch::handle(device).await,
        Command::Info => device::info(device, global).await,
        Command::Check => device::check(device, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
