//! Device diagnostics: identification and reachability.

use intelbras_core::Device;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

pub async fn info(device: &Device, global: &GlobalOpts) -> Result<(), CliError> {
    let info = device.device_info().await?;
    let out = output::render_single(global.output, &info.fields, |fields| {
        let width = fields.keys().map(String::len).max().unwrap_or(0);
        fields
            .iter()
            .map(|(k, v)| format!("{k:<width$}  {v}"))
            .collect::<Vec<_>>()
            .join("\n")
    })?;
    output::print_output(&out);
    Ok(())
}

/// Exit non-zero unless the device answers an authenticated request.
pub async fn check(device: &Device, global: &GlobalOpts) -> Result<(), CliError> {
    let url = device.config().url.to_string();
    if !device.test_connection().await {
        return Err(CliError::ConnectionFailed {
            url,
            source: "device did not answer an authenticated request".into(),
        });
    }

    let out = output::render_single(
        global.output,
        &serde_json::json!({ "url": url, "reachable": true }),
        |_| format!("OK: {url} is reachable"),
    )?;
    output::print_output(&out);
    Ok(())
}
