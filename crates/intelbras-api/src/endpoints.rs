// Access-controller CGI endpoints
//
// Door control (accessControl.cgi), the access record log
// (recordFinder.cgi) and device identification (magicBox.cgi).

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::client::{DeviceClient, preview};
use crate::error::Error;
use crate::models::DeviceInfo;

impl DeviceClient {
    /// Trigger the door relay.
    ///
    /// `GET /cgi-bin/accessControl.cgi?action=openDoor&channel={n}`
    pub async fn open_door(&self, channel: u32) -> Result<String, Error> {
        let url = self.cgi_url(&format!(
            "cgi-bin/accessControl.cgi?action=openDoor&channel={channel}"
        ))?;
        let text = self.get_text(url).await?;
        info!(channel, response = text.trim(), "door open requested");
        Ok(text)
    }

    /// Read the door sensor.
    ///
    /// `GET /cgi-bin/accessControl.cgi?action=getDoorStatus&channel={n}`
    ///
    /// The device answers `Info.status=Open`; the value after `=` is
    /// returned lower-cased. See [`parse_door_status`].
    pub async fn door_status(&self, channel: u32) -> Result<String, Error> {
        let url = self.cgi_url(&format!(
            "cgi-bin/accessControl.cgi?action=getDoorStatus&channel={channel}"
        ))?;
        let text = self.get_text(url).await?;
        let status = parse_door_status(&text);
        debug!(channel, %status, "door status");
        Ok(status)
    }

    /// Fetch access records created in `[start_time, end_time]`
    /// (epoch seconds), undecoded.
    ///
    /// `GET /cgi-bin/recordFinder.cgi?action=find&name=AccessControlCardRec&StartTime={s}&EndTime={e}`
    pub async fn events_raw(&self, start_time: i64, end_time: i64) -> Result<Bytes, Error> {
        let url = self.cgi_url(&format!(
            "cgi-bin/recordFinder.cgi?action=find&name=AccessControlCardRec\
             &StartTime={start_time}&EndTime={end_time}"
        ))?;
        debug!(start_time, end_time, "fetching access records");
        self.get(url).await
    }

    /// Same as [`events_raw`](Self::events_raw), decoded as text.
    pub async fn events(&self, start_time: i64, end_time: i64) -> Result<String, Error> {
        let body = self.events_raw(start_time, end_time).await?;
        let text = String::from_utf8_lossy(&body).into_owned();
        debug!(preview = preview(&text), "access records response");
        Ok(text)
    }

    /// Fetch device identification.
    ///
    /// `GET /cgi-bin/magicBox.cgi?action=getDeviceInfo`
    pub async fn device_info(&self) -> Result<DeviceInfo, Error> {
        let url = self.cgi_url("cgi-bin/magicBox.cgi?action=getDeviceInfo")?;
        let text = self.get_text(url).await?;
        Ok(DeviceInfo::from_text(text))
    }

    /// Returns `true` if the device answered an authenticated request.
    pub async fn test_connection(&self) -> bool {
        match self.device_info().await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, url = %self.base_url(), "connection test failed");
                false
            }
        }
    }
}

/// Extract the door state from a `key=value` status line.
///
/// Returns the lower-cased text after the first `=`, or the trimmed raw
/// text unchanged when there is no `=`.
pub fn parse_door_status(text: &str) -> String {
    let text = text.trim();
    match text.split_once('=') {
        Some((_, value)) => value.trim().to_lowercase(),
        None => text.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn door_status_value_is_lowercased() {
        assert_eq!(parse_door_status("Info.status=Open\r\n"), "open");
        assert_eq!(parse_door_status("Info.status=Close"), "close");
    }

    #[test]
    fn door_status_without_equals_is_passed_through() {
        assert_eq!(parse_door_status("  Error  \n"), "Error");
    }
}
