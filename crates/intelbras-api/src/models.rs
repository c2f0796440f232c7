use indexmap::IndexMap;
use serde::Serialize;

/// Identification block returned by `magicBox.cgi?action=getDeviceInfo`.
///
/// The device answers with `key=value` lines (`deviceType=SS 3542 MF W`,
/// `serialNumber=...`); anything else is kept only in `raw`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub fields: IndexMap<String, String>,
    pub raw: String,
}

impl DeviceInfo {
    pub fn from_text(raw: String) -> Self {
        let fields = raw
            .lines()
            .filter_map(|line| line.trim().split_once('='))
            .filter(|(key, _)| !key.is_empty())
            .map(|(key, value)| (key.trim().to_owned(), value.trim().to_owned()))
            .collect();
        Self { fields, raw }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn device_type(&self) -> Option<&str> {
        self.get("deviceType")
    }

    pub fn serial_number(&self) -> Option<&str> {
        self.get("serialNumber")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_lines_in_order() {
        let info = DeviceInfo::from_text(
            "deviceType=SS 3542 MF W\r\nserialNumber=ABC123\r\ngarbage\r\n".into(),
        );
        assert_eq!(info.device_type(), Some("SS 3542 MF W"));
        assert_eq!(info.serial_number(), Some("ABC123"));
        assert_eq!(
            info.fields.keys().collect::<Vec<_>>(),
            ["deviceType", "serialNumber"]
        );
        assert!(info.raw.contains("garbage"));
    }
}
