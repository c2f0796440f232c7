use secrecy::SecretString;

/// Username and password used to answer Digest challenges.
///
/// Immutable once handed to a [`DeviceClient`](crate::DeviceClient);
/// the password never leaves the process in clear text.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}
