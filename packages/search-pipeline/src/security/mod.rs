//! Security primitives: credential redaction and outbound URL checks.

pub mod credentials;
pub mod url_guard;

pub use credentials::ProviderCredentials;
pub use url_guard::UrlGuard;
