pub mod client;
pub mod nodes;
pub mod pods;

/// Default user agent for `podloop` - automatically uses the package version
///
/// All modules should use `client::new(Some(USER_AGENT), ..)` for
/// consistency so API calls are identifiable in audit logs.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
