// Library module for c4id
// Re-exports the identifier core for the c4 binary and integration tests

pub mod c4;

/// Version of the C4 ID standard these identifiers follow.
pub const VERSION_C4: &str = "0.7.0";

/// Version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// `c4 version 0.7.0 (<os>) c4id version: <crate version>`
pub fn version_string() -> String {
    format!(
        "c4 version {} ({}) c4id version: {}",
        VERSION_C4,
        std::env::consts::OS,
        VERSION
    )
}
