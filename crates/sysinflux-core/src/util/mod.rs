//! Utility modules for sysinflux.

mod files;
mod host;

pub use files::{read_secret, write_pidfile};
pub use host::{fqdn, hostname};
