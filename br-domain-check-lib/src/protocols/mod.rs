//! Protocol implementations for availability lookups.

/// RDAP (Registration Data Access Protocol) implementation
pub mod rdap;

/// WHOIS protocol implementation
pub mod whois;

pub use rdap::RdapClient;
pub use whois::{WhoisClient, WHOIS_PORT};
