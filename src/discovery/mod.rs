//! Service discovery using mDNS/DNS-SD
//!
//! Advertises the gateway on the local network so nodes can discover it
//! without manual configuration

pub mod mdns;

pub use mdns::{Advertisement, MdnsAdvertiser};
