//! Resource table: the live mapping from resource path to owning node
//!
//! This is the dispatcher the admission pipeline attaches to. The update
//! route consults it for every request on a per-device path.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, PoisonError, RwLock};

use crate::admission::Dispatcher;
use crate::{Error, Result};

/// Paths currently served, keyed by path
#[derive(Debug, Clone)]
pub struct ResourceTable {
    routes: Arc<RwLock<HashMap<String, IpAddr>>>,
    well_known_path: String,
}

impl ResourceTable {
    /// Create an empty table; `well_known_path` can never be attached
    #[must_use]
    pub fn new(well_known_path: impl Into<String>) -> Self {
        Self {
            routes: Arc::new(RwLock::new(HashMap::new())),
            well_known_path: well_known_path.into(),
        }
    }

    /// The shared registration path
    #[must_use]
    pub fn well_known_path(&self) -> &str {
        &self.well_known_path
    }

    /// Owner of an attached path
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<IpAddr> {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .copied()
    }

    /// Number of attached paths
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing is attached yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Dispatcher for ResourceTable {
    fn attach(&self, path: &str, address: IpAddr) -> Result<()> {
        let failure = |reason: &str| Error::AttachmentFailure {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        if path.is_empty() {
            return Err(failure("empty path"));
        }
        if path == self.well_known_path {
            return Err(failure("path is reserved for registration"));
        }

        let mut routes = self.routes.write().unwrap_or_else(PoisonError::into_inner);
        match routes.get(path) {
            Some(owner) if *owner == address => Ok(()),
            Some(_) => Err(failure("path already bound to another device")),
            None => {
                routes.insert(path.to_string(), address);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv6Addr;

    use super::*;

    fn addr(last: u16) -> IpAddr {
        IpAddr::V6(Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, last))
    }

    #[test]
    fn attach_and_resolve() {
        let table = ResourceTable::new("common");
        table.attach("abc", addr(1)).unwrap();
        assert_eq!(table.resolve("abc"), Some(addr(1)));
        assert_eq!(table.resolve("xyz"), None);
    }

    #[test]
    fn duplicate_path_is_refused() {
        let table = ResourceTable::new("common");
        table.attach("abc", addr(1)).unwrap();
        let err = table.attach("abc", addr(2)).unwrap_err();
        assert!(matches!(err, Error::AttachmentFailure { .. }));
        assert_eq!(table.resolve("abc"), Some(addr(1)));
    }

    #[test]
    fn reattaching_same_owner_is_ok() {
        let table = ResourceTable::new("common");
        table.attach("abc", addr(1)).unwrap();
        table.attach("abc", addr(1)).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn well_known_path_is_reserved() {
        let table = ResourceTable::new("common");
        assert!(table.attach("common", addr(1)).is_err());
        assert!(table.attach("", addr(1)).is_err());
        assert!(table.is_empty());
    }
}
