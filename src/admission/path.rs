//! Resource path allocation
//!
//! Every admitted node gets its own random token. Paths are never revoked,
//! so uniqueness is checked against every path ever handed out, not just the
//! ones currently registered.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use rand::Rng;
use rand::distributions::Alphanumeric;

/// Default token length
pub const DEFAULT_PATH_LEN: usize = 16;

/// Allocates collision-free resource paths
#[derive(Debug, Clone)]
pub struct PathAllocator {
    issued: Arc<Mutex<HashSet<String>>>,
    len: usize,
}

impl PathAllocator {
    /// Create an allocator producing `len`-character tokens
    ///
    /// `reserved` paths (such as the shared registration path) are never
    /// handed out.
    #[must_use]
    pub fn new<I, S>(len: usize, reserved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            issued: Arc::new(Mutex::new(reserved.into_iter().map(Into::into).collect())),
            len: len.max(1),
        }
    }

    /// Allocate a fresh path
    pub fn allocate(&self) -> String {
        let mut issued = self.issued.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            let candidate: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(self.len)
                .map(char::from)
                .collect();
            if issued.insert(candidate.clone()) {
                return candidate;
            }
            tracing::debug!(path = %candidate, "resource path collision, retrying");
        }
    }

    /// Number of paths issued or reserved
    #[must_use]
    pub fn issued_count(&self) -> usize {
        self.issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for PathAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_PATH_LEN, std::iter::empty::<String>())
    }
}
