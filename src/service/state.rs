//! Service state management.

use std::sync::Arc;

use crate::lookup::LookupService;

/// Shared service state: the lookup service behind an `Arc`.
pub struct ServiceState {
    /// The lookup service answering point queries.
    pub lookup: Arc<LookupService>,
}

impl ServiceState {
    /// Wrap a lookup service.
    pub fn new(lookup: LookupService) -> Self {
        Self {
            lookup: Arc::new(lookup),
        }
    }

    /// Share an existing lookup service.
    pub fn from_shared(lookup: Arc<LookupService>) -> Self {
        Self { lookup }
    }
}

impl Clone for ServiceState {
    fn clone(&self) -> Self {
        Self {
            lookup: Arc::clone(&self.lookup),
        }
    }
}
