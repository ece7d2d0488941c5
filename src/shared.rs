//! Active profile shared between the streaming path and the probe thread.
//!
//! Readers take a cheap `Arc` snapshot under a short read lock; the only
//! writers are a profile reload and a finished probe session.

use crate::grid::GridProfile;
use parking_lot::RwLock;
use std::sync::Arc;

/// The selected profile and its name
#[derive(Debug, Clone)]
pub struct ActiveProfile {
    pub name: String,
    pub profile: Arc<GridProfile>,
}

/// Cached active profile, cloned handles share the same cache
#[derive(Debug, Clone)]
pub struct SharedProfile {
    inner: Arc<RwLock<ActiveProfile>>,
}

impl SharedProfile {
    pub fn new(name: &str, profile: GridProfile) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ActiveProfile {
                name: name.to_string(),
                profile: Arc::new(profile),
            })),
        }
    }

    /// Current profile data
    #[inline]
    pub fn snapshot(&self) -> Arc<GridProfile> {
        Arc::clone(&self.inner.read().profile)
    }

    /// Current profile data and name
    pub fn current(&self) -> ActiveProfile {
        self.inner.read().clone()
    }

    /// Point the cache at another (or reloaded) profile
    pub fn replace(&self, name: &str, profile: GridProfile) {
        let mut active = self.inner.write();
        active.name = name.to_string();
        active.profile = Arc::new(profile);
    }

    /// Install a freshly probed profile if `name` is still the active one.
    ///
    /// Returns false when the operator switched profiles in the meantime.
    pub fn commit(&self, name: &str, profile: GridProfile) -> bool {
        let mut active = self.inner.write();
        if active.name != name {
            return false;
        }
        active.profile = Arc::new(profile);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_survives_replace() {
        let shared = SharedProfile::new("a", GridProfile::default());
        let before = shared.snapshot();
        shared.replace(
            "b",
            GridProfile {
                lift: 3.0,
                ..Default::default()
            },
        );
        assert_eq!(before.lift, 0.0);
        assert_eq!(shared.snapshot().lift, 3.0);
        assert_eq!(shared.current().name, "b");
    }

    #[test]
    fn test_commit_requires_same_profile() {
        let shared = SharedProfile::new("a", GridProfile::default());
        let probed = GridProfile::default().with_matrix(vec![[0.0; 3]; 25], 1.0);
        assert!(!shared.commit("b", probed.clone()));
        assert!(!shared.snapshot().has_matrix());
        assert!(shared.commit("a", probed));
        assert_eq!(shared.snapshot().matrix.len(), 25);
    }
}
