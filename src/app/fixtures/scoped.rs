use std::ops::{Deref, DerefMut};

use crate::app::errors::ProvisionError;
use crate::app::test_identity::TestIdentity;

/// Owns a [`TestIdentity`] and deletes its user when released or dropped.
///
/// `release` reports deletion failures to the caller. Dropping without
/// releasing deletes on a best-effort basis and logs failures, so a panicking
/// test still cleans up.
#[derive(Debug)]
pub struct ScopedIdentity {
    identity: TestIdentity,
    armed: bool,
}

impl ScopedIdentity {
    pub fn new(identity: TestIdentity) -> Self {
        Self {
            identity,
            armed: true,
        }
    }

    /// Delete the user now.
    pub fn release(mut self) -> Result<(), ProvisionError> {
        self.armed = false;
        self.identity.delete()
    }
}

impl Deref for ScopedIdentity {
    type Target = TestIdentity;

    fn deref(&self) -> &TestIdentity {
        &self.identity
    }
}

impl DerefMut for ScopedIdentity {
    fn deref_mut(&mut self) -> &mut TestIdentity {
        &mut self.identity
    }
}

impl Drop for ScopedIdentity {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;

        match self.identity.delete() {
            Ok(()) => {}
            Err(ProvisionError::NotFound { .. }) => {
                log_debug!("{} was already deleted", self.identity.username());
            }
            Err(e) => {
                log_warn!(
                    "Failed to delete test identity {} during cleanup: {}",
                    self.identity.username(),
                    e
                );
            }
        }
    }
}
