//! TOTP device state for a test identity.

use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use totp_rs::{Algorithm, Secret, TOTP};

use crate::app::errors::ProvisionError;

/// Length of one code validity window, in seconds.
pub const CODE_STEP_SECONDS: u64 = 30;

/// Digits per code (Cognito software tokens are 6-digit SHA1 TOTP).
const CODE_DIGITS: usize = 6;

/// Time step a timestamp falls into.
pub fn time_step(at: DateTime<Utc>) -> u64 {
    at.timestamp().max(0) as u64 / CODE_STEP_SECONDS
}

/// Time remaining until the step after the one containing `at` begins.
pub fn until_next_step(at: DateTime<Utc>) -> Duration {
    let step_ms = CODE_STEP_SECONDS * 1_000;
    let millis = at.timestamp_millis().max(0) as u64;
    Duration::from_millis(step_ms - millis % step_ms)
}

/// An enrolled software token: the shared secret's TOTP generator plus the
/// friendly device name registered with the provider.
#[derive(Clone)]
pub struct MfaDevice {
    totp: TOTP,
    device_label: String,
}

impl MfaDevice {
    /// Build a device from the provider's base32 shared secret.
    pub fn new(secret_base32: &str, device_label: impl Into<String>) -> Result<Self, ProvisionError> {
        let secret = Secret::Encoded(secret_base32.trim().to_string())
            .to_bytes()
            .map_err(|e| ProvisionError::InvalidSecret(e.to_string()))?;

        let totp = TOTP::new(Algorithm::SHA1, CODE_DIGITS, 1, CODE_STEP_SECONDS, secret)
            .map_err(|e| ProvisionError::InvalidSecret(e.to_string()))?;

        Ok(Self {
            totp,
            device_label: device_label.into(),
        })
    }

    /// Code valid during the time step containing `at`.
    pub fn code_at(&self, at: DateTime<Utc>) -> String {
        self.totp.generate(at.timestamp().max(0) as u64)
    }

    /// Friendly device name sent with the verification request.
    pub fn device_label(&self) -> &str {
        &self.device_label
    }
}

impl fmt::Debug for MfaDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MfaDevice")
            .field("device_label", &self.device_label)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Enrollment state of a test identity.
///
/// ```text
/// Unenrolled --enroll--> Enrolled(device)
/// ```
///
/// There is no transition back: the shared secret is set at most once.
#[derive(Debug, Clone, Default)]
pub enum MfaState {
    /// No software token associated yet.
    #[default]
    Unenrolled,
    /// Software token verified with the provider.
    Enrolled(MfaDevice),
}

impl MfaState {
    /// Whether a device has been enrolled.
    pub fn is_enrolled(&self) -> bool {
        matches!(self, MfaState::Enrolled(_))
    }

    /// The enrolled device, if any.
    pub fn device(&self) -> Option<&MfaDevice> {
        match self {
            MfaState::Enrolled(device) => Some(device),
            MfaState::Unenrolled => None,
        }
    }

    /// Code for the step containing `at`.
    pub fn code_at(&self, username: &str, at: DateTime<Utc>) -> Result<String, ProvisionError> {
        match self {
            MfaState::Enrolled(device) => Ok(device.code_at(at)),
            MfaState::Unenrolled => Err(ProvisionError::MfaNotConfigured {
                username: username.to_string(),
            }),
        }
    }

    /// Transition to `Enrolled`. Fails if a device is already present.
    pub fn enroll(&mut self, username: &str, device: MfaDevice) -> Result<(), ProvisionError> {
        if self.is_enrolled() {
            return Err(ProvisionError::MfaAlreadyEnrolled {
                username: username.to_string(),
            });
        }
        *self = MfaState::Enrolled(device);
        Ok(())
    }
}
