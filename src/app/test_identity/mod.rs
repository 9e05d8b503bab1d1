//! Test Identity Provisioning
//!
//! [`IdentityProvisioner::provision`] takes a brand new user from temporary
//! password to enrolled software-token MFA in one call:
//!
//! ```text
//! AdminCreateUser (temporary password, welcome suppressed)
//!   -> AdminInitiateAuth            => NEW_PASSWORD_REQUIRED + session
//!   -> RespondToAuthChallenge       => MFA_SETUP + session
//!   -> AssociateSoftwareToken       => shared secret (+ session)
//!   -> VerifySoftwareToken(code)    => SUCCESS
//! ```
//!
//! The returned [`TestIdentity`] is always enrolled. Each bearer token costs
//! one sign-in code, and the provider accepts a code once per 30-second step,
//! so a second [`TestIdentity::issue_token`] inside the same step fails with
//! [`ProvisionError::MfaReplay`] before any request is sent.
//!
//! If a step after user creation fails the user stays in the pool. The
//! failure is logged at warn level with the username so it can be removed by
//! hand; nothing is retried or rolled back.

pub mod credentials;
pub mod mfa;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::app::clock::{Clock, SystemClock};
use crate::app::errors::ProvisionError;
use crate::app::identity_provider::{
    AuthStep, AuthTokens, ChallengeAnswer, ChallengeKind, CreateUserRequest,
    IdentityProviderClient, PoolConfig,
};

pub use credentials::NamingPolicy;
pub use mfa::{MfaDevice, MfaState, CODE_STEP_SECONDS};

use credentials::{generate_device_label, generate_password};
use mfa::{time_step, until_next_step};

/// Creates enrolled test identities in one pool.
#[derive(Clone)]
pub struct IdentityProvisioner {
    provider: Arc<dyn IdentityProviderClient>,
    pool: PoolConfig,
    clock: Arc<dyn Clock>,
    naming: NamingPolicy,
}

impl fmt::Debug for IdentityProvisioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityProvisioner")
            .field("pool", &self.pool)
            .field("naming", &self.naming)
            .finish_non_exhaustive()
    }
}

impl IdentityProvisioner {
    pub fn new(provider: Arc<dyn IdentityProviderClient>, pool: PoolConfig) -> Self {
        Self {
            provider,
            pool,
            clock: Arc::new(SystemClock),
            naming: NamingPolicy::default(),
        }
    }

    /// Replace the wall clock, e.g. with a `ManualClock` in tests.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_naming(mut self, naming: NamingPolicy) -> Self {
        self.naming = naming;
        self
    }

    pub fn pool(&self) -> &PoolConfig {
        &self.pool
    }

    /// Create a user and run it through password rotation and MFA enrollment.
    pub fn provision(&self) -> Result<TestIdentity, ProvisionError> {
        let username = self.naming.generate_username();
        let temporary_password = generate_password()?;

        self.provider.create_user(&CreateUserRequest {
            user_pool_id: &self.pool.user_pool_id,
            username: &username,
            email: &username,
            temporary_password: &temporary_password,
            suppress_welcome: true,
        })?;
        log_info!("Created test identity {} in {}", username, self.pool.user_pool_id);

        self.enroll(&username, &temporary_password).map_err(|e| {
            log_warn!(
                "Provisioning {} failed after creation; user left in pool {}: {}",
                username,
                self.pool.user_pool_id,
                e
            );
            e
        })
    }

    fn enroll(&self, username: &str, temporary_password: &str) -> Result<TestIdentity, ProvisionError> {
        let step = self
            .provider
            .initiate_auth(&self.pool, username, temporary_password)?;
        let session = expect_challenge("AdminInitiateAuth", step, ChallengeKind::NewPasswordRequired)?;
        trace_debug!("{} received NEW_PASSWORD_REQUIRED", username);

        let password = generate_password()?;
        let step = self.provider.respond_to_challenge(
            &self.pool.client_id,
            &session,
            &ChallengeAnswer::NewPassword {
                username: username.to_string(),
                new_password: password.clone(),
            },
        )?;
        let session = expect_challenge("RespondToAuthChallenge", step, ChallengeKind::MfaSetup)?;
        trace_debug!("{} rotated password, received MFA_SETUP", username);

        let association = self.provider.associate_software_token(&session)?;
        let session = association.session.clone().unwrap_or(session);
        let device = MfaDevice::new(&association.secret_code, generate_device_label())?;

        let now = self.clock.now();
        self.provider
            .verify_software_token(&session, &device.code_at(now), device.device_label())?;

        let mut mfa = MfaState::default();
        mfa.enroll(username, device)?;
        log_debug!("Enrolled MFA device for {}", username);

        Ok(TestIdentity {
            username: username.to_string(),
            password,
            pool: self.pool.clone(),
            mfa,
            provider: Arc::clone(&self.provider),
            clock: Arc::clone(&self.clock),
            last_sign_in_step: None,
            enrollment_step: Some(time_step(now)),
        })
    }
}

/// A provisioned, MFA-enrolled user.
pub struct TestIdentity {
    username: String,
    password: String,
    pool: PoolConfig,
    mfa: MfaState,
    provider: Arc<dyn IdentityProviderClient>,
    clock: Arc<dyn Clock>,
    last_sign_in_step: Option<u64>,
    enrollment_step: Option<u64>,
}

impl fmt::Debug for TestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestIdentity")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("pool", &self.pool)
            .field("mfa", &self.mfa)
            .field("last_sign_in_step", &self.last_sign_in_step)
            .finish_non_exhaustive()
    }
}

impl TestIdentity {
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Password of record, set during enrollment.
    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn pool(&self) -> &PoolConfig {
        &self.pool
    }

    pub fn mfa_state(&self) -> &MfaState {
        &self.mfa
    }

    pub fn device_label(&self) -> Option<&str> {
        self.mfa.device().map(MfaDevice::device_label)
    }

    /// Code for the current time step. Does not consume it.
    pub fn current_code(&self) -> Result<String, ProvisionError> {
        self.mfa.code_at(&self.username, self.clock.now())
    }

    pub fn add_to_group(&self, group_name: &str) -> Result<(), ProvisionError> {
        self.provider
            .add_user_to_group(&self.pool.user_pool_id, &self.username, group_name)?;
        log_info!("Added {} to group {}", self.username, group_name);
        Ok(())
    }

    /// Sign in with password and TOTP and return the access token.
    pub fn issue_token(&mut self) -> Result<String, ProvisionError> {
        Ok(self.issue_tokens()?.access_token)
    }

    /// Sign in with password and TOTP and return every token the provider
    /// issued.
    pub fn issue_tokens(&mut self) -> Result<AuthTokens, ProvisionError> {
        let now = self.clock.now();
        let code = self.mfa.code_at(&self.username, now)?;
        let step = time_step(now);

        if self.last_sign_in_step == Some(step) {
            return Err(ProvisionError::MfaReplay {
                username: self.username.clone(),
                retry_after: until_next_step(now),
            });
        }

        let session = match self
            .provider
            .initiate_auth(&self.pool, &self.username, &self.password)?
        {
            AuthStep::Challenge {
                kind: ChallengeKind::SoftwareTokenMfa,
                session,
            } => session,
            AuthStep::Authenticated(tokens) => {
                log_warn!("{} signed in without an MFA challenge", self.username);
                return Ok(tokens);
            }
            other => {
                return Err(ProvisionError::UnexpectedChallenge {
                    operation: "AdminInitiateAuth",
                    expected: "SOFTWARE_TOKEN_MFA",
                    received: other.describe(),
                })
            }
        };

        let answer = ChallengeAnswer::SoftwareTokenMfa {
            username: self.username.clone(),
            code,
        };
        match self
            .provider
            .respond_to_challenge(&self.pool.client_id, &session, &answer)
        {
            Ok(AuthStep::Authenticated(tokens)) => {
                self.last_sign_in_step = Some(step);
                log_info!("Issued token for {}", self.username);
                Ok(tokens)
            }
            Ok(other) => Err(ProvisionError::UnexpectedChallenge {
                operation: "RespondToAuthChallenge",
                expected: "authentication result",
                received: other.describe(),
            }),
            Err(ProvisionError::MfaReplay { username, .. }) => {
                // provider saw this step's code already
                self.last_sign_in_step = Some(step);
                Err(ProvisionError::MfaReplay {
                    username,
                    retry_after: until_next_step(self.clock.now()),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Block until a code newer than every code used so far (sign-in and
    /// enrollment) is available. Returns the time waited.
    pub fn wait_for_fresh_code(&self) -> Duration {
        let Some(used) = self.last_sign_in_step.max(self.enrollment_step) else {
            return Duration::ZERO;
        };

        let mut waited = Duration::ZERO;
        loop {
            let now = self.clock.now();
            if time_step(now) > used {
                break;
            }
            let pause = until_next_step(now);
            trace_debug!("Waiting {:?} for a fresh code for {}", pause, self.username);
            self.clock.sleep(pause);
            waited += pause;
        }
        waited
    }

    /// [`wait_for_fresh_code`](Self::wait_for_fresh_code), then
    /// [`issue_token`](Self::issue_token).
    pub fn issue_token_when_ready(&mut self) -> Result<String, ProvisionError> {
        self.wait_for_fresh_code();
        self.issue_token()
    }

    /// Remove the user from the pool. The identity stays usable as a value;
    /// later provider calls report `NotFound`.
    pub fn delete(&self) -> Result<(), ProvisionError> {
        self.provider
            .delete_user(&self.pool.user_pool_id, &self.username)?;
        log_info!("Deleted test identity {}", self.username);
        Ok(())
    }

    pub fn exists(&self) -> Result<bool, ProvisionError> {
        self.provider
            .user_exists(&self.pool.user_pool_id, &self.username)
    }
}

fn expect_challenge(
    operation: &'static str,
    step: AuthStep,
    expected: ChallengeKind,
) -> Result<String, ProvisionError> {
    match step {
        AuthStep::Challenge { kind, session } if kind == expected => Ok(session),
        other => Err(ProvisionError::UnexpectedChallenge {
            operation,
            expected: match expected {
                ChallengeKind::NewPasswordRequired => "NEW_PASSWORD_REQUIRED",
                ChallengeKind::MfaSetup => "MFA_SETUP",
                ChallengeKind::SoftwareTokenMfa => "SOFTWARE_TOKEN_MFA",
                ChallengeKind::Other(_) => "challenge",
            },
            received: other.describe(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::clock::ManualClock;
    use crate::app::identity_provider::InMemoryIdentityProvider;

    fn setup(start: i64) -> (Arc<ManualClock>, Arc<InMemoryIdentityProvider>, IdentityProvisioner) {
        setup_with(start, |provider| provider)
    }

    fn setup_with<F>(
        start: i64,
        customize: F,
    ) -> (Arc<ManualClock>, Arc<InMemoryIdentityProvider>, IdentityProvisioner)
    where
        F: FnOnce(InMemoryIdentityProvider) -> InMemoryIdentityProvider,
    {
        let clock = Arc::new(ManualClock::at_unix(start));
        let provider = Arc::new(customize(
            InMemoryIdentityProvider::new(clock.clone())
                .with_pool("pool-1", "app-1")
                .with_group("pool-1", "admingroup"),
        ));
        let provisioner = IdentityProvisioner::new(
            provider.clone(),
            PoolConfig::new("pool-1", "app-1").unwrap(),
        )
        .with_clock(clock.clone());
        (clock, provider, provisioner)
    }

    #[test]
    fn test_provisioned_identity_is_enrolled() {
        let (_clock, provider, provisioner) = setup(1_700_000_000);
        let identity = provisioner.provision().unwrap();

        assert!(identity.mfa_state().is_enrolled());
        assert_eq!(identity.device_label().map(str::len), Some(10));
        assert!(credentials::satisfies_password_policy(identity.password()));
        assert!(provider.has_mfa("pool-1", identity.username()));
        assert_eq!(provider.welcome_messages(), (0, 1));
    }

    #[test]
    fn test_replay_detected_before_provider_call() {
        let (clock, provider, provisioner) = setup(1_700_000_000);
        let mut identity = provisioner.provision().unwrap();

        identity.issue_token().unwrap();

        // A deleted user would fail with NotFound if the provider were asked
        provider.delete_user("pool-1", identity.username()).unwrap();
        match identity.issue_token().unwrap_err() {
            ProvisionError::MfaReplay { retry_after, .. } => {
                assert!(retry_after <= Duration::from_secs(CODE_STEP_SECONDS));
                assert!(retry_after > Duration::ZERO);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        clock.advance(Duration::from_secs(CODE_STEP_SECONDS));
        assert!(matches!(
            identity.issue_token(),
            Err(ProvisionError::NotFound { .. })
        ));
    }

    #[test]
    fn test_provider_replay_blocks_rest_of_step() {
        // 1_700_000_000 is 20 s into its step
        let (clock, provider, provisioner) =
            setup_with(1_700_000_000, |provider| provider.with_enrollment_code_consumed());
        let mut identity = provisioner.provision().unwrap();
        assert_eq!(provider.sign_in_attempts(), 1);

        match identity.issue_token().unwrap_err() {
            ProvisionError::MfaReplay { retry_after, .. } => {
                assert_eq!(retry_after, Duration::from_secs(10));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(provider.sign_in_attempts(), 2);

        // Same step again is refused without a sign-in
        assert!(matches!(
            identity.issue_token(),
            Err(ProvisionError::MfaReplay { .. })
        ));
        assert_eq!(provider.sign_in_attempts(), 2);

        clock.advance(Duration::from_secs(CODE_STEP_SECONDS));
        assert!(identity.issue_token().unwrap().starts_with("access."));
        assert_eq!(provider.sign_in_attempts(), 3);
    }

    #[test]
    fn test_current_code_follows_the_clock() {
        let (clock, _provider, provisioner) = setup(1_700_000_000);
        let mut identity = provisioner.provision().unwrap();

        let code = identity.current_code().unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));

        clock.advance(Duration::from_secs(5));
        assert_eq!(identity.current_code().unwrap(), code);

        // Reading the code does not use it up
        clock.advance(Duration::from_secs(CODE_STEP_SECONDS));
        let next = identity.current_code().unwrap();
        identity.issue_token().unwrap();
        assert_eq!(identity.current_code().unwrap(), next);
    }

    #[test]
    fn test_unenrolled_identity_has_no_code() {
        let (clock, provider, provisioner) = setup(1_700_000_000);
        let mut identity = TestIdentity {
            username: "testuser+zzzzz@test.com".to_string(),
            password: "unused".to_string(),
            pool: provisioner.pool().clone(),
            mfa: MfaState::Unenrolled,
            provider,
            clock,
            last_sign_in_step: None,
            enrollment_step: None,
        };

        assert!(matches!(
            identity.current_code(),
            Err(ProvisionError::MfaNotConfigured { .. })
        ));
        assert!(matches!(
            identity.issue_token(),
            Err(ProvisionError::MfaNotConfigured { .. })
        ));
    }

    #[test]
    fn test_wait_for_fresh_code_covers_enrollment_step() {
        // 1_700_000_000 is 20 s into its step
        let (clock, _provider, provisioner) = setup(1_700_000_000);
        let mut identity = provisioner.provision().unwrap();

        let waited = identity.wait_for_fresh_code();
        assert_eq!(waited, Duration::from_secs(10));
        assert_eq!(clock.now().timestamp(), 1_700_000_010);

        identity.issue_token().unwrap();
        assert_eq!(identity.wait_for_fresh_code(), Duration::from_secs(30));
        assert!(identity.issue_token().is_ok());
    }

    #[test]
    fn test_issue_token_when_ready_waits_out_the_step() {
        let (clock, _provider, provisioner) = setup(1_700_000_000);
        let mut identity = provisioner.provision().unwrap();

        identity.issue_token_when_ready().unwrap();
        identity.issue_token_when_ready().unwrap();
        assert_eq!(clock.now().timestamp(), 1_700_000_040);
    }

    #[test]
    fn test_issue_tokens_returns_full_result() {
        let (_clock, _provider, provisioner) = setup(1_700_000_000);
        let mut identity = provisioner.provision().unwrap();

        let tokens = identity.issue_tokens().unwrap();
        assert!(tokens.id_token.is_some());
        assert!(tokens.refresh_token.is_some());
        assert_eq!(tokens.token_type.as_deref(), Some("Bearer"));
    }

    #[test]
    fn test_missing_pool_fails_before_any_user_exists() {
        let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
        let provider = Arc::new(InMemoryIdentityProvider::new(clock.clone()));
        let provisioner = IdentityProvisioner::new(
            provider.clone(),
            PoolConfig::new("pool-missing", "app-1").unwrap(),
        )
        .with_clock(clock);

        let err = provisioner.provision().unwrap_err();
        assert_eq!(err.provider_code(), Some("ResourceNotFoundException"));
    }

    #[test]
    fn test_unknown_client_leaves_orphaned_user() {
        let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
        let provider = Arc::new(InMemoryIdentityProvider::new(clock.clone()).with_pool("pool-1", "app-1"));
        let provisioner = IdentityProvisioner::new(
            provider.clone(),
            PoolConfig::new("pool-1", "app-other").unwrap(),
        )
        .with_clock(clock);

        assert!(provisioner.provision().is_err());
        assert_eq!(provider.user_count("pool-1"), 1);
    }

    #[test]
    fn test_expect_challenge_reports_what_arrived() {
        let err = expect_challenge(
            "RespondToAuthChallenge",
            AuthStep::Challenge {
                kind: ChallengeKind::Other("SMS_MFA".to_string()),
                session: "s".to_string(),
            },
            ChallengeKind::MfaSetup,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Expected MFA_SETUP challenge during RespondToAuthChallenge, got SMS_MFA"
        );
    }

    #[test]
    fn test_debug_hides_password() {
        let (_clock, _provider, provisioner) = setup(1_700_000_000);
        let identity = provisioner.provision().unwrap();
        assert!(!format!("{:?}", identity).contains(identity.password()));
    }
}
