//! In-Process Identity Provider
//!
//! Behaves like a Cognito user pool that requires software-token MFA:
//!
//! - users created by an admin start with a temporary password and must answer
//!   `NEW_PASSWORD_REQUIRED` on first sign-in
//! - users without a verified software token get `MFA_SETUP`
//! - enrolled users get `SOFTWARE_TOKEN_MFA` and must present the code for
//!   the current 30-second step, which is accepted once
//! - sessions are single use; every step hands out a fresh one
//!
//! Failures use the same service codes Cognito returns and go through
//! [`ProvisionError::from_service_code`].

#![warn(clippy::all, rust_2018_idioms)]

use rand::RngCore;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use totp_rs::Secret;

use crate::app::clock::{Clock, SystemClock};
use crate::app::errors::ProvisionError;
use crate::app::test_identity::mfa::{time_step, MfaDevice};

use super::types::{
    AuthStep, AuthTokens, ChallengeAnswer, ChallengeKind, CreateUserRequest, PoolConfig,
    SoftwareTokenAssociation,
};
use super::IdentityProviderClient;

const SECRET_BYTES: usize = 20;
const TOKEN_LIFETIME_SECONDS: i32 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionStage {
    NewPassword,
    MfaSetup,
    AwaitingVerification,
    SoftwareTokenMfa,
}

#[derive(Debug, Clone)]
struct Session {
    user_pool_id: String,
    client_id: String,
    username: String,
    stage: SessionStage,
}

#[derive(Debug, Clone)]
struct UserRecord {
    password: String,
    temporary_password: bool,
    pending_secret: Option<String>,
    mfa_secret: Option<String>,
    groups: BTreeSet<String>,
    last_sign_in_step: Option<u64>,
}

#[derive(Debug, Clone, Default)]
struct PoolRecord {
    clients: BTreeSet<String>,
    groups: BTreeSet<String>,
    users: HashMap<String, UserRecord>,
}

#[derive(Debug, Default)]
struct State {
    pools: HashMap<String, PoolRecord>,
    sessions: HashMap<String, Session>,
    next_id: u64,
    suppressed_welcomes: usize,
    sent_welcomes: usize,
    sign_in_attempts: usize,
}

impl State {
    fn pool(&self, operation: &'static str, user_pool_id: &str) -> Result<&PoolRecord, ProvisionError> {
        self.pools
            .get(user_pool_id)
            .ok_or_else(|| missing_pool(operation, user_pool_id))
    }

    fn pool_mut(
        &mut self,
        operation: &'static str,
        user_pool_id: &str,
    ) -> Result<&mut PoolRecord, ProvisionError> {
        self.pools
            .get_mut(user_pool_id)
            .ok_or_else(|| missing_pool(operation, user_pool_id))
    }

    fn user_mut(
        &mut self,
        operation: &'static str,
        user_pool_id: &str,
        username: &str,
    ) -> Result<&mut UserRecord, ProvisionError> {
        self.pool_mut(operation, user_pool_id)?
            .users
            .get_mut(username)
            .ok_or_else(|| user_not_found(operation, username))
    }

    fn open_session(&mut self, template: &Session, stage: SessionStage) -> String {
        self.next_id += 1;
        let id = format!("session-{:06}", self.next_id);
        self.sessions.insert(
            id.clone(),
            Session {
                stage,
                ..template.clone()
            },
        );
        id
    }

    /// Remove and return a session; each one can be used once.
    fn take_session(&mut self, operation: &'static str, session: &str) -> Result<Session, ProvisionError> {
        self.sessions.remove(session).ok_or_else(|| {
            ProvisionError::from_service_code(
                operation,
                "<session user>",
                "NotAuthorizedException",
                "Invalid session for the user.",
            )
        })
    }

    fn issue_tokens(&mut self, username: &str) -> AuthTokens {
        self.next_id += 1;
        let serial = self.next_id;
        AuthTokens {
            access_token: format!("access.{}.{}", username, serial),
            id_token: Some(format!("id.{}.{}", username, serial)),
            refresh_token: Some(format!("refresh.{}.{}", username, serial)),
            expires_in: TOKEN_LIFETIME_SECONDS,
            token_type: Some("Bearer".to_string()),
        }
    }
}

/// In-memory [`IdentityProviderClient`] for tests.
pub struct InMemoryIdentityProvider {
    state: Mutex<State>,
    clock: Arc<dyn Clock>,
    enrollment_consumes_code: bool,
}

impl std::fmt::Debug for InMemoryIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("InMemoryIdentityProvider")
            .field("pools", &state.pools.len())
            .field("open_sessions", &state.sessions.len())
            .finish()
    }
}

impl Default for InMemoryIdentityProvider {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl InMemoryIdentityProvider {
    /// Empty provider verifying codes against `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            clock,
            enrollment_consumes_code: false,
        }
    }

    /// Treat the code accepted by `VerifySoftwareToken` as used for sign-in
    /// too, so a sign-in in the enrollment step is rejected as expired.
    pub fn with_enrollment_code_consumed(mut self) -> Self {
        self.enrollment_consumes_code = true;
        self
    }

    /// Register a pool with one app client.
    pub fn with_pool(self, user_pool_id: &str, client_id: &str) -> Self {
        {
            let mut state = self.lock();
            let pool = state.pools.entry(user_pool_id.to_string()).or_default();
            pool.clients.insert(client_id.to_string());
        }
        self
    }

    /// Register a group in an already registered pool.
    pub fn with_group(self, user_pool_id: &str, group_name: &str) -> Self {
        {
            let mut state = self.lock();
            if let Some(pool) = state.pools.get_mut(user_pool_id) {
                pool.groups.insert(group_name.to_string());
            } else {
                log_warn!("Ignoring group {} for unknown pool {}", group_name, user_pool_id);
            }
        }
        self
    }

    /// Groups the user belongs to, sorted. `None` if the user does not exist.
    pub fn groups_of(&self, user_pool_id: &str, username: &str) -> Option<Vec<String>> {
        let state = self.lock();
        state
            .pools
            .get(user_pool_id)?
            .users
            .get(username)
            .map(|user| user.groups.iter().cloned().collect())
    }

    /// Number of users in a pool.
    pub fn user_count(&self, user_pool_id: &str) -> usize {
        self.lock()
            .pools
            .get(user_pool_id)
            .map(|pool| pool.users.len())
            .unwrap_or(0)
    }

    /// Whether the user has a verified software token.
    pub fn has_mfa(&self, user_pool_id: &str, username: &str) -> bool {
        self.lock()
            .pools
            .get(user_pool_id)
            .and_then(|pool| pool.users.get(username))
            .map(|user| user.mfa_secret.is_some())
            .unwrap_or(false)
    }

    /// Number of `AdminInitiateAuth` calls received.
    pub fn sign_in_attempts(&self) -> usize {
        self.lock().sign_in_attempts
    }

    /// Welcome messages that would have been sent, and those suppressed.
    pub fn welcome_messages(&self) -> (usize, usize) {
        let state = self.lock();
        (state.sent_welcomes, state.suppressed_welcomes)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn verify_code(
        &self,
        operation: &'static str,
        username: &str,
        secret: &str,
        code: &str,
    ) -> Result<u64, ProvisionError> {
        let now = self.clock.now();
        let expected = MfaDevice::new(secret, "verifier")?.code_at(now);
        if expected != code {
            return Err(ProvisionError::from_service_code(
                operation,
                username,
                "CodeMismatchException",
                "Invalid code received for user",
            ));
        }
        Ok(time_step(now))
    }
}

impl IdentityProviderClient for InMemoryIdentityProvider {
    fn create_user(&self, request: &CreateUserRequest<'_>) -> Result<(), ProvisionError> {
        const OP: &str = "AdminCreateUser";
        let mut state = self.lock();
        let pool = state.pool_mut(OP, request.user_pool_id)?;

        if pool.users.contains_key(request.username) {
            return Err(ProvisionError::from_service_code(
                OP,
                request.username,
                "UsernameExistsException",
                "User account already exists",
            ));
        }

        pool.users.insert(
            request.username.to_string(),
            UserRecord {
                password: request.temporary_password.to_string(),
                temporary_password: true,
                pending_secret: None,
                mfa_secret: None,
                groups: BTreeSet::new(),
                last_sign_in_step: None,
            },
        );

        if request.suppress_welcome {
            state.suppressed_welcomes += 1;
        } else {
            state.sent_welcomes += 1;
        }
        trace_debug!("In-memory pool {} created {}", request.user_pool_id, request.username);
        Ok(())
    }

    fn delete_user(&self, user_pool_id: &str, username: &str) -> Result<(), ProvisionError> {
        const OP: &str = "AdminDeleteUser";
        let mut state = self.lock();
        state
            .pool_mut(OP, user_pool_id)?
            .users
            .remove(username)
            .ok_or_else(|| user_not_found(OP, username))?;
        state.sessions.retain(|_, session| session.username != username);
        Ok(())
    }

    fn initiate_auth(
        &self,
        pool: &PoolConfig,
        username: &str,
        password: &str,
    ) -> Result<AuthStep, ProvisionError> {
        const OP: &str = "AdminInitiateAuth";
        let mut state = self.lock();
        state.sign_in_attempts += 1;

        let record = state.pool(OP, &pool.user_pool_id)?;
        if !record.clients.contains(&pool.client_id) {
            return Err(ProvisionError::from_service_code(
                OP,
                username,
                "ResourceNotFoundException",
                &format!("User pool client {} does not exist.", pool.client_id),
            ));
        }

        let user = record
            .users
            .get(username)
            .ok_or_else(|| user_not_found(OP, username))?;
        if user.password != password {
            return Err(ProvisionError::from_service_code(
                OP,
                username,
                "NotAuthorizedException",
                "Incorrect username or password.",
            ));
        }

        let (kind, stage) = if user.temporary_password {
            (ChallengeKind::NewPasswordRequired, SessionStage::NewPassword)
        } else if user.mfa_secret.is_some() {
            (ChallengeKind::SoftwareTokenMfa, SessionStage::SoftwareTokenMfa)
        } else {
            (ChallengeKind::MfaSetup, SessionStage::MfaSetup)
        };

        let template = Session {
            user_pool_id: pool.user_pool_id.clone(),
            client_id: pool.client_id.clone(),
            username: username.to_string(),
            stage,
        };
        let session = state.open_session(&template, stage);
        Ok(AuthStep::Challenge { kind, session })
    }

    fn respond_to_challenge(
        &self,
        client_id: &str,
        session: &str,
        answer: &ChallengeAnswer,
    ) -> Result<AuthStep, ProvisionError> {
        const OP: &str = "RespondToAuthChallenge";
        let mut state = self.lock();
        let current = state.take_session(OP, session)?;

        if current.client_id != client_id || current.username != answer.username() {
            return Err(ProvisionError::from_service_code(
                OP,
                answer.username(),
                "NotAuthorizedException",
                "Invalid session for the user.",
            ));
        }

        match (current.stage, answer) {
            (SessionStage::NewPassword, ChallengeAnswer::NewPassword { new_password, .. }) => {
                let user = state.user_mut(OP, &current.user_pool_id, &current.username)?;
                user.password = new_password.clone();
                user.temporary_password = false;
                let (kind, stage) = if user.mfa_secret.is_some() {
                    (ChallengeKind::SoftwareTokenMfa, SessionStage::SoftwareTokenMfa)
                } else {
                    (ChallengeKind::MfaSetup, SessionStage::MfaSetup)
                };
                let session = state.open_session(&current, stage);
                Ok(AuthStep::Challenge { kind, session })
            }
            (SessionStage::SoftwareTokenMfa, ChallengeAnswer::SoftwareTokenMfa { code, .. }) => {
                let (secret, last_step) = {
                    let user = state.user_mut(OP, &current.user_pool_id, &current.username)?;
                    (user.mfa_secret.clone(), user.last_sign_in_step)
                };
                let secret = secret.ok_or_else(|| {
                    ProvisionError::from_service_code(
                        OP,
                        &current.username,
                        "SoftwareTokenMFANotFoundException",
                        "Software Token MFA has not been enabled by the user.",
                    )
                })?;

                let step = self.verify_code(OP, &current.username, &secret, code)?;
                if last_step == Some(step) {
                    return Err(ProvisionError::from_service_code(
                        OP,
                        &current.username,
                        "ExpiredCodeException",
                        "Your software token has already been used once.",
                    ));
                }

                state
                    .user_mut(OP, &current.user_pool_id, &current.username)?
                    .last_sign_in_step = Some(step);
                Ok(AuthStep::Authenticated(state.issue_tokens(&current.username)))
            }
            (stage, answer) => Err(ProvisionError::from_service_code(
                OP,
                answer.username(),
                "InvalidParameterException",
                &format!("Challenge response {} does not match stage {:?}", answer.kind(), stage),
            )),
        }
    }

    fn associate_software_token(
        &self,
        session: &str,
    ) -> Result<SoftwareTokenAssociation, ProvisionError> {
        const OP: &str = "AssociateSoftwareToken";
        let mut state = self.lock();
        let current = state.take_session(OP, session)?;

        if current.stage != SessionStage::MfaSetup {
            return Err(ProvisionError::from_service_code(
                OP,
                &current.username,
                "InvalidParameterException",
                "Session is not waiting for software token setup.",
            ));
        }

        let secret_code = random_base32_secret();
        state
            .user_mut(OP, &current.user_pool_id, &current.username)?
            .pending_secret = Some(secret_code.clone());

        let session = state.open_session(&current, SessionStage::AwaitingVerification);
        Ok(SoftwareTokenAssociation {
            secret_code,
            session: Some(session),
        })
    }

    fn verify_software_token(
        &self,
        session: &str,
        code: &str,
        device_label: &str,
    ) -> Result<(), ProvisionError> {
        const OP: &str = "VerifySoftwareToken";
        let mut state = self.lock();
        let current = state.take_session(OP, session)?;

        if current.stage != SessionStage::AwaitingVerification {
            return Err(ProvisionError::from_service_code(
                OP,
                &current.username,
                "InvalidParameterException",
                "Session has no associated software token.",
            ));
        }

        let pending = state
            .user_mut(OP, &current.user_pool_id, &current.username)?
            .pending_secret
            .clone()
            .ok_or(ProvisionError::MissingField {
                operation: OP,
                field: "SecretCode",
            })?;

        let step = self.verify_code(OP, &current.username, &pending, code)?;

        let user = state.user_mut(OP, &current.user_pool_id, &current.username)?;
        user.mfa_secret = user.pending_secret.take();
        if self.enrollment_consumes_code {
            user.last_sign_in_step = Some(step);
        }
        trace_debug!("Verified software token {} for {}", device_label, current.username);
        Ok(())
    }

    fn add_user_to_group(
        &self,
        user_pool_id: &str,
        username: &str,
        group_name: &str,
    ) -> Result<(), ProvisionError> {
        const OP: &str = "AdminAddUserToGroup";
        let mut state = self.lock();
        let pool = state.pool_mut(OP, user_pool_id)?;

        if !pool.groups.contains(group_name) {
            return Err(ProvisionError::from_service_code(
                OP,
                username,
                "ResourceNotFoundException",
                "Group not found.",
            ));
        }
        pool.users
            .get_mut(username)
            .ok_or_else(|| user_not_found(OP, username))?
            .groups
            .insert(group_name.to_string());
        Ok(())
    }

    fn user_exists(&self, user_pool_id: &str, username: &str) -> Result<bool, ProvisionError> {
        let state = self.lock();
        Ok(state
            .pool("AdminGetUser", user_pool_id)?
            .users
            .contains_key(username))
    }
}

fn missing_pool(operation: &'static str, user_pool_id: &str) -> ProvisionError {
    ProvisionError::from_service_code(
        operation,
        "",
        "ResourceNotFoundException",
        &format!("User pool {} does not exist.", user_pool_id),
    )
}

fn user_not_found(operation: &'static str, username: &str) -> ProvisionError {
    ProvisionError::from_service_code(operation, username, "UserNotFoundException", "User does not exist.")
}

fn random_base32_secret() -> String {
    let mut bytes = vec![0u8; SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    match Secret::Raw(bytes).to_encoded() {
        Secret::Encoded(encoded) => encoded,
        Secret::Raw(raw) => raw.iter().map(|b| format!("{:02X}", b)).collect(),
    }
}
