//! Cognito User Pool Client Wrapper
//!
//! Drives the Cognito admin API through [`BlockingAws`]. Each trait method is
//! one SDK request, run to completion before returning.

#![warn(clippy::all, rust_2018_idioms)]

use aws_sdk_cognitoidentityprovider as cognito_idp;
use cognito_idp::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use cognito_idp::types::{
    AttributeType, AuthFlowType, AuthenticationResultType, ChallengeNameType, MessageActionType,
    VerifySoftwareTokenResponseType,
};

use crate::app::aws_runtime::BlockingAws;
use crate::app::errors::ProvisionError;

use super::sdk_errors::{categorize_code, categorize_error_string};
use super::types::{
    AuthStep, AuthTokens, ChallengeAnswer, ChallengeKind, CreateUserRequest, PoolConfig,
    SoftwareTokenAssociation,
};
use super::IdentityProviderClient;

/// Placeholder used in errors for session-scoped calls that carry no username.
const SESSION_USER: &str = "<session user>";

/// Cognito-backed [`IdentityProviderClient`].
#[derive(Debug, Clone)]
pub struct CognitoIdentityProvider {
    aws: BlockingAws,
    client: cognito_idp::Client,
}

impl CognitoIdentityProvider {
    /// Build a client from the shared blocking AWS context.
    pub fn new(aws: &BlockingAws) -> Self {
        Self {
            aws: aws.clone(),
            client: cognito_idp::Client::new(aws.config()),
        }
    }
}

impl IdentityProviderClient for CognitoIdentityProvider {
    fn create_user(&self, request: &CreateUserRequest<'_>) -> Result<(), ProvisionError> {
        trace_trace!("AdminCreateUser {} in {}", request.username, request.user_pool_id);

        let email = AttributeType::builder()
            .name("email")
            .value(request.email)
            .build()
            .map_err(|e| ProvisionError::InvalidConfiguration(format!("email attribute: {}", e)))?;

        let mut call = self
            .client
            .admin_create_user()
            .user_pool_id(request.user_pool_id)
            .username(request.username)
            .user_attributes(email)
            .temporary_password(request.temporary_password);
        if request.suppress_welcome {
            call = call.message_action(MessageActionType::Suppress);
        }

        self.aws
            .block_on(call.send())
            .map_err(|e| service_error("AdminCreateUser", request.username, e))?;
        Ok(())
    }

    fn delete_user(&self, user_pool_id: &str, username: &str) -> Result<(), ProvisionError> {
        trace_trace!("AdminDeleteUser {} in {}", username, user_pool_id);

        self.aws
            .block_on(
                self.client
                    .admin_delete_user()
                    .user_pool_id(user_pool_id)
                    .username(username)
                    .send(),
            )
            .map_err(|e| service_error("AdminDeleteUser", username, e))?;
        Ok(())
    }

    fn initiate_auth(
        &self,
        pool: &PoolConfig,
        username: &str,
        password: &str,
    ) -> Result<AuthStep, ProvisionError> {
        trace_trace!("AdminInitiateAuth {} via client {}", username, pool.client_id);

        let output = self
            .aws
            .block_on(
                self.client
                    .admin_initiate_auth()
                    .user_pool_id(&pool.user_pool_id)
                    .client_id(&pool.client_id)
                    .auth_flow(AuthFlowType::AdminNoSrpAuth)
                    .auth_parameters("USERNAME", username)
                    .auth_parameters("PASSWORD", password)
                    .send(),
            )
            .map_err(|e| service_error("AdminInitiateAuth", username, e))?;

        auth_step(
            "AdminInitiateAuth",
            output.challenge_name,
            output.session,
            output.authentication_result,
        )
    }

    fn respond_to_challenge(
        &self,
        client_id: &str,
        session: &str,
        answer: &ChallengeAnswer,
    ) -> Result<AuthStep, ProvisionError> {
        trace_trace!("RespondToAuthChallenge {:?}", answer);

        let call = self
            .client
            .respond_to_auth_challenge()
            .client_id(client_id)
            .session(session);

        let call = match answer {
            ChallengeAnswer::NewPassword {
                username,
                new_password,
            } => call
                .challenge_name(ChallengeNameType::NewPasswordRequired)
                .challenge_responses("USERNAME", username.as_str())
                .challenge_responses("NEW_PASSWORD", new_password.as_str()),
            ChallengeAnswer::SoftwareTokenMfa { username, code } => call
                .challenge_name(ChallengeNameType::SoftwareTokenMfa)
                .challenge_responses("USERNAME", username.as_str())
                .challenge_responses("SOFTWARE_TOKEN_MFA_CODE", code.as_str()),
        };

        let output = self
            .aws
            .block_on(call.send())
            .map_err(|e| service_error("RespondToAuthChallenge", answer.username(), e))?;

        auth_step(
            "RespondToAuthChallenge",
            output.challenge_name,
            output.session,
            output.authentication_result,
        )
    }

    fn associate_software_token(
        &self,
        session: &str,
    ) -> Result<SoftwareTokenAssociation, ProvisionError> {
        trace_trace!("AssociateSoftwareToken");

        let output = self
            .aws
            .block_on(self.client.associate_software_token().session(session).send())
            .map_err(|e| service_error("AssociateSoftwareToken", SESSION_USER, e))?;

        let secret_code = output.secret_code.ok_or(ProvisionError::MissingField {
            operation: "AssociateSoftwareToken",
            field: "SecretCode",
        })?;

        Ok(SoftwareTokenAssociation {
            secret_code,
            session: output.session,
        })
    }

    fn verify_software_token(
        &self,
        session: &str,
        code: &str,
        device_label: &str,
    ) -> Result<(), ProvisionError> {
        trace_trace!("VerifySoftwareToken for device {}", device_label);

        let output = self
            .aws
            .block_on(
                self.client
                    .verify_software_token()
                    .session(session)
                    .user_code(code)
                    .friendly_device_name(device_label)
                    .send(),
            )
            .map_err(|e| service_error("VerifySoftwareToken", SESSION_USER, e))?;

        match output.status {
            Some(VerifySoftwareTokenResponseType::Success) => Ok(()),
            other => {
                let status = other
                    .as_ref()
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_else(|| "<none>".to_string());
                Err(ProvisionError::Provider {
                    operation: "VerifySoftwareToken",
                    code: "VerificationStatus".to_string(),
                    message: format!("software token verification returned {}", status),
                    category: categorize_code("VerificationStatus"),
                })
            }
        }
    }

    fn add_user_to_group(
        &self,
        user_pool_id: &str,
        username: &str,
        group_name: &str,
    ) -> Result<(), ProvisionError> {
        trace_trace!("AdminAddUserToGroup {} -> {}", username, group_name);

        self.aws
            .block_on(
                self.client
                    .admin_add_user_to_group()
                    .user_pool_id(user_pool_id)
                    .username(username)
                    .group_name(group_name)
                    .send(),
            )
            .map_err(|e| service_error("AdminAddUserToGroup", username, e))?;
        Ok(())
    }

    fn user_exists(&self, user_pool_id: &str, username: &str) -> Result<bool, ProvisionError> {
        trace_trace!("AdminGetUser {} in {}", username, user_pool_id);

        let result = self.aws.block_on(
            self.client
                .admin_get_user()
                .user_pool_id(user_pool_id)
                .username(username)
                .send(),
        );

        match result {
            Ok(_) => Ok(true),
            Err(e) => match service_error("AdminGetUser", username, e) {
                ProvisionError::NotFound { .. } => Ok(false),
                other => Err(other),
            },
        }
    }
}

/// Convert the challenge/result fields shared by both sign-in responses.
fn auth_step(
    operation: &'static str,
    challenge_name: Option<ChallengeNameType>,
    session: Option<String>,
    authentication_result: Option<AuthenticationResultType>,
) -> Result<AuthStep, ProvisionError> {
    if let Some(result) = authentication_result {
        let access_token = result.access_token.ok_or(ProvisionError::MissingField {
            operation,
            field: "AuthenticationResult.AccessToken",
        })?;
        return Ok(AuthStep::Authenticated(AuthTokens {
            access_token,
            id_token: result.id_token,
            refresh_token: result.refresh_token,
            expires_in: result.expires_in,
            token_type: result.token_type,
        }));
    }

    let challenge_name = challenge_name.ok_or(ProvisionError::MissingField {
        operation,
        field: "ChallengeName",
    })?;
    let session = session.ok_or(ProvisionError::MissingField {
        operation,
        field: "Session",
    })?;

    Ok(AuthStep::Challenge {
        kind: challenge_kind(&challenge_name),
        session,
    })
}

fn challenge_kind(name: &ChallengeNameType) -> ChallengeKind {
    match name {
        ChallengeNameType::NewPasswordRequired => ChallengeKind::NewPasswordRequired,
        ChallengeNameType::MfaSetup => ChallengeKind::MfaSetup,
        ChallengeNameType::SoftwareTokenMfa => ChallengeKind::SoftwareTokenMfa,
        other => ChallengeKind::Other(other.as_str().to_string()),
    }
}

/// Map an SDK failure onto the provisioning error taxonomy.
fn service_error<E>(operation: &'static str, username: &str, err: SdkError<E>) -> ProvisionError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let mapped = match err.as_service_error().and_then(|e| e.code()) {
        Some(code) => {
            let message = err
                .as_service_error()
                .and_then(|e| e.message())
                .unwrap_or("No message");
            ProvisionError::from_service_code(operation, username, code, message)
        }
        None => {
            let detail = DisplayErrorContext(&err).to_string();
            ProvisionError::Provider {
                operation,
                code: "SdkError".to_string(),
                category: categorize_error_string(&detail, operation),
                message: detail,
            }
        }
    };

    if let ProvisionError::Provider { category, code, .. } = &mapped {
        if category.is_transient() {
            log_warn!("{} hit a transient {} failure; not retrying", operation, category);
        } else {
            log_error!("{} failed for {} with {}", operation, username, code);
        }
    }
    mapped
}
