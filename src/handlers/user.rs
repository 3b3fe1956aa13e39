use async_trait::async_trait;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};

use crate::{
    AppState,
    endpoint::{ApiRequest, DecoderValidator, Handler, ResultWriter},
    errors::ApiError,
    models::{AuthCheckResponse, VerifyEmailFinalizeRequest},
};

/// How long an emailed verification link stays valid.
pub const VERIFY_TOKEN_TTL_HOURS: i64 = 24;

/// UserLogoutHandler
///
/// Sessions are bearer tokens, so logging out only has to acknowledge the request;
/// the client drops its token.
pub struct UserLogoutHandler;

#[async_trait]
impl Handler for UserLogoutHandler {
    async fn handle(&self, request: ApiRequest) -> Response {
        tracing::info!(user_id = %request.user.id, "user logged out");
        StatusCode::OK.into_response()
    }
}

/// AuthCheckHandler
///
/// Echoes the identity behind a valid session.
pub struct AuthCheckHandler {
    writer: ResultWriter,
}

impl AuthCheckHandler {
    pub fn new(writer: ResultWriter) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl Handler for AuthCheckHandler {
    async fn handle(&self, request: ApiRequest) -> Response {
        let user = request.user;
        let body = AuthCheckResponse {
            id: user.id,
            email: user.email,
            email_verified: user.email_verified,
        };
        self.writer.write_result(StatusCode::OK, &body)
    }
}

/// UserDeleteHandler
///
/// Deletes the calling user and everything they own.
pub struct UserDeleteHandler {
    config: AppState,
    writer: ResultWriter,
}

impl UserDeleteHandler {
    pub fn new(config: &AppState, writer: ResultWriter) -> Self {
        Self {
            config: config.clone(),
            writer,
        }
    }
}

#[async_trait]
impl Handler for UserDeleteHandler {
    async fn handle(&self, request: ApiRequest) -> Response {
        match self.config.repo.delete_user(request.user.id).await {
            Ok(Some(user)) => {
                tracing::info!(user_id = %user.id, "user deleted");
                self.writer
                    .write_result(StatusCode::OK, &AuthCheckResponse::from(user))
            }
            Ok(None) => self.writer.write_error(ApiError::NotFound("user")),
            Err(e) => self.writer.write_error(e.into()),
        }
    }
}

/// VerifyEmailInitiateHandler
///
/// Issues a single-use token and mails the finalize link to the caller.
pub struct VerifyEmailInitiateHandler {
    config: AppState,
    writer: ResultWriter,
}

impl VerifyEmailInitiateHandler {
    pub fn new(config: &AppState, writer: ResultWriter) -> Self {
        Self {
            config: config.clone(),
            writer,
        }
    }

    async fn initiate(&self, request: &ApiRequest) -> Result<(), ApiError> {
        if request.user.email_verified {
            return Err(ApiError::BadRequest("email is already verified".to_string()));
        }

        let expires_at = Utc::now() + Duration::hours(VERIFY_TOKEN_TTL_HOURS);
        let token = self
            .config
            .repo
            .create_verify_token(request.user.id, expires_at)
            .await?;

        let link = format!(
            "{}{}/email/verify/finalize?token={}",
            self.config.config.server_url.trim_end_matches('/'),
            self.config.config.base_path.trim_end_matches('/'),
            token.token
        );

        self.config
            .mailer
            .send_verification_email(&request.user.email, &link)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Handler for VerifyEmailInitiateHandler {
    async fn handle(&self, request: ApiRequest) -> Response {
        match self.initiate(&request).await {
            Ok(()) => StatusCode::OK.into_response(),
            Err(err) => self.writer.write_error(err),
        }
    }
}

/// VerifyEmailFinalizeHandler
///
/// Consumes the token from `?token=` and marks the caller's email as verified.
/// A token issued to someone else reads as missing and stays usable by its owner.
/// The endpoint redirects, so the response body is never shown to the browser.
pub struct VerifyEmailFinalizeHandler {
    config: AppState,
    decoder: DecoderValidator,
    writer: ResultWriter,
}

impl VerifyEmailFinalizeHandler {
    pub fn new(config: &AppState, decoder: DecoderValidator, writer: ResultWriter) -> Self {
        Self {
            config: config.clone(),
            decoder,
            writer,
        }
    }

    async fn finalize(&self, request: &ApiRequest) -> Result<(), ApiError> {
        let payload: VerifyEmailFinalizeRequest = self.decoder.decode_and_validate(request)?;

        let token = self
            .config
            .repo
            .consume_verify_token(payload.token, request.user.id)
            .await?
            .ok_or(ApiError::NotFound("verification token"))?;

        if token.expires_at < Utc::now() {
            return Err(ApiError::BadRequest("verification token has expired".to_string()));
        }

        if !self.config.repo.set_email_verified(request.user.id).await? {
            return Err(ApiError::NotFound("user"));
        }
        tracing::info!(user_id = %request.user.id, "email verified");
        Ok(())
    }
}

#[async_trait]
impl Handler for VerifyEmailFinalizeHandler {
    async fn handle(&self, request: ApiRequest) -> Response {
        match self.finalize(&request).await {
            Ok(()) => StatusCode::OK.into_response(),
            Err(err) => self.writer.write_error(err),
        }
    }
}
