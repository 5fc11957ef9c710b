use axum::{Json, extract::State, http::StatusCode};
use rw_api_types::{
    OtpChallengeResponse, OtpRequest, OtpVerifyRequest, OtpVerifyResponse, SessionResponse,
};
use rw_auth::AuthError;
use tracing::warn;

use crate::{AppState, ApiResult, ErrorResponse, bad_request, error_response, internal_error};

pub(crate) async fn request_otp(
    State(state): State<AppState>,
    Json(request): Json<OtpRequest>,
) -> ApiResult<OtpChallengeResponse> {
    state
        .auth
        .request_otp(&request.email)
        .await
        .map(Json)
        .map_err(auth_error)
}

pub(crate) async fn verify_otp(
    State(state): State<AppState>,
    Json(request): Json<OtpVerifyRequest>,
) -> ApiResult<OtpVerifyResponse> {
    state
        .auth
        .verify_otp(&request)
        .await
        .map(Json)
        .map_err(auth_error)
}

pub(crate) async fn session(State(state): State<AppState>) -> ApiResult<SessionResponse> {
    state.auth.session().await.map(Json).map_err(auth_error)
}

pub(crate) async fn logout(State(state): State<AppState>) -> ApiResult<SessionResponse> {
    state.auth.logout().await.map_err(auth_error)?;
    state.auth.session().await.map(Json).map_err(auth_error)
}

fn auth_error(err: AuthError) -> (StatusCode, Json<ErrorResponse>) {
    match err {
        AuthError::InvalidEmail => bad_request("INVALID_EMAIL", err.to_string()),
        AuthError::UnknownChallenge => bad_request("UNKNOWN_CHALLENGE", err.to_string()),
        AuthError::ChallengeExpired => {
            error_response(StatusCode::GONE, "CHALLENGE_EXPIRED", err.to_string())
        }
        AuthError::InvalidCode => {
            warn!("otp verification rejected");
            error_response(StatusCode::UNAUTHORIZED, "INVALID_CODE", err.to_string())
        }
        AuthError::Storage(err) => internal_error(err),
    }
}
