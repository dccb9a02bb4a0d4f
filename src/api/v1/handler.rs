use super::cookie::CookiePolicy;
use super::error::*;
use crate::application_port::*;
use crate::domain_model::UserIdentity;
use crate::logger::*;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use warp::http::header::{HeaderValue, LOCATION};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Reply, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub user: UserIdentity,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

impl From<&SessionTokens> for SessionView {
    fn from(tokens: &SessionTokens) -> Self {
        SessionView {
            user: tokens.identity.clone(),
            access_token_expires_at: tokens.access_token_expires_at,
            refresh_token_expires_at: tokens.refresh_token_expires_at,
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: &ApiResponse<T>) -> Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

fn presented(cookie: Option<String>) -> Option<String> {
    cookie.filter(|value| !value.trim().is_empty())
}

/// 401 with both cookies cleared: the client has to go through login.
fn login_required(cookies: &CookiePolicy) -> Response {
    let code = ApiErrorCode::LoginRequired;
    let body = ApiResponse::<()>::err(code.clone(), code.to_string());
    let mut response = json_response(code.status(), &body);
    cookies.apply(&mut response, cookies.cleared());
    response
}

pub async fn refresh(
    refresh_token: Option<String>,
    session_coordinator: Arc<dyn SessionCoordinator>,
    cookies: Arc<CookiePolicy>,
) -> Result<Response, warp::Rejection> {
    let Some(refresh_token) = presented(refresh_token) else {
        debug!("refresh without a refresh cookie");
        return Ok(login_required(&cookies));
    };

    match session_coordinator.refresh(&refresh_token).await {
        Ok(tokens) => {
            let mut response =
                json_response(StatusCode::OK, &ApiResponse::ok(SessionView::from(&tokens)));
            cookies.apply(&mut response, cookies.issued(&tokens));
            Ok(response)
        }
        Err(e) if e.requires_login() => Ok(login_required(&cookies)),
        // Nothing was consumed, so the cookies stay valid for a retry.
        Err(e) => Err(reject::custom(ApiErrorCode::internal(e))),
    }
}

pub async fn logout(
    refresh_token: Option<String>,
    session_coordinator: Arc<dyn SessionCoordinator>,
    cookies: Arc<CookiePolicy>,
) -> Result<Response, warp::Rejection> {
    if let Some(refresh_token) = presented(refresh_token) {
        if let Err(e) = session_coordinator.logout(&refresh_token).await {
            warn!(error = %e, "logout could not remove the refresh record");
        }
    }

    let mut response = json_response(StatusCode::OK, &ApiResponse::ok(()));
    cookies.apply(&mut response, cookies.cleared());
    Ok(response)
}

pub async fn me(auth: AuthState) -> Result<Response, warp::Rejection> {
    match auth {
        AuthState::Authenticated(identity) => {
            Ok(json_response(StatusCode::OK, &ApiResponse::ok(identity)))
        }
        AuthState::Unauthenticated => Err(reject::custom(ApiErrorCode::Unauthenticated)),
    }
}

/// Final step of an external login flow: the identity provider integration
/// has resolved `identity`; open the session, set both cookies and send the
/// browser back to the frontend.
pub async fn login_redirect(
    identity: UserIdentity,
    session_coordinator: Arc<dyn SessionCoordinator>,
    cookies: &CookiePolicy,
    frontend_url: &str,
) -> Result<Response, ApiErrorCode> {
    let tokens = session_coordinator
        .login(identity)
        .await
        .map_err(ApiErrorCode::internal)?;

    let target = format!("{}/oauth/success", frontend_url.trim_end_matches('/'));
    let location = HeaderValue::from_str(&target).map_err(ApiErrorCode::internal)?;

    let mut response = StatusCode::SEE_OTHER.into_response();
    response.headers_mut().insert(LOCATION, location);
    cookies.apply(&mut response, cookies.issued(&tokens));
    Ok(response)
}
