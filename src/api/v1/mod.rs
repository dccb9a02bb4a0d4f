mod cookie;
mod error;
mod handler;
mod router;

pub use cookie::{ACCESS_COOKIE, CookiePolicy, REFRESH_COOKIE};
pub use error::{ApiError, ApiErrorCode, recover_error};
pub use handler::{ApiResponse, SessionView};
pub use router::{routes, with_identity};

use crate::domain_model::UserIdentity;
use crate::server::Server;
use std::convert::Infallible;
use std::sync::Arc;
use warp::Filter;
use warp::reply::Response;

/// The whole v1 surface under `/api/v1`, with rejections turned into JSON
/// error responses.
pub fn api(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Infallible> + Clone {
    warp::path("api")
        .and(warp::path("v1"))
        .and(routes(server))
        .recover(recover_error)
}

/// Entry point for the identity-provider integration once it has resolved
/// who the caller is: opens the session and redirects to the frontend with
/// both cookies set.
pub async fn complete_login(
    server: &Server,
    identity: UserIdentity,
) -> Result<Response, ApiErrorCode> {
    let cookies = CookiePolicy::new(
        &server.cookie,
        server.access_ttl,
        server.refresh_absolute_ttl,
    );
    handler::login_redirect(
        identity,
        server.session_coordinator.clone(),
        &cookies,
        &server.cookie.frontend_url,
    )
    .await
}
