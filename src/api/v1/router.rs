use super::cookie::{ACCESS_COOKIE, CookiePolicy, REFRESH_COOKIE};
use super::handler;
use crate::application_impl::Authenticator;
use crate::application_port::AuthState;
use crate::server::*;
use std::convert::Infallible;
use std::sync::Arc;
use warp::Filter;

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let cookies = Arc::new(CookiePolicy::new(
        &server.cookie,
        server.access_ttl,
        server.refresh_absolute_ttl,
    ));

    // Path before method, so an unknown path is a 404 rather than a 405.
    let refresh = warp::path!("auth" / "refresh")
        .and(warp::post())
        .and(warp::cookie::optional::<String>(REFRESH_COOKIE))
        .and(with(server.session_coordinator.clone()))
        .and(with(cookies.clone()))
        .and_then(handler::refresh);

    let logout = warp::path!("auth" / "logout")
        .and(warp::post())
        .and(warp::cookie::optional::<String>(REFRESH_COOKIE))
        .and(with(server.session_coordinator.clone()))
        .and(with(cookies))
        .and_then(handler::logout);

    let me = warp::path!("auth" / "me")
        .and(warp::get())
        .and(with_identity(server.authenticator.clone()))
        .and_then(handler::me);

    refresh.or(logout).or(me)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

/// Resolves the `accessToken` cookie into an [`AuthState`]. Never rejects:
/// routes decide for themselves whether an anonymous caller is acceptable.
pub fn with_identity(
    authenticator: Arc<Authenticator>,
) -> impl Filter<Extract = (AuthState,), Error = warp::Rejection> + Clone {
    warp::cookie::optional::<String>(ACCESS_COOKIE).and_then(move |token: Option<String>| {
        let authenticator = authenticator.clone();
        async move { Ok::<_, warp::Rejection>(authenticator.resolve(token.as_deref())) }
    })
}
