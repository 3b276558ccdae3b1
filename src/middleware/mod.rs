use crate::config::Config;
use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::{Method, StatusCode},
    web, Error, HttpResponse,
};
use futures_util::future::{ok, LocalBoxFuture, Ready};
use serde_json::json;

pub const CSRF_HEADER: &str = "X-CSRF-TOKEN";
pub const REQUESTED_WITH_HEADER: &str = "X-Requested-With";
pub const XHR_MARKER: &str = "XMLHttpRequest";
const DEFAULT_CSRF_COOKIE: &str = "XSRF-TOKEN";

/// Laravel's "page expired" status, used for CSRF failures.
pub const CSRF_MISMATCH_STATUS: u16 = 419;

fn is_mutating(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE)
}

/// Double-submit check: the token header must equal the CSRF cookie issued
/// by the host, and the request must be marked as XHR.
pub fn passes_csrf_check(req: &ServiceRequest, cookie_name: &str) -> bool {
    let header = |name: &str| req.headers().get(name).and_then(|v| v.to_str().ok());

    let is_xhr = header(REQUESTED_WITH_HEADER).is_some_and(|v| v.eq_ignore_ascii_case(XHR_MARKER));
    let token = header(CSRF_HEADER).map(str::trim).filter(|t| !t.is_empty());
    let cookie = req.cookie(cookie_name).map(|c| c.value().to_string());

    match (is_xhr, token, cookie) {
        (true, Some(token), Some(cookie)) => token == cookie,
        _ => false,
    }
}

// --- Guard for the admin JSON API ---

pub struct XhrCsrfGuard;

impl<S, B> Transform<S, ServiceRequest> for XhrCsrfGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = XhrCsrfGuardMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(XhrCsrfGuardMiddleware { service })
    }
}

pub struct XhrCsrfGuardMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for XhrCsrfGuardMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let is_valid = if is_mutating(req.method()) {
            let cookie_name = req
                .app_data::<web::Data<Config>>()
                .map(|config| config.csrf_cookie_name.clone())
                .unwrap_or_else(|| DEFAULT_CSRF_COOKIE.to_string());
            passes_csrf_check(&req, &cookie_name)
        } else {
            true
        };

        if is_valid {
            let fut = self.service.call(req);
            Box::pin(async move {
                let res = fut.await?;
                Ok(res.map_into_left_body())
            })
        } else {
            log::warn!("Rejected {} {}: CSRF token mismatch.", req.method(), req.path());
            Box::pin(async move {
                let (http_req, _payload) = req.into_parts();
                let status = StatusCode::from_u16(CSRF_MISMATCH_STATUS).unwrap_or(StatusCode::FORBIDDEN);
                let res = HttpResponse::build(status)
                    .json(json!({ "message": "CSRF token mismatch." }))
                    .map_into_right_body();
                Ok(ServiceResponse::new(http_req, res))
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::cookie::Cookie;
    use actix_web::test::TestRequest;

    #[test]
    fn token_must_match_cookie_and_request_must_be_xhr() {
        let ok = TestRequest::post()
            .insert_header((CSRF_HEADER, "abc123"))
            .insert_header((REQUESTED_WITH_HEADER, XHR_MARKER))
            .cookie(Cookie::new("XSRF-TOKEN", "abc123"))
            .to_srv_request();
        assert!(passes_csrf_check(&ok, "XSRF-TOKEN"));

        let wrong = TestRequest::post()
            .insert_header((CSRF_HEADER, "other"))
            .insert_header((REQUESTED_WITH_HEADER, XHR_MARKER))
            .cookie(Cookie::new("XSRF-TOKEN", "abc123"))
            .to_srv_request();
        assert!(!passes_csrf_check(&wrong, "XSRF-TOKEN"));

        let not_xhr = TestRequest::post()
            .insert_header((CSRF_HEADER, "abc123"))
            .cookie(Cookie::new("XSRF-TOKEN", "abc123"))
            .to_srv_request();
        assert!(!passes_csrf_check(&not_xhr, "XSRF-TOKEN"));

        let no_cookie = TestRequest::post()
            .insert_header((CSRF_HEADER, "abc123"))
            .insert_header((REQUESTED_WITH_HEADER, XHR_MARKER))
            .to_srv_request();
        assert!(!passes_csrf_check(&no_cookie, "XSRF-TOKEN"));
    }

    #[test]
    fn only_mutating_methods_are_checked() {
        assert!(is_mutating(&Method::DELETE));
        assert!(!is_mutating(&Method::GET));
        assert!(!is_mutating(&Method::HEAD));
    }
}
