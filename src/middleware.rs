use std::rc::Rc;
use std::sync::Arc;

use actix_service::{forward_ready, Service};
use actix_web::body::EitherBody;
use actix_web::dev::{ServiceRequest, ServiceResponse, Transform};
use actix_web::http::Method;
use actix_web::{Error, HttpMessage, ResponseError};
use futures::future::{ok, LocalBoxFuture, Ready};

use crate::auth::SessionAuthority;
use crate::error::AppError;

/// Middleware factory guarding the admin routes: every request must carry a
/// bearer token the session authority accepts. OPTIONS preflights pass
/// through unauthenticated so browsers can complete cross-origin checks.
pub struct RequireSession {
    authority: Arc<SessionAuthority>,
}

impl RequireSession {
    pub fn new(authority: Arc<SessionAuthority>) -> Self {
        RequireSession { authority }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequireSession
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RequireSessionMiddleware<S>;
    type InitError = ();

    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RequireSessionMiddleware {
            service: Rc::new(service),
            authority: self.authority.clone(),
        })
    }
}

pub struct RequireSessionMiddleware<S> {
    service: Rc<S>,
    authority: Arc<SessionAuthority>,
}

impl<S, B> Service<ServiceRequest> for RequireSessionMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let authority = self.authority.clone();
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            if req.method() == Method::OPTIONS {
                return service.call(req).await.map(|res| res.map_into_left_body());
            }

            let token = match bearer_token(&req) {
                Some(token) => token,
                None => {
                    let denied =
                        AppError::Auth("Authorization header missing or malformed".to_string());
                    return Ok(req.into_response(denied.error_response()).map_into_right_body());
                }
            };

            match authority.validate(&token) {
                Ok(claims) => {
                    req.extensions_mut().insert(claims);
                    service.call(req).await.map(|res| res.map_into_left_body())
                }
                Err(denied) => {
                    Ok(req.into_response(denied.error_response()).map_into_right_body())
                }
            }
        })
    }
}

fn bearer_token(req: &ServiceRequest) -> Option<String> {
    let header = req.headers().get("Authorization")?.to_str().ok()?;
    header.strip_prefix("Bearer ").map(|t| t.to_string())
}
