use crate::session::SessionKeys;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures_util::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;

/// Decodes the session cookie into a [`SessionContext`](crate::session::SessionContext).
///
/// Never rejects a request: a missing, forged or expired cookie simply leaves
/// the caller anonymous, and the per-route guard decides what that means.
pub struct SessionLoader {
    keys: Arc<SessionKeys>,
}

impl SessionLoader {
    pub fn new(keys: Arc<SessionKeys>) -> Self {
        Self { keys }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionLoader
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = SessionLoaderMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionLoaderMiddleware {
            service: Rc::new(service),
            keys: self.keys.clone(),
        }))
    }
}

pub struct SessionLoaderMiddleware<S> {
    service: Rc<S>,
    keys: Arc<SessionKeys>,
}

impl<S, B> Service<ServiceRequest> for SessionLoaderMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let session = req
            .cookie(self.keys.cookie_name())
            .and_then(|cookie| self.keys.verify(cookie.value()));

        if let Some(session) = session {
            // Handlers read this back through the `Caller` extractor
            req.extensions_mut().insert(session);
        }

        let fut = self.service.call(req);
        Box::pin(async move { fut.await })
    }
}
