//! API-key middleware for the admin surface.
//!
//! Admin calls carry the configured key in the `X-Api-Key` header. An unset server key rejects everything: there is
//! no "no key configured, allow all" mode.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorForbidden,
    Error,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use ros_common::Secret;

pub struct ApiKeyMiddlewareFactory {
    header: String,
    key: Secret<String>,
}

impl ApiKeyMiddlewareFactory {
    pub fn new(header: &str, key: Secret<String>) -> Self {
        ApiKeyMiddlewareFactory { header: header.into(), key }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ApiKeyMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = ApiKeyMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ApiKeyMiddlewareService {
            header: self.header.clone(),
            key: self.key.clone(),
            service: Rc::new(service),
        }))
    }
}

pub struct ApiKeyMiddlewareService<S> {
    header: String,
    key: Secret<String>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for ApiKeyMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let expected = self.key.reveal().clone();
        let header = self.header.clone();
        Box::pin(async move {
            trace!("🔐️ Checking API key for request");
            if expected.is_empty() {
                warn!("🔐️ No admin API key is configured. Denying access.");
                return Err(ErrorForbidden("Admin API is not configured."));
            }
            let supplied = req.headers().get(&header).and_then(|v| v.to_str().ok());
            match supplied {
                Some(key) if key == expected => {
                    trace!("🔐️ API key check for request ✅️");
                    service.call(req).await
                },
                Some(_) => {
                    warn!("🔐️ Invalid API key in request. Denying access.");
                    Err(ErrorForbidden("Invalid API key."))
                },
                None => {
                    warn!("🔐️ No API key found in request. Denying access.");
                    Err(ErrorForbidden("No API key found."))
                },
            }
        })
    }
}
