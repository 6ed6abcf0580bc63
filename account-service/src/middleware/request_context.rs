use async_trait::async_trait;
use axum::extract::{FromRequestParts, Request};
use axum::http::{header, request::Parts};
use axum::middleware::Next;
use axum::response::Response;
use std::convert::Infallible;

use crate::services::RequestContext;

/// Builds the resolver input from the request head.
///
/// Attributes and principal set by earlier layers travel as a
/// `RequestContext` extension and are kept.
#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let mut ctx = parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_default();

        ctx.host = parts
            .headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
            .or_else(|| parts.uri.host().map(str::to_string));
        ctx.headers = parts.headers.clone();

        Ok(ctx)
    }
}

/// Account of the authenticated user, set by the gateway in front of
/// this service.
pub const PRINCIPAL_ACCOUNT_HEADER: &str = "x-principal-account-id";

/// Lifts the gateway's principal header into the request context.
///
/// Only layered when the deployment sits behind a trusted gateway that
/// strips this header from client traffic.
pub async fn gateway_principal_middleware(mut req: Request, next: Next) -> Response {
    let principal = req
        .headers()
        .get(PRINCIPAL_ACCOUNT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok());

    if let Some(account_id) = principal {
        let ctx = req
            .extensions_mut()
            .remove::<RequestContext>()
            .unwrap_or_default()
            .with_principal_account_id(account_id);
        req.extensions_mut().insert(ctx);
    }

    next.run(req).await
}
