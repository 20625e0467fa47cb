//! Route resolution and execution.

use std::sync::Arc;

use axum::http::Method;

use crate::domain::handler::{RouteRequest, SocketContext};
use crate::domain::route::{Route, RouteAddress, RouteTable};
use crate::error::ProtocolError;
use crate::ws::messages::{OutboundEnvelope, RequestMessage, RequestTarget};

/// Maps requests onto the read-only route table and runs the matched
/// route's handler.
#[derive(Debug, Clone)]
pub struct RouteResolver {
    routes: Arc<RouteTable>,
}

impl RouteResolver {
    /// Creates a resolver over a shared route table.
    #[must_use]
    pub fn new(routes: Arc<RouteTable>) -> Self {
        Self { routes }
    }

    /// Finds the route a request addresses.
    ///
    /// Identifier lookups ignore `method`. Routes hidden from the socket
    /// never match.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::RouteNotFound`] if nothing matches.
    /// - [`ProtocolError::WildcardRouteId`] if the identifier names a
    ///   wildcard-method route.
    pub fn resolve(
        &self,
        method: &Method,
        target: &RequestTarget,
    ) -> Result<Arc<Route>, ProtocolError> {
        let route = match target {
            RequestTarget::RouteId(id) => self.routes.lookup_by_id(id),
            RequestTarget::Path(path) => self.routes.lookup(method, path),
        }
        .filter(|route| route.socket_visible())
        .ok_or(ProtocolError::RouteNotFound)?;

        if matches!(target, RequestTarget::RouteId(_))
            && matches!(route.address(), RouteAddress::NamedWildcard(_))
        {
            return Err(ProtocolError::WildcardRouteId);
        }
        Ok(Arc::clone(route))
    }

    /// Resolves a request, runs its handler and wraps the result in a
    /// `response` envelope.
    ///
    /// # Errors
    ///
    /// Resolution errors from [`RouteResolver::resolve`], or
    /// [`ProtocolError::Application`] if the handler fails.
    pub async fn dispatch(
        &self,
        request: RequestMessage,
        socket: &SocketContext,
    ) -> Result<OutboundEnvelope, ProtocolError> {
        let route = self.resolve(&request.method, &request.target)?;
        let method = route
            .method()
            .concrete()
            .cloned()
            .unwrap_or(request.method);

        tracing::debug!(
            connection_id = %socket.connection_id,
            method = %method,
            route = %route.path(),
            "dispatching request"
        );

        let call = RouteRequest {
            connection_id: socket.connection_id,
            method,
            path: route.path().to_string(),
            headers: request.headers,
            payload: request.payload,
            credentials: socket.credentials.clone(),
        };
        let response = route.handler().call(call).await.map_err(|e| {
            tracing::debug!(
                connection_id = %socket.connection_id,
                route = %route.path(),
                error = %e,
                "route handler failed"
            );
            ProtocolError::from(e)
        })?;
        Ok(OutboundEnvelope::response(request.id, response))
    }
}
