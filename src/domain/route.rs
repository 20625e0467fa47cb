//! Application routes and the server-wide route table.
//!
//! A [`Route`] binds a method and path to a [`RouteHandler`]. Routes may
//! also carry an identifier so clients can address them without knowing
//! the path. Whether an identifier is usable is fixed when the route is
//! built: a wildcard-method route with an id is tagged
//! [`RouteAddress::NamedWildcard`] and is refused by identifier lookup.
//!
//! The [`RouteTable`] is filled once before serving and shared read-only
//! behind an `Arc` afterwards.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::http::Method;

use super::handler::RouteHandler;
use crate::error::GatewayError;

/// Method a route is registered for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RouteMethod {
    /// Matches any method (`*`).
    Any,
    /// Matches exactly one method.
    Exact(Method),
}

impl RouteMethod {
    /// Parses `*` as [`RouteMethod::Any`] and anything else as a
    /// case-insensitive HTTP method.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidMethod`] if the string is not a valid
    /// method token.
    pub fn parse(method: &str) -> Result<Self, GatewayError> {
        if method == "*" {
            return Ok(Self::Any);
        }
        Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map(Self::Exact)
            .map_err(|_| GatewayError::InvalidMethod(method.to_string()))
    }

    /// Returns the concrete method, or `None` for the wildcard.
    #[must_use]
    pub const fn concrete(&self) -> Option<&Method> {
        match self {
            Self::Any => None,
            Self::Exact(method) => Some(method),
        }
    }

    /// Returns `true` if this is the wildcard method.
    #[must_use]
    pub const fn is_wildcard(&self) -> bool {
        matches!(self, Self::Any)
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Exact(method) => f.write_str(method.as_str()),
        }
    }
}

impl From<Method> for RouteMethod {
    fn from(method: Method) -> Self {
        Self::Exact(method)
    }
}

/// How a route may be addressed by socket clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAddress {
    /// Reachable by method and path only.
    Path,
    /// Reachable by method and path, or by this identifier.
    Named(String),
    /// Carries an identifier but uses the wildcard method, so identifier
    /// lookups are refused.
    NamedWildcard(String),
}

impl RouteAddress {
    /// Returns the identifier, if the route has one.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Path => None,
            Self::Named(id) | Self::NamedWildcard(id) => Some(id),
        }
    }
}

/// A registered application endpoint.
#[derive(Clone)]
pub struct Route {
    method: RouteMethod,
    path: String,
    address: RouteAddress,
    socket_visible: bool,
    handler: Arc<dyn RouteHandler>,
}

impl Route {
    /// Creates a route for `method` and `path`.
    pub fn new(
        method: impl Into<RouteMethod>,
        path: impl Into<String>,
        handler: impl RouteHandler,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            address: RouteAddress::Path,
            socket_visible: true,
            handler: Arc::new(handler),
        }
    }

    /// Creates a `GET` route.
    pub fn get(path: impl Into<String>, handler: impl RouteHandler) -> Self {
        Self::new(Method::GET, path, handler)
    }

    /// Creates a `POST` route.
    pub fn post(path: impl Into<String>, handler: impl RouteHandler) -> Self {
        Self::new(Method::POST, path, handler)
    }

    /// Creates a wildcard-method route.
    pub fn any(path: impl Into<String>, handler: impl RouteHandler) -> Self {
        Self::new(RouteMethod::Any, path, handler)
    }

    /// Attaches an identifier to the route.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.address = if self.method.is_wildcard() {
            RouteAddress::NamedWildcard(id)
        } else {
            RouteAddress::Named(id)
        };
        self
    }

    /// Keeps the route out of socket resolution. It still occupies its
    /// method, path and identifier in the table.
    #[must_use]
    pub fn hidden_from_socket(mut self) -> Self {
        self.socket_visible = false;
        self
    }

    /// Registered method.
    #[must_use]
    pub const fn method(&self) -> &RouteMethod {
        &self.method
    }

    /// Registered path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Addressing mode.
    #[must_use]
    pub const fn address(&self) -> &RouteAddress {
        &self.address
    }

    /// Returns `false` for routes hidden from socket clients.
    #[must_use]
    pub const fn socket_visible(&self) -> bool {
        self.socket_visible
    }

    /// Handler capability of the route.
    #[must_use]
    pub fn handler(&self) -> &Arc<dyn RouteHandler> {
        &self.handler
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("address", &self.address)
            .field("socket_visible", &self.socket_visible)
            .finish_non_exhaustive()
    }
}

/// Server-wide route table.
///
/// Exact-method routes take precedence over a wildcard route on the same
/// path.
#[derive(Debug, Default)]
pub struct RouteTable {
    exact: HashMap<(Method, String), Arc<Route>>,
    wildcard: HashMap<String, Arc<Route>>,
    by_id: HashMap<String, Arc<Route>>,
}

impl RouteTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a route.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::InvalidRoutePath`] if the path does not start with `/`.
    /// - [`GatewayError::DuplicateRoute`] if the method and path are taken.
    /// - [`GatewayError::DuplicateRouteId`] if the identifier is taken.
    pub fn register(&mut self, route: Route) -> Result<(), GatewayError> {
        if !route.path.starts_with('/') {
            return Err(GatewayError::InvalidRoutePath(route.path));
        }
        let taken = match &route.method {
            RouteMethod::Any => self.wildcard.contains_key(&route.path),
            RouteMethod::Exact(method) => self
                .exact
                .contains_key(&(method.clone(), route.path.clone())),
        };
        if taken {
            return Err(GatewayError::DuplicateRoute {
                method: route.method.to_string(),
                path: route.path,
            });
        }
        if let Some(id) = route.address.id()
            && self.by_id.contains_key(id)
        {
            return Err(GatewayError::DuplicateRouteId(id.to_string()));
        }

        tracing::debug!(
            method = %route.method,
            path = %route.path,
            id = ?route.address.id(),
            "route registered"
        );

        let route = Arc::new(route);
        if let Some(id) = route.address.id() {
            let _ = self.by_id.insert(id.to_string(), Arc::clone(&route));
        }
        match &route.method {
            RouteMethod::Any => {
                let _ = self.wildcard.insert(route.path.clone(), route);
            }
            RouteMethod::Exact(method) => {
                let _ = self
                    .exact
                    .insert((method.clone(), route.path.clone()), route);
            }
        }
        Ok(())
    }

    /// Registers a route and returns the table, for builder-style setup.
    ///
    /// # Errors
    ///
    /// Same as [`RouteTable::register`].
    pub fn with(mut self, route: Route) -> Result<Self, GatewayError> {
        self.register(route)?;
        Ok(self)
    }

    /// Looks up a route by identifier.
    #[must_use]
    pub fn lookup_by_id(&self, id: &str) -> Option<&Arc<Route>> {
        self.by_id.get(id)
    }

    /// Looks up a route by method and path, falling back to a wildcard
    /// route on the same path.
    #[must_use]
    pub fn lookup(&self, method: &Method, path: &str) -> Option<&Arc<Route>> {
        self.exact
            .get(&(method.clone(), path.to_string()))
            .or_else(|| self.wildcard.get(path))
    }

    /// Number of registered routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.exact.len() + self.wildcard.len()
    }

    /// Returns `true` if no route is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
