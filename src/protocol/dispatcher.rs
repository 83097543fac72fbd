use crate::config::{DispatchConfig, MissPolicy, RoutingPolicy};
use crate::core::package::Package;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::context::HandlerContext;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{trace, warn};

/// Capability invoked for packages routed to it.
pub trait PackageHandler: Send + Sync + 'static {
    fn handle(&self, package: Package, ctx: HandlerContext) -> BoxFuture<'static, Result<()>>;
}

impl<F, Fut> PackageHandler for F
where
    F: Fn(Package, HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    fn handle(&self, package: Package, ctx: HandlerContext) -> BoxFuture<'static, Result<()>> {
        Box::pin((self)(package, ctx))
    }
}

/// Registry key. `id: None` matches every id of the given type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub id: Option<u16>,
    pub kind: u8,
}

impl RouteKey {
    pub fn exact(id: u16, kind: u8) -> Self {
        Self { id: Some(id), kind }
    }

    pub fn any_id(kind: u8) -> Self {
        Self { id: None, kind }
    }
}

/// Result of a successful dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled,
    /// No handler matched; the package was dropped under the miss policy.
    Missed,
}

/// Handler as stored in the route table.
pub type SharedHandler = Arc<dyn PackageHandler>;

/// Collects routes at setup time and freezes them into a [`Dispatcher`].
pub struct DispatcherBuilder {
    config: DispatchConfig,
    handlers: HashMap<RouteKey, SharedHandler>,
    fallback: Option<SharedHandler>,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new(&DispatchConfig::default())
    }
}

impl DispatcherBuilder {
    pub fn new(config: &DispatchConfig) -> Self {
        Self {
            config: *config,
            handlers: HashMap::new(),
            fallback: None,
        }
    }

    /// Route packages with this exact `(id, type)` to `handler`.
    pub fn register<H: PackageHandler>(
        &mut self,
        id: u16,
        kind: u8,
        handler: H,
    ) -> Result<&mut Self> {
        if self.config.routing == RoutingPolicy::TypeOnly {
            return Err(ProtocolError::ConfigError(format!(
                "{} (id={id} type={kind})",
                constants::ERR_ID_ROUTE_UNDER_TYPE_ONLY
            )));
        }
        self.insert(RouteKey::exact(id, kind), Arc::new(handler))
    }

    /// Route every package of this type, whatever its id, to `handler`.
    pub fn register_type<H: PackageHandler>(
        &mut self,
        kind: u8,
        handler: H,
    ) -> Result<&mut Self> {
        self.insert(RouteKey::any_id(kind), Arc::new(handler))
    }

    /// Handler used when no route matches, instead of the miss policy.
    pub fn fallback<H: PackageHandler>(&mut self, handler: H) -> &mut Self {
        self.fallback = Some(Arc::new(handler));
        self
    }

    fn insert(&mut self, key: RouteKey, handler: SharedHandler) -> Result<&mut Self> {
        if self.handlers.contains_key(&key) {
            return Err(ProtocolError::ConfigError(format!(
                "{}: {key:?}",
                constants::ERR_DUPLICATE_ROUTE
            )));
        }
        self.handlers.insert(key, handler);
        Ok(self)
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            config: self.config,
            handlers: self.handlers,
            fallback: self.fallback,
        }
    }
}

/// Routes packages to handlers by `(id, type)`.
///
/// The route table is fixed once built, so lookups need no locking and the
/// dispatcher can be shared across sessions behind an `Arc`.
pub struct Dispatcher {
    config: DispatchConfig,
    handlers: HashMap<RouteKey, SharedHandler>,
    fallback: Option<SharedHandler>,
}

impl Dispatcher {
    pub fn builder(config: &DispatchConfig) -> DispatcherBuilder {
        DispatcherBuilder::new(config)
    }

    pub fn routing_policy(&self) -> RoutingPolicy {
        self.config.routing
    }

    pub fn route_count(&self) -> usize {
        self.handlers.len()
    }

    /// Look up the handler for a package, or a [`ProtocolError::DispatchMiss`].
    pub fn handler_for(&self, package: &Package) -> Result<&SharedHandler> {
        let exact = match self.config.routing {
            RoutingPolicy::IdAndType => {
                self.handlers.get(&RouteKey::exact(package.id, package.kind))
            }
            RoutingPolicy::TypeOnly => None,
        };

        exact
            .or_else(|| self.handlers.get(&RouteKey::any_id(package.kind)))
            .or(self.fallback.as_ref())
            .ok_or(ProtocolError::DispatchMiss {
                id: package.id,
                kind: package.kind,
            })
    }

    /// Run the handler for `package` to completion.
    ///
    /// A missing route is reported per the miss policy and yields
    /// [`DispatchOutcome::Missed`]; `Err` always means the handler failed.
    pub async fn dispatch(&self, package: Package, ctx: HandlerContext) -> Result<DispatchOutcome> {
        let handler = match self.handler_for(&package) {
            Ok(handler) => Arc::clone(handler),
            Err(miss) => {
                match self.config.miss_policy {
                    MissPolicy::Report => {
                        warn!(session_id = ctx.session_id(), error = %miss, "Dropping unroutable package")
                    }
                    MissPolicy::Silent => {
                        trace!(session_id = ctx.session_id(), error = %miss, "Dropping unroutable package")
                    }
                }
                return Ok(DispatchOutcome::Missed);
            }
        };

        handler.handle(package, ctx).await?;
        Ok(DispatchOutcome::Handled)
    }
}
