//! Application facade: registration, configuration, and the HTTP server loop.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinError;

use crate::builtin::Defaults;
use crate::cancellation::CancellationToken;
use crate::config::{AppConfig, Config, ConfigError, Settings};
use crate::dispatcher::RequestDispatcher;
use crate::ids::{SequenceIdGenerator, UniqueIdGenerator};
use crate::logging::init_tracing;
use crate::traits::{Controller, Logger, Middleware, Provides};
use crate::{DiError, DiResult, ResolutionContext, ServiceCollection, ServiceCollectionExt, ServiceModule};

/// Errors that stop [`App::run`].
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Di(#[from] DiError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("server I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("server task failed: {0}")]
    Join(#[from] JoinError),
}

/// An HTTP application assembled from registrations.
///
/// The loaded [`Config<AppConfig>`] and the [`Settings`] are registered as
/// instances, so builders can resolve them.
///
/// # Examples
///
/// ```no_run
/// use scopeline::App;
/// use scopeline::builtin::TimeoutMiddleware;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut app = App::from_settings(Default::default())?.with_defaults()?;
///     app.use_middleware(TimeoutMiddleware::new);
///     app.run().await?;
///     Ok(())
/// }
/// ```
pub struct App {
    services: ServiceCollection,
    settings: Settings,
    config: Arc<Config<AppConfig>>,
    ids: Arc<dyn UniqueIdGenerator>,
}

impl App {
    pub fn new(settings: Settings, config: Config<AppConfig>) -> Self {
        let config = Arc::new(config);
        let mut services = ServiceCollection::with_application(config.value().name.clone());
        services.add_shared(config.clone()).add_instance(settings.clone());
        Self {
            services,
            settings,
            config,
            ids: Arc::new(SequenceIdGenerator::new()),
        }
    }

    /// Loads [`AppConfig`] from files and environment as described by `settings`.
    pub fn from_settings(settings: Settings) -> Result<Self, ConfigError> {
        let config = AppConfig::load(&settings)?;
        Ok(Self::new(settings, config))
    }

    /// Adds the [`Defaults`] module.
    pub fn with_defaults(mut self) -> DiResult<Self> {
        self.services.add_module(Defaults)?;
        Ok(self)
    }

    pub fn with_id_generator(mut self, ids: impl UniqueIdGenerator) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    pub fn config(&self) -> &AppConfig {
        self.config.value()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn services(&mut self) -> &mut ServiceCollection {
        &mut self.services
    }

    pub fn register<T, C, F>(&mut self, builder: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        C: Provides<T>,
        F: Fn(&ResolutionContext) -> DiResult<C> + Send + Sync + 'static,
    {
        self.services.register::<T, C, F>(builder);
        self
    }

    pub fn add_service<C, F>(&mut self, builder: F) -> &mut Self
    where
        C: Send + Sync + 'static,
        F: Fn(&ResolutionContext) -> DiResult<C> + Send + Sync + 'static,
    {
        self.services.add_service(builder);
        self
    }

    pub fn add_controller<C, F>(&mut self, builder: F) -> &mut Self
    where
        C: Controller,
        F: Fn(&ResolutionContext) -> DiResult<C> + Send + Sync + 'static,
    {
        self.services.add_controller(builder);
        self
    }

    pub fn use_middleware<M, F>(&mut self, builder: F) -> &mut Self
    where
        M: Middleware,
        F: Fn(&ResolutionContext) -> DiResult<M> + Send + Sync + 'static,
    {
        self.services.use_middleware(builder);
        self
    }

    pub fn add_logger<L, F>(&mut self, builder: F) -> &mut Self
    where
        L: Logger,
        F: Fn(&ResolutionContext) -> DiResult<L> + Send + Sync + 'static,
    {
        self.services.add_logger(builder);
        self
    }

    pub fn add_module<M: ServiceModule>(&mut self, module: M) -> DiResult<&mut Self> {
        self.services.add_module(module)?;
        Ok(self)
    }

    /// Freezes the registrations into a dispatcher.
    pub fn into_dispatcher(self) -> DiResult<RequestDispatcher> {
        let container = self.services.build()?;
        Ok(RequestDispatcher::new(container).with_id_generator(self.ids))
    }

    /// Binds `Server.Host:Server.Port` and serves until Ctrl-C.
    pub async fn run(self) -> Result<(), AppError> {
        init_tracing(&self.config.value().log.level);
        let address = self.config.value().server.address();
        let listener = TcpListener::bind(&address).await?;
        self.serve(listener, ctrl_c()).await
    }

    /// Serves on `listener` until `shutdown` completes, then drains
    /// in-flight requests for at most [`Settings::shutdown_timeout`].
    pub async fn serve<S>(self, listener: TcpListener, shutdown: S) -> Result<(), AppError>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let grace = self.settings.shutdown_timeout;
        let dispatcher = self.into_dispatcher()?;
        dispatcher.start()?;

        let address = listener.local_addr()?;
        let router = Router::new().fallback_service(dispatcher.clone());
        let stop = CancellationToken::new();
        let server_stop = stop.clone();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move { server_stop.cancelled().await })
                .await
        });
        tracing::info!(%address, "server start");

        let result = tokio::select! {
            joined = &mut server => flatten(joined),
            _ = shutdown => {
                stop.cancel();
                match tokio::time::timeout(grace, &mut server).await {
                    Ok(joined) => flatten(joined),
                    Err(_) => {
                        tracing::warn!(?grace, "graceful shutdown timed out");
                        server.abort();
                        Ok(())
                    }
                }
            }
        };

        dispatcher.shutdown()?;
        tracing::info!("server stop");
        result
    }
}

fn flatten(joined: Result<io::Result<()>, JoinError>) -> Result<(), AppError> {
    Ok(joined??)
}

async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "cannot listen for Ctrl-C; serving until killed");
        std::future::pending::<()>().await;
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config", self.config.value())
            .field("registrations", &self.services.len())
            .finish()
    }
}
