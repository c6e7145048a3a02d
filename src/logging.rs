//! Structured logging on top of `tracing`.
//!
//! Services log through the [`Logger`] capability resolved from the
//! container. The default implementation, [`TracingLogger`], turns each
//! record into a `tracing` event, so output format and filtering are those of
//! whatever subscriber the binary installs (see [`init_tracing`]).

use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, Config};
use crate::key::Key;
use crate::provider::ResolutionContext;
use crate::traits::{field, Field, Logger};
use crate::DiResult;

/// Well-known field keys.
pub mod fields {
    pub const APPLICATION: &str = "application";
    pub const ENVIRONMENT: &str = "environment";
    pub const SERVICE: &str = "service";
    pub const REQUEST_ID: &str = "requestId";
    pub const HTTP: &str = "http";
    pub const METHOD: &str = "method";
    pub const HOST: &str = "host";
    pub const URL: &str = "url";
    pub const REMOTE: &str = "remote";
    pub const AGENT: &str = "agent";
    pub const STATUS: &str = "status";
    pub const DURATION: &str = "duration";
}

/// Installs a global `fmt` subscriber.
///
/// `RUST_LOG` wins over `level` when set. Returns `false` if a global
/// subscriber was already installed.
pub fn init_tracing(level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}

/// [`Logger`] that emits `tracing` events under the `scopeline` target.
#[derive(Debug, Clone, Default)]
pub struct TracingLogger {
    fields: Vec<Field>,
    group: Option<String>,
}

impl TracingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A logger tagged with the application name and environment, when an
    /// [`AppConfig`] is registered.
    pub fn from_context(ctx: &ResolutionContext) -> DiResult<Self> {
        let mut logger = Self::new();
        if ctx.container().is_registered(&Key::of::<Config<AppConfig>>()) {
            let config = ctx.config::<AppConfig>()?;
            logger.fields.push(field(fields::APPLICATION, &config.value().name));
            logger.fields.push(field(fields::ENVIRONMENT, &config.value().environment));
        }
        Ok(logger)
    }

    /// Fields attached to every record.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    fn qualify(&self, f: &Field) -> Field {
        match &self.group {
            Some(group) => field(format!("{}.{}", group, f.key), &f.value),
            None => f.clone(),
        }
    }
}

fn render<'a>(fields: impl Iterator<Item = &'a Field>) -> String {
    fields
        .map(|f| {
            if f.value.contains(char::is_whitespace) {
                format!("{}={:?}", f.key, f.value)
            } else {
                format!("{}={}", f.key, f.value)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl Logger for TracingLogger {
    fn log(&self, level: Level, message: &str, fields: &[Field]) {
        let extra: Vec<Field> = fields.iter().map(|f| self.qualify(f)).collect();
        let rendered = render(self.fields.iter().chain(extra.iter()));

        if level == Level::ERROR {
            tracing::error!(target: "scopeline", fields = %rendered, "{}", message);
        } else if level == Level::WARN {
            tracing::warn!(target: "scopeline", fields = %rendered, "{}", message);
        } else if level == Level::INFO {
            tracing::info!(target: "scopeline", fields = %rendered, "{}", message);
        } else if level == Level::DEBUG {
            tracing::debug!(target: "scopeline", fields = %rendered, "{}", message);
        } else {
            tracing::trace!(target: "scopeline", fields = %rendered, "{}", message);
        }
    }

    fn with(&self, fields: Vec<Field>) -> Arc<dyn Logger> {
        let mut next = self.clone();
        next.fields.extend(fields.iter().map(|f| self.qualify(f)));
        Arc::new(next)
    }

    fn with_group(&self, name: &str) -> Arc<dyn Logger> {
        let mut next = self.clone();
        next.group = Some(match &self.group {
            Some(group) => format!("{}.{}", group, name),
            None => name.to_string(),
        });
        Arc::new(next)
    }
}

/// [`Logger`] that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _: Level, _: &str, _: &[Field]) {}

    fn with(&self, _: Vec<Field>) -> Arc<dyn Logger> {
        Arc::new(NullLogger)
    }

    fn with_group(&self, _: &str) -> Arc<dyn Logger> {
        Arc::new(NullLogger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ungrouped_fields_keep_their_keys() {
        let logger = TracingLogger::new();
        assert_eq!(logger.qualify(&field("method", "GET")).key, "method");

        let grouped = TracingLogger {
            group: Some("http".into()),
            ..logger
        };
        assert_eq!(grouped.qualify(&field("method", "GET")).key, "http.method");
    }

    #[test]
    fn nested_groups_join_with_dots() {
        let logger = TracingLogger {
            fields: Vec::new(),
            group: Some("http.request".into()),
        };
        assert_eq!(logger.qualify(&field("url", "/")).key, "http.request.url");
    }

    #[test]
    fn values_with_spaces_are_quoted() {
        let fields = [field("agent", "curl 8.0"), field("status", 200)];
        assert_eq!(render(fields.iter()), r#"agent="curl 8.0" status=200"#);
    }

    #[test]
    fn from_context_reads_application_config() {
        let mut services = crate::ServiceCollection::new();
        services.add_instance(Config::new(AppConfig {
            name: "billing".into(),
            ..AppConfig::default()
        }));
        let container = services.build().unwrap();
        let logger = TracingLogger::from_context(&ResolutionContext::application(&container)).unwrap();
        assert_eq!(logger.fields()[0], field(fields::APPLICATION, "billing"));
        assert_eq!(logger.fields()[1], field(fields::ENVIRONMENT, "development"));
    }

    #[test]
    fn null_logger_stays_null() {
        let logger = NullLogger.with(vec![field("a", 1)]).with_group("g");
        logger.info("ignored", &[]);
    }
}
