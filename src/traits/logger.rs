use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use tracing::Level;

use super::Provides;

/// A structured key/value pair attached to a log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub key: Cow<'static, str>,
    pub value: String,
}

/// Builds a [`Field`] from anything displayable.
pub fn field(key: impl Into<Cow<'static, str>>, value: impl fmt::Display) -> Field {
    Field {
        key: key.into(),
        value: value.to_string(),
    }
}

/// Leveled, structured logger resolved through the container.
pub trait Logger: Send + Sync + 'static {
    fn log(&self, level: Level, message: &str, fields: &[Field]);

    /// A logger that attaches `fields` to every record.
    fn with(&self, fields: Vec<Field>) -> Arc<dyn Logger>;

    /// A logger whose subsequent field keys are prefixed with `name.`.
    fn with_group(&self, name: &str) -> Arc<dyn Logger>;

    fn debug(&self, message: &str, fields: &[Field]) {
        self.log(Level::DEBUG, message, fields);
    }

    fn info(&self, message: &str, fields: &[Field]) {
        self.log(Level::INFO, message, fields);
    }

    fn warn(&self, message: &str, fields: &[Field]) {
        self.log(Level::WARN, message, fields);
    }

    fn error(&self, message: &str, fields: &[Field]) {
        self.log(Level::ERROR, message, fields);
    }
}

impl<L: Logger> Provides<dyn Logger> for L {
    fn upcast(self: Arc<Self>) -> Arc<dyn Logger> {
        self
    }
}
