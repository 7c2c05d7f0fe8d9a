//! Serializer configuration.

use crate::handler::Handler;
use std::{fmt, sync::Arc};

/// Settings captured when a [crate::Serializer] is constructed.
///
/// ```
/// use commonware_serializer::{Config, NoOpHandler};
/// use std::sync::Arc;
///
/// let config = Config {
///     handlers: vec![Arc::new(NoOpHandler::default())],
///     callbacks: true,
/// };
/// assert_eq!(config.handlers.len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct Config {
    /// Custom handlers, consulted in order before the built-in ones.
    pub handlers: Vec<Arc<dyn Handler>>,

    /// Whether lifecycle hooks of composite types are invoked.
    pub callbacks: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers: Vec<_> = self.handlers.iter().map(|handler| handler.name()).collect();
        f.debug_struct("Config")
            .field("handlers", &handlers)
            .field("callbacks", &self.callbacks)
            .finish()
    }
}
