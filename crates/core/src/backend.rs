//! Backend descriptor table.
//!
//! Built once at process start and immutable afterwards. Entries are kept
//! sorted by ascending priority, which is the order the orchestrator tries
//! them in.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::provider::Provider;

/// Static description of one text-generation backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendDescriptor {
    /// Unique key
    pub name: String,
    /// Ascending = tried first. Priority 1 is the primary backend.
    pub priority: u32,
    /// Total attempts allowed per call, including the first (>= 1)
    pub max_retries: u32,
    /// Response size cap forwarded to the backend
    pub max_response_size: u32,
    /// Deadline for a single attempt
    pub timeout: Duration,
}

impl BackendDescriptor {
    pub fn new(name: impl Into<String>, priority: u32) -> Self {
        Self {
            name: name.into(),
            priority,
            max_retries: 3,
            max_response_size: 2048,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_max_response_size(mut self, max_response_size: u32) -> Self {
        self.max_response_size = max_response_size;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether answers from this backend count as degraded quality.
    pub fn is_fallback(&self) -> bool {
        self.priority > 1
    }
}

/// A descriptor paired with the adapter that talks to the backend.
#[derive(Clone)]
pub struct Backend {
    pub descriptor: BackendDescriptor,
    /// Model identifier sent with every request
    pub model: String,
    pub provider: Arc<dyn Provider>,
}

impl Backend {
    pub fn new(descriptor: BackendDescriptor, model: impl Into<String>, provider: Arc<dyn Provider>) -> Self {
        Self {
            descriptor,
            model: model.into(),
            provider,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("descriptor", &self.descriptor)
            .field("model", &self.model)
            .field("provider", &self.provider.name())
            .finish()
    }
}

/// The process-wide, priority-ordered set of backends.
#[derive(Debug, Clone, Default)]
pub struct BackendTable {
    backends: Vec<Backend>,
}

impl BackendTable {
    /// Validate and sort the given backends.
    pub fn new(mut backends: Vec<Backend>) -> Result<Self> {
        let mut names = HashSet::new();
        for backend in &backends {
            let d = &backend.descriptor;
            if !names.insert(d.name.clone()) {
                return Err(Error::Config {
                    message: format!("duplicate backend name '{}'", d.name),
                });
            }
            if d.priority == 0 {
                return Err(Error::Config {
                    message: format!("backend '{}': priority must be >= 1", d.name),
                });
            }
            if d.max_retries == 0 {
                return Err(Error::Config {
                    message: format!("backend '{}': max_retries must be >= 1", d.name),
                });
            }
        }

        backends.sort_by(|a, b| {
            a.descriptor
                .priority
                .cmp(&b.descriptor.priority)
                .then_with(|| a.descriptor.name.cmp(&b.descriptor.name))
        });
        Ok(Self { backends })
    }

    pub fn get(&self, name: &str) -> Option<&Backend> {
        self.backends.iter().find(|b| b.name() == name)
    }

    /// Backends in ascending priority order.
    pub fn iter(&self) -> impl Iterator<Item = &Backend> {
        self.backends.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// The subset named in `allowed`, in priority order.
    ///
    /// Unknown names are ignored and each backend appears at most once no
    /// matter how often it is named.
    pub fn select(&self, allowed: &[String]) -> Vec<&Backend> {
        self.backends
            .iter()
            .filter(|b| allowed.iter().any(|name| name == b.name()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::message::Message;
    use crate::provider::{ProviderRequest, ProviderResponse};
    use async_trait::async_trait;

    struct EchoProvider(&'static str);

    #[async_trait]
    impl Provider for EchoProvider {
        fn name(&self) -> &str {
            self.0
        }

        async fn send(
            &self,
            request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            Ok(ProviderResponse {
                message: Message::assistant(request.prompt().unwrap_or_default()),
                usage: None,
                model: request.model,
            })
        }
    }

    fn backend(name: &'static str, priority: u32) -> Backend {
        Backend::new(
            BackendDescriptor::new(name, priority),
            "model",
            Arc::new(EchoProvider(name)),
        )
    }

    #[test]
    fn table_sorts_by_priority() {
        let table = BackendTable::new(vec![
            backend("c", 3),
            backend("a", 1),
            backend("b", 2),
        ])
        .unwrap();
        assert_eq!(table.names(), vec!["a", "b", "c"]);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn duplicate_names_rejected() {
        let result = BackendTable::new(vec![backend("a", 1), backend("a", 2)]);
        assert!(result.is_err());
    }

    #[test]
    fn zero_retries_rejected() {
        let mut b = backend("a", 1);
        b.descriptor.max_retries = 0;
        assert!(BackendTable::new(vec![b]).is_err());
    }

    #[test]
    fn select_keeps_priority_order_and_deduplicates() {
        let table = BackendTable::new(vec![backend("a", 1), backend("b", 2), backend("c", 3)]).unwrap();
        let allowed = vec!["c".to_string(), "a".to_string(), "c".to_string(), "zzz".to_string()];
        let selected: Vec<&str> = table.select(&allowed).iter().map(|b| b.name()).collect();
        assert_eq!(selected, vec!["a", "c"]);
    }

    #[test]
    fn fallback_flag_follows_priority() {
        assert!(!BackendDescriptor::new("primary", 1).is_fallback());
        assert!(BackendDescriptor::new("secondary", 2).is_fallback());
    }
}
