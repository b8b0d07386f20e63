//! Provider registry
//!
//! Static, read-only table of providers grouped by query kind. Built once at
//! startup through [`RegistryBuilder`] and shared without locking; the order
//! returned by [`ProviderRegistry::providers_for`] is registration order and
//! drives the deterministic ordering of dispatch output.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::QueryKind;

use super::Provider;

/// Immutable provider table keyed by query kind
pub struct ProviderRegistry {
    by_kind: HashMap<QueryKind, Vec<Arc<dyn Provider>>>,
}

impl ProviderRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            by_kind: HashMap::new(),
        }
    }

    /// Providers registered for a kind, in registration order
    pub fn providers_for(&self, kind: QueryKind) -> &[Arc<dyn Provider>] {
        self.by_kind.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of registered providers across all kinds
    pub fn len(&self) -> usize {
        self.by_kind.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_kind.values().all(Vec::is_empty)
    }
}

/// Consumed at startup to produce an immutable [`ProviderRegistry`]
#[derive(Default)]
pub struct RegistryBuilder {
    by_kind: HashMap<QueryKind, Vec<Arc<dyn Provider>>>,
}

impl RegistryBuilder {
    /// Register a provider under its own kind, preserving insertion order
    pub fn register<P: Provider + 'static>(mut self, provider: P) -> Self {
        self.by_kind
            .entry(provider.kind())
            .or_default()
            .push(Arc::new(provider));
        self
    }

    /// Register an already-shared provider
    pub fn register_arc(mut self, provider: Arc<dyn Provider>) -> Self {
        self.by_kind.entry(provider.kind()).or_default().push(provider);
        self
    }

    pub fn build(self) -> ProviderRegistry {
        ProviderRegistry {
            by_kind: self.by_kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use async_trait::async_trait;

    struct Named {
        id: String,
        kind: QueryKind,
    }

    #[async_trait]
    impl Provider for Named {
        fn id(&self) -> &str {
            &self.id
        }

        fn kind(&self) -> QueryKind {
            self.kind
        }

        async fn query(&self, _target: &str) -> Result<serde_json::Value, ProviderError> {
            Ok(serde_json::json!({}))
        }
    }

    fn named(id: &str, kind: QueryKind) -> Named {
        Named {
            id: id.to_string(),
            kind,
        }
    }

    #[test]
    fn test_registration_order_is_preserved() {
        let registry = ProviderRegistry::builder()
            .register(named("c", QueryKind::Username))
            .register(named("a", QueryKind::Username))
            .register(named("b", QueryKind::Username))
            .build();

        let ids: Vec<&str> = registry
            .providers_for(QueryKind::Username)
            .iter()
            .map(|p| p.id())
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_kinds_are_partitioned() {
        let registry = ProviderRegistry::builder()
            .register(named("u", QueryKind::Username))
            .register(named("e", QueryKind::Email))
            .build();

        assert_eq!(registry.providers_for(QueryKind::Username).len(), 1);
        assert_eq!(registry.providers_for(QueryKind::Email).len(), 1);
        assert!(registry.providers_for(QueryKind::Ip).is_empty());
        assert_eq!(registry.len(), 2);
    }
}
