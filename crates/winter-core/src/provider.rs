//! Dynamic value providers.
//!
//! A provider is a host-supplied source of permissible values for named
//! dictionary types (a status table, a country list, ...). The registry keeps
//! them in a deterministic candidate order: priority descending, then
//! registration order. Which candidates are consulted is decided by the
//! [`SelectionPolicy`].

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::config::SelectionPolicy;
use crate::error::ProviderError;

/// A source of allowed values for dictionary types.
pub trait DictDataProvider: Send + Sync {
    /// Name used in logs and provider error messages.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Whether this provider can answer for `dict_type`.
    fn supports(&self, dict_type: &str) -> bool;

    /// Values for `dict_type`. With `reverse` set the provider returns its keys
    /// instead of its display values.
    fn get_dict_values(&self, dict_type: &str, reverse: bool) -> Result<Vec<String>, ProviderError>;
}

struct Registration {
    provider: Arc<dyn DictDataProvider>,
    priority: i32,
    sequence: u64,
}

#[derive(Default)]
struct Registrations {
    entries: Vec<Registration>,
    next_sequence: u64,
}

/// Ordered set of registered providers.
#[derive(Default)]
pub struct ProviderRegistry {
    inner: RwLock<Registrations>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register with priority 0.
    pub fn register(&self, provider: Arc<dyn DictDataProvider>) {
        self.register_with_priority(provider, 0);
    }

    /// Register a provider. Higher priorities are consulted first.
    pub fn register_with_priority(&self, provider: Arc<dyn DictDataProvider>, priority: i32) {
        let mut inner = self.inner.write();
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        inner.entries.push(Registration {
            provider,
            priority,
            sequence,
        });
        inner.entries.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.sequence.cmp(&b.sequence))
        });
    }

    /// Providers in the order they are consulted.
    pub fn candidates(&self) -> Vec<Arc<dyn DictDataProvider>> {
        self.inner
            .read()
            .entries
            .iter()
            .map(|entry| Arc::clone(&entry.provider))
            .collect()
    }

    /// The provider that answers for `dict_type` under `policy`, if any.
    pub fn select(
        &self,
        dict_type: &str,
        policy: SelectionPolicy,
    ) -> Option<Arc<dyn DictDataProvider>> {
        let inner = self.inner.read();
        match policy {
            SelectionPolicy::FirstSupporting => inner
                .entries
                .iter()
                .find(|entry| entry.provider.supports(dict_type))
                .map(|entry| Arc::clone(&entry.provider)),
            SelectionPolicy::PrimaryOnly => inner
                .entries
                .first()
                .filter(|entry| entry.provider.supports(dict_type))
                .map(|entry| Arc::clone(&entry.provider)),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_list()
            .entries(
                inner
                    .entries
                    .iter()
                    .map(|e| (e.provider.name().to_string(), e.priority)),
            )
            .finish()
    }
}

/// Fallback provider that supports no dictionary type.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultDictProvider;

impl DictDataProvider for DefaultDictProvider {
    fn name(&self) -> &str {
        "default"
    }

    fn supports(&self, _dict_type: &str) -> bool {
        false
    }

    fn get_dict_values(&self, dict_type: &str, _reverse: bool) -> Result<Vec<String>, ProviderError> {
        Err(ProviderError::UnknownDictionary {
            provider: self.name().to_string(),
            dict_type: dict_type.to_string(),
        })
    }
}

/// In-memory dictionaries of `key -> label` entries.
///
/// Forward lookups yield labels, reversed lookups yield keys.
#[derive(Debug, Clone)]
pub struct StaticDictProvider {
    name: String,
    dicts: IndexMap<String, IndexMap<String, String>>,
}

impl StaticDictProvider {
    pub fn new() -> Self {
        Self {
            name: "static".to_string(),
            dicts: IndexMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add or replace a dictionary from `(key, label)` entries.
    pub fn with_dict<K, L, I>(mut self, dict_type: impl Into<String>, entries: I) -> Self
    where
        K: Into<String>,
        L: Into<String>,
        I: IntoIterator<Item = (K, L)>,
    {
        self.insert_dict(dict_type, entries);
        self
    }

    /// Add a dictionary whose keys and labels coincide.
    pub fn with_values<V, I>(self, dict_type: impl Into<String>, values: I) -> Self
    where
        V: Into<String>,
        I: IntoIterator<Item = V>,
    {
        self.with_dict(
            dict_type,
            values.into_iter().map(|v| {
                let v = v.into();
                (v.clone(), v)
            }),
        )
    }

    pub fn insert_dict<K, L, I>(&mut self, dict_type: impl Into<String>, entries: I)
    where
        K: Into<String>,
        L: Into<String>,
        I: IntoIterator<Item = (K, L)>,
    {
        let entries = entries
            .into_iter()
            .map(|(k, l)| (k.into(), l.into()))
            .collect();
        self.dicts.insert(dict_type.into(), entries);
    }

    pub fn dict_types(&self) -> impl Iterator<Item = &str> {
        self.dicts.keys().map(String::as_str)
    }
}

impl Default for StaticDictProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DictDataProvider for StaticDictProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, dict_type: &str) -> bool {
        self.dicts.contains_key(dict_type)
    }

    fn get_dict_values(&self, dict_type: &str, reverse: bool) -> Result<Vec<String>, ProviderError> {
        let dict = self
            .dicts
            .get(dict_type)
            .ok_or_else(|| ProviderError::UnknownDictionary {
                provider: self.name.clone(),
                dict_type: dict_type.to_string(),
            })?;

        Ok(if reverse {
            dict.keys().cloned().collect()
        } else {
            dict.values().cloned().collect()
        })
    }
}
