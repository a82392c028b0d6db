use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tracing::info;

use super::schema::ToolSchema;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool schema not found: {name}")]
    NotFound { name: String },
}

pub type SchemaMap = HashMap<String, Arc<ToolSchema>>;

/// Read-mostly catalogue of discovered tool schemas.
///
/// Writers build a new map and swap it in, so a reader holding a snapshot or
/// a looked-up schema never sees a half-applied re-discovery. Registering a
/// name that already exists replaces the old schema.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    current: RwLock<Arc<SchemaMap>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `schema`, returning the schema it replaced.
    pub fn register(&self, schema: ToolSchema) -> Option<Arc<ToolSchema>> {
        let name = schema.name.clone();
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = SchemaMap::clone(&guard);
        let replaced = next.insert(name.clone(), Arc::new(schema));
        *guard = Arc::new(next);
        drop(guard);

        if replaced.is_some() {
            info!(
                event_name = "core.registry.schema_replaced",
                tool = %name,
                "tool schema re-registered; previous version replaced"
            );
        }
        replaced
    }

    /// Replaces the whole catalogue in one swap.
    pub fn replace_all<I>(&self, schemas: I) -> usize
    where
        I: IntoIterator<Item = ToolSchema>,
    {
        let next = schemas
            .into_iter()
            .map(|schema| (schema.name.clone(), Arc::new(schema)))
            .collect::<SchemaMap>();
        let count = next.len();
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);

        info!(
            event_name = "core.registry.catalogue_replaced",
            tool_count = count,
            "tool schema catalogue replaced"
        );
        count
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<ToolSchema>, RegistryError> {
        self.snapshot()
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound { name: name.to_string() })
    }

    pub fn snapshot(&self) -> Arc<SchemaMap> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.snapshot().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names = self.snapshot().keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}
