//! Entity lookup contract.
//!
//! Persistence lives outside the kernel. A handler that declares an entity
//! parameter (see [`Param::entity`](crate::Param::entity)) gets it loaded
//! through the [`EntityRepository`] registered for that kind.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// A loaded persisted entity, as a field map.
pub type Entity = Map<String, Value>;

/// Lookup operations the invoker needs from a persistence layer.
pub trait EntityRepository: Send + Sync {
    fn find_by_primary_key(&self, value: &str) -> Result<Option<Entity>>;

    fn find_by_slug(&self, value: &str) -> Result<Option<Entity>>;

    /// Name of the route/query variable carrying the primary key.
    fn primary_key(&self) -> &str {
        "id"
    }

    /// Name of the route/query variable carrying the slug.
    fn slug_key(&self) -> &str {
        "slug"
    }
}

/// Entity kind → repository, populated at boot.
#[derive(Clone, Default)]
pub struct EntityRegistry {
    repositories: HashMap<String, Arc<dyn EntityRepository>>,
}

impl EntityRegistry {
    pub fn register(&mut self, kind: impl Into<String>, repository: impl EntityRepository + 'static) {
        self.repositories.insert(kind.into(), Arc::new(repository));
    }

    pub fn get(&self, kind: &str) -> Result<&dyn EntityRepository> {
        self.repositories
            .get(kind)
            .map(|r| r.as_ref())
            .ok_or_else(|| Error::UnknownEntity(kind.to_owned()))
    }
}

impl std::fmt::Debug for EntityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.repositories.keys()).finish()
    }
}
