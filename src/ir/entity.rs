// src/ir/entity.rs

use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// A globally unique identifier for a program entity.
///
/// Implemented as a UUID so entity identity survives module merging and
/// renaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Creates a new, globally unique `EntityId`.
    #[must_use]
    pub fn new() -> Self {
        EntityId(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

/// A named program entity: a global variable or a function symbol.
///
/// Entities are the targets of symbolic-address constants; their layout
/// (size and alignment) is a compile-time constant that address-kind
/// queries can fold to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub id: EntityId,
    pub name: Arc<str>,
    pub size: u32,
    pub align: u32,
}

impl Entity {
    #[must_use]
    pub fn new(name: &str, size: u32, align: u32) -> Self {
        Self { id: EntityId::new(), name: name.into(), size, align }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)
    }
}

/// The per-module entity registry.
#[derive(Debug, Clone, Default)]
pub struct EntityTable {
    entities: Vec<Entity>,
}

/// Index of an entity inside its module's `EntityTable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityRef(pub u32);

impl EntityTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entity: Entity) -> EntityRef {
        let idx = u32::try_from(self.entities.len()).expect("entity table overflow");
        self.entities.push(entity);
        EntityRef(idx)
    }

    #[must_use]
    pub fn get(&self, er: EntityRef) -> &Entity {
        &self.entities[er.0 as usize]
    }

    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<EntityRef> {
        self.entities.iter().position(|e| e.name.as_ref() == name).map(|i| EntityRef(i as u32))
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityRef, &Entity)> {
        self.entities.iter().enumerate().map(|(i, e)| (EntityRef(i as u32), e))
    }
}
