//! Entities, index descriptors, and the versioned schema they belong to
//! (spec §3/§4.4).

use std::collections::{BTreeMap, BTreeSet};

use keyspace_keyexpr::KeyExpr;

use crate::error::ValidationError;
use crate::index_kind::IndexKind;

/// Semantic version, totally ordered lexicographically on (major, minor,
/// patch) (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct SchemaVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl SchemaVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self { Self { major, minor, patch } }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}.{}.{}", self.major, self.minor, self.patch) }
}

/// Per-field enum metadata: a type name plus its case names, used to fold
/// enum fields to their case-name string on extraction (spec §4.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumMeta {
    pub type_name: String,
    pub cases: Vec<String>,
}

/// Common per-index options: uniqueness, sparseness, and a user metadata
/// map kept as a `BTreeMap` for deterministic iteration (SPEC_FULL §4).
#[derive(Debug, Clone, Default)]
pub struct CommonOptions {
    pub unique: bool,
    pub sparse: bool,
    pub metadata: BTreeMap<String, String>,
}

/// Metadata for a single secondary index (spec §3).
#[derive(Debug, Clone)]
pub struct IndexDescriptor {
    pub name: String,
    pub key_paths: Vec<String>,
    pub kind: IndexKind,
    pub common_options: CommonOptions,
    /// `None` means "applies to its declaring entity only" (spec §3).
    pub applies_to: Option<BTreeSet<String>>,
}

impl IndexDescriptor {
    pub fn new(name: impl Into<String>, key_paths: Vec<String>, kind: IndexKind) -> Self {
        Self { name: name.into(), key_paths, kind, common_options: CommonOptions::default(), applies_to: None }
    }

    pub fn unique(mut self) -> Self {
        self.common_options.unique = true;
        self
    }

    pub fn sparse(mut self) -> Self {
        self.common_options.sparse = true;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.common_options.metadata.insert(key.into(), value.into());
        self
    }

    pub fn applies_to(mut self, entity_names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.applies_to = Some(entity_names.into_iter().map(Into::into).collect());
        self
    }

    fn applies_to_entity(&self, declaring_entity: &str, entity_name: &str) -> bool {
        match &self.applies_to {
            Some(set) => set.contains(entity_name),
            None => entity_name == declaring_entity,
        }
    }

    pub fn key_expr(&self) -> KeyExpr { KeyExpr::from_paths(&self.key_paths) }
}

/// A named persistable type (spec §3).
#[derive(Debug, Clone)]
pub struct Entity {
    pub name: String,
    pub fields: Vec<String>,
    pub enums: BTreeMap<String, EnumMeta>,
    pub indexes: Vec<IndexDescriptor>,
    pub id_expr: KeyExpr,
}

impl Entity {
    /// Declares an entity with the conventional single `"id"` field as its
    /// identity; override with [`Entity::with_id_expr`] for composite keys.
    pub fn new(name: impl Into<String>, fields: Vec<String>) -> Self {
        Self { name: name.into(), fields, enums: BTreeMap::new(), indexes: Vec::new(), id_expr: KeyExpr::from_dotted("id") }
    }

    pub fn with_id_expr(mut self, id_expr: KeyExpr) -> Self {
        self.id_expr = id_expr;
        self
    }

    pub fn with_index(mut self, index: IndexDescriptor) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn with_enum(mut self, field: impl Into<String>, meta: EnumMeta) -> Self {
        self.enums.insert(field.into(), meta);
        self
    }

    /// The field's stable positional ordinal (spec §3: "stable ordinal used
    /// by the serializer").
    pub fn field_ordinal(&self, name: &str) -> Option<usize> { self.fields.iter().position(|f| f == name) }
}

/// Append-only record of an index's removal (spec §3: "former indexes").
#[derive(Debug, Clone)]
pub struct FormerIndex {
    pub name: String,
    pub removed_in: SchemaVersion,
    pub key_paths: Vec<String>,
}

/// The schema: entities, every `IndexDescriptor`, and removal history.
/// Construction fails if two descriptors share a name (spec §4.4).
#[derive(Debug, Clone)]
pub struct Schema {
    pub version: SchemaVersion,
    entities: BTreeMap<String, Entity>,
    indexes: BTreeMap<String, IndexDescriptor>,
    index_owner: BTreeMap<String, String>,
    former_indexes: Vec<FormerIndex>,
}

impl Schema {
    /// Enumerates descriptors from every entity, merges with `extra_indexes`,
    /// and raises `DuplicateIndexName` (reporting both offending key-path
    /// lists) if any name repeats (spec §4.4).
    pub fn build(version: SchemaVersion, entities: Vec<Entity>, extra_indexes: Vec<IndexDescriptor>) -> Result<Self, ValidationError> {
        let mut indexes: BTreeMap<String, IndexDescriptor> = BTreeMap::new();
        let mut index_owner: BTreeMap<String, String> = BTreeMap::new();
        let mut entity_map: BTreeMap<String, Entity> = BTreeMap::new();

        for entity in entities {
            for descriptor in &entity.indexes {
                if let Some(existing) = indexes.get(&descriptor.name) {
                    return Err(ValidationError::DuplicateIndexName {
                        name: descriptor.name.clone(),
                        key_paths_a: existing.key_paths.clone(),
                        key_paths_b: descriptor.key_paths.clone(),
                    });
                }
                indexes.insert(descriptor.name.clone(), descriptor.clone());
                index_owner.insert(descriptor.name.clone(), entity.name.clone());
            }
            entity_map.insert(entity.name.clone(), entity);
        }

        for descriptor in extra_indexes {
            if let Some(existing) = indexes.get(&descriptor.name) {
                return Err(ValidationError::DuplicateIndexName {
                    name: descriptor.name.clone(),
                    key_paths_a: existing.key_paths.clone(),
                    key_paths_b: descriptor.key_paths.clone(),
                });
            }
            indexes.insert(descriptor.name.clone(), descriptor);
        }

        Ok(Self { version, entities: entity_map, indexes, index_owner, former_indexes: Vec::new() })
    }

    pub fn entity_by_name(&self, name: &str) -> Option<&Entity> { self.entities.get(name) }

    pub fn index_descriptor(&self, name: &str) -> Option<&IndexDescriptor> { self.indexes.get(name) }

    /// Every descriptor applicable to `entity_name` (spec §4.4:
    /// `indexDescriptorsFor`).
    pub fn index_descriptors_for(&self, entity_name: &str) -> Vec<&IndexDescriptor> {
        self.indexes
            .values()
            .filter(|descriptor| {
                let declaring = self.index_owner.get(&descriptor.name).map(String::as_str).unwrap_or(entity_name);
                descriptor.applies_to_entity(declaring, entity_name)
            })
            .collect()
    }

    pub fn former_indexes(&self) -> &[FormerIndex] { &self.former_indexes }

    /// Removes an index descriptor, appending a `FormerIndex` record (spec
    /// §3: "former-index records are append-only").
    pub fn remove_index(&mut self, name: &str) -> Option<IndexDescriptor> {
        let removed = self.indexes.remove(name)?;
        self.index_owner.remove(name);
        self.former_indexes.push(FormerIndex { name: removed.name.clone(), removed_in: self.version, key_paths: removed.key_paths.clone() });
        Some(removed)
    }

    /// True iff no field present in `from` was removed in `self` (spec
    /// §4.4). Index additions/removals and field additions are always
    /// lightweight. An entity removed outright counts as every one of its
    /// fields being removed (decision recorded in DESIGN.md).
    pub fn can_lightweight_migrate(&self, from: &Schema) -> bool {
        for (name, old_entity) in from.entities.iter() {
            match self.entities.get(name) {
                Some(new_entity) => {
                    if old_entity.fields.iter().any(|field| !new_entity.fields.contains(field)) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        true
    }
}

impl PartialEq for Schema {
    /// Equality is by version plus sorted entity-name set (spec §4.4).
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version && self.entities.keys().collect::<Vec<_>>() == other.entities.keys().collect::<Vec<_>>()
    }
}

impl Eq for Schema {}

impl std::hash::Hash for Schema {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.version.hash(state);
        for name in self.entities.keys() {
            name.hash(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index_kind::IndexKind;

    fn user_entity() -> Entity {
        Entity::new("User", vec!["id".into(), "email".into()])
            .with_index(IndexDescriptor::new("User_email", vec!["email".into()], IndexKind::Scalar).unique())
    }

    #[test]
    fn builds_with_unique_index_names() {
        let schema = Schema::build(SchemaVersion::new(1, 0, 0), vec![user_entity()], vec![]).unwrap();
        assert!(schema.index_descriptor("User_email").is_some());
    }

    #[test]
    fn duplicate_index_name_fails_with_both_key_path_lists() {
        let duplicate = IndexDescriptor::new("User_email", vec!["other_field".into()], IndexKind::Scalar);
        let err = Schema::build(SchemaVersion::new(1, 0, 0), vec![user_entity()], vec![duplicate]).unwrap_err();
        match err {
            ValidationError::DuplicateIndexName { key_paths_a, key_paths_b, .. } => {
                assert_eq!(key_paths_a, vec!["email".to_string()]);
                assert_eq!(key_paths_b, vec!["other_field".to_string()]);
            }
            other => panic!("expected DuplicateIndexName, got {other:?}"),
        }
    }

    #[test]
    fn index_descriptors_for_defaults_to_declaring_entity() {
        let schema = Schema::build(SchemaVersion::new(1, 0, 0), vec![user_entity()], vec![]).unwrap();
        assert_eq!(schema.index_descriptors_for("User").len(), 1);
        assert_eq!(schema.index_descriptors_for("Product").len(), 0);
    }

    #[test]
    fn lightweight_migration_allows_field_additions() {
        let v1 = Schema::build(SchemaVersion::new(1, 0, 0), vec![Entity::new("User", vec!["id".into()])], vec![]).unwrap();
        let v2 = Schema::build(SchemaVersion::new(1, 1, 0), vec![Entity::new("User", vec!["id".into(), "email".into()])], vec![]).unwrap();
        assert!(v2.can_lightweight_migrate(&v1));
    }

    #[test]
    fn lightweight_migration_rejects_field_removal() {
        let v1 = Schema::build(SchemaVersion::new(1, 0, 0), vec![Entity::new("User", vec!["id".into(), "email".into()])], vec![]).unwrap();
        let v2 = Schema::build(SchemaVersion::new(2, 0, 0), vec![Entity::new("User", vec!["id".into()])], vec![]).unwrap();
        assert!(!v2.can_lightweight_migrate(&v1));
    }

    #[test]
    fn version_ordering_is_lexicographic() {
        assert!(SchemaVersion::new(1, 9, 0) < SchemaVersion::new(2, 0, 0));
        assert!(SchemaVersion::new(1, 0, 9) < SchemaVersion::new(1, 1, 0));
    }
}
