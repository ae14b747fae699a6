//! Static map from store constraint names to result-union variants.
//!
//! Built once from a [`ConstraintManifest`] and read-only afterwards. Every
//! validation failure is fatal: a registry that cannot be built must not be
//! served.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    classify::{self, ConflictClassification},
    constraint::{ColumnDescriptor, ConstraintDescriptor, ConstraintManifest, MANIFEST_VERSION},
    error::CoreError,
    ids::VariantIdentity,
    inflect::EntityNames,
    raw_error::RawError,
};

#[derive(Debug, Clone)]
pub struct RegisteredConstraint {
    pub descriptor: ConstraintDescriptor,
    pub identity: VariantIdentity,
}

#[derive(Debug, Clone)]
pub struct RegisteredEntity {
    pub names: EntityNames,
    /// Variant reported when an insert succeeds.
    pub identity: VariantIdentity,
    pub columns: Vec<ColumnDescriptor>,
    /// Constraint names owned by this entity, sorted.
    pub constraints: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ConstraintRegistry {
    entities: BTreeMap<String, RegisteredEntity>,
    constraints: BTreeMap<String, RegisteredConstraint>,
    fingerprint: [u8; 32],
}

impl ConstraintRegistry {
    pub fn build(manifest: &ConstraintManifest) -> Result<Self, CoreError> {
        if manifest.version != MANIFEST_VERSION {
            return Err(CoreError::UnsupportedManifestVersion {
                found: manifest.version,
                expected: MANIFEST_VERSION,
            });
        }

        let mut entities = BTreeMap::new();
        // identity -> owner (table name for success variants, constraint name otherwise)
        let mut owners: BTreeMap<VariantIdentity, String> = BTreeMap::new();

        for entity in &manifest.entities {
            if entity.name.is_empty() {
                return Err(CoreError::InvalidData("entity with empty name".into()));
            }
            let names = EntityNames::new(&entity.name, entity.type_name.as_deref());
            let identity = VariantIdentity::new(names.type_name.clone());
            claim(&mut owners, &identity, &entity.name)?;
            let registered = RegisteredEntity {
                names,
                identity,
                columns: entity.columns.clone(),
                constraints: Vec::new(),
            };
            if entities.insert(entity.name.clone(), registered).is_some() {
                return Err(CoreError::InvalidData(format!(
                    "duplicate entity: {}",
                    entity.name
                )));
            }
        }

        let mut descriptors: Vec<&ConstraintDescriptor> = manifest.constraints.iter().collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));

        let mut constraints = BTreeMap::new();
        for descriptor in descriptors {
            validate_shape(descriptor)?;
            if constraints.contains_key(&descriptor.name) {
                return Err(CoreError::DuplicateConstraint(descriptor.name.clone()));
            }
            let entity = entities.get_mut(&descriptor.entity).ok_or_else(|| {
                CoreError::UnknownEntity {
                    constraint: descriptor.name.clone(),
                    entity: descriptor.entity.clone(),
                }
            })?;
            for column in &descriptor.columns {
                let declared = entity
                    .columns
                    .iter()
                    .find(|c| &c.name == column)
                    .ok_or_else(|| CoreError::UnknownColumn {
                        constraint: descriptor.name.clone(),
                        entity: descriptor.entity.clone(),
                        column: column.clone(),
                    })?;
                if declared.generated {
                    return Err(CoreError::GeneratedColumn {
                        constraint: descriptor.name.clone(),
                        entity: descriptor.entity.clone(),
                        column: column.clone(),
                    });
                }
            }

            let identity = VariantIdentity::new(match &descriptor.identity {
                Some(explicit) => explicit.clone(),
                None => entity.names.conflict_type(&descriptor.columns),
            });
            claim(&mut owners, &identity, &descriptor.name)?;
            entity.constraints.push(descriptor.name.clone());
            constraints.insert(
                descriptor.name.clone(),
                RegisteredConstraint {
                    descriptor: descriptor.clone(),
                    identity,
                },
            );
        }

        let fingerprint = fingerprint(&entities, &constraints);
        Ok(Self {
            entities,
            constraints,
            fingerprint,
        })
    }

    pub fn lookup(&self, constraint_name: &str) -> Option<&RegisteredConstraint> {
        self.constraints.get(constraint_name)
    }

    pub fn entity(&self, name: &str) -> Option<&RegisteredEntity> {
        self.entities.get(name)
    }

    pub fn entities(&self) -> impl Iterator<Item = &RegisteredEntity> {
        self.entities.values()
    }

    /// Members of the entity's create-result union: the success variant first,
    /// then one conflict variant per constraint in name order.
    pub fn variants(&self, entity: &str) -> Vec<&VariantIdentity> {
        let Some(registered) = self.entities.get(entity) else {
            return Vec::new();
        };
        std::iter::once(&registered.identity)
            .chain(
                registered
                    .constraints
                    .iter()
                    .filter_map(|name| self.constraints.get(name))
                    .map(|c| &c.identity),
            )
            .collect()
    }

    pub fn classify(&self, raw: &RawError) -> ConflictClassification {
        classify::classify(raw, self)
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// BLAKE3 digest of the canonical registry contents. Equal manifests give
    /// equal fingerprints regardless of constraint declaration order.
    pub fn fingerprint(&self) -> &[u8; 32] {
        &self.fingerprint
    }

    pub fn fingerprint_hex(&self) -> String {
        self.fingerprint.iter().map(|b| format!("{b:02x}")).collect()
    }
}

fn validate_shape(descriptor: &ConstraintDescriptor) -> Result<(), CoreError> {
    if descriptor.name.is_empty() {
        return Err(CoreError::InvalidData(format!(
            "constraint on {} has an empty name",
            descriptor.entity
        )));
    }
    if descriptor.columns.is_empty() {
        return Err(CoreError::InvalidData(format!(
            "constraint {} has no columns",
            descriptor.name
        )));
    }
    let mut seen = BTreeSet::new();
    for column in &descriptor.columns {
        if !seen.insert(column.as_str()) {
            return Err(CoreError::InvalidData(format!(
                "constraint {} lists column {column} twice",
                descriptor.name
            )));
        }
    }
    Ok(())
}

fn claim(
    owners: &mut BTreeMap<VariantIdentity, String>,
    identity: &VariantIdentity,
    owner: &str,
) -> Result<(), CoreError> {
    if let Some(first) = owners.get(identity) {
        return Err(CoreError::IdentityCollision {
            identity: identity.to_string(),
            first: first.clone(),
            second: owner.to_string(),
        });
    }
    owners.insert(identity.clone(), owner.to_string());
    Ok(())
}

fn fingerprint(
    entities: &BTreeMap<String, RegisteredEntity>,
    constraints: &BTreeMap<String, RegisteredConstraint>,
) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for (name, entity) in entities {
        hasher.update(b"entity\0");
        hasher.update(name.as_bytes());
        hasher.update(b"\0");
        hasher.update(entity.identity.as_str().as_bytes());
        for column in &entity.columns {
            hasher.update(b"\0");
            hasher.update(column.name.as_bytes());
            hasher.update(if column.generated { b"+g" } else { b"-g" });
        }
        hasher.update(b"\n");
    }
    for (name, constraint) in constraints {
        hasher.update(b"constraint\0");
        hasher.update(name.as_bytes());
        hasher.update(b"\0");
        hasher.update(constraint.descriptor.entity.as_bytes());
        hasher.update(b"\0");
        hasher.update(constraint.descriptor.kind.as_str().as_bytes());
        for column in &constraint.descriptor.columns {
            hasher.update(b"\0");
            hasher.update(column.as_bytes());
        }
        hasher.update(b"\0");
        hasher.update(constraint.identity.as_str().as_bytes());
        hasher.update(b"\n");
    }
    *hasher.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{ConstraintKind, EntityDescriptor};

    fn library() -> ConstraintManifest {
        ConstraintManifest::new(
            vec![
                EntityDescriptor::new(
                    "books",
                    vec![
                        ColumnDescriptor::new("isbn"),
                        ColumnDescriptor::new("title"),
                        ColumnDescriptor::generated("created_at"),
                    ],
                ),
                EntityDescriptor::new(
                    "users",
                    vec![
                        ColumnDescriptor::generated("id"),
                        ColumnDescriptor::new("username"),
                        ColumnDescriptor::new("email"),
                    ],
                ),
            ],
            vec![
                ConstraintDescriptor::new("books_pkey", "books", &["isbn"], ConstraintKind::PrimaryKey),
                ConstraintDescriptor::new(
                    "unique_user_username",
                    "users",
                    &["username"],
                    ConstraintKind::Unique,
                ),
                ConstraintDescriptor::new(
                    "unique_user_email",
                    "users",
                    &["email"],
                    ConstraintKind::Unique,
                ),
            ],
        )
    }

    #[test]
    fn derives_identities_from_table_and_columns() {
        let registry = ConstraintRegistry::build(&library()).unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.lookup("books_pkey").unwrap().identity, "BookIsbnConflict");
        assert_eq!(
            registry.lookup("unique_user_username").unwrap().identity,
            "UserUsernameConflict"
        );
        assert_eq!(
            registry.lookup("unique_user_email").unwrap().identity,
            "UserEmailConflict"
        );
        assert_eq!(registry.entity("users").unwrap().identity, "User");
        assert!(registry.lookup("users_pkey").is_none());
    }

    #[test]
    fn variants_list_success_first() {
        let registry = ConstraintRegistry::build(&library()).unwrap();
        let variants: Vec<&str> = registry.variants("users").iter().map(|v| v.as_str()).collect();
        assert_eq!(variants, vec!["User", "UserEmailConflict", "UserUsernameConflict"]);
        assert!(registry.variants("nope").is_empty());
    }

    #[test]
    fn build_is_deterministic_under_reordering() {
        let first = ConstraintRegistry::build(&library()).unwrap();
        let mut shuffled = library();
        shuffled.constraints.reverse();
        let second = ConstraintRegistry::build(&shuffled).unwrap();
        assert_eq!(first.fingerprint(), second.fingerprint());
        for name in ["books_pkey", "unique_user_username", "unique_user_email"] {
            assert_eq!(
                first.lookup(name).unwrap().identity,
                second.lookup(name).unwrap().identity
            );
        }
    }

    #[test]
    fn fingerprint_tracks_content() {
        let first = ConstraintRegistry::build(&library()).unwrap();
        let mut changed = library();
        changed.constraints[0].identity = Some("DuplicateIsbn".into());
        let second = ConstraintRegistry::build(&changed).unwrap();
        assert_ne!(first.fingerprint(), second.fingerprint());
        assert_eq!(first.fingerprint_hex().len(), 64);
    }

    #[test]
    fn explicit_identity_overrides_derived_name() {
        let mut manifest = library();
        manifest.constraints[2] = manifest.constraints[2].clone().with_identity("EmailAddressConflict");
        let registry = ConstraintRegistry::build(&manifest).unwrap();
        assert_eq!(
            registry.lookup("unique_user_email").unwrap().identity,
            "EmailAddressConflict"
        );
    }

    #[test]
    fn rejects_generated_columns() {
        let mut manifest = library();
        manifest.constraints.push(ConstraintDescriptor::new(
            "users_pkey",
            "users",
            &["id"],
            ConstraintKind::PrimaryKey,
        ));
        match ConstraintRegistry::build(&manifest).unwrap_err() {
            CoreError::GeneratedColumn { constraint, column, .. } => {
                assert_eq!(constraint, "users_pkey");
                assert_eq!(column, "id");
            }
            other => panic!("expected GeneratedColumn, got {other:?}"),
        }
    }

    #[test]
    fn rejects_duplicate_constraint_names() {
        let mut manifest = library();
        manifest.constraints.push(manifest.constraints[0].clone());
        assert!(matches!(
            ConstraintRegistry::build(&manifest).unwrap_err(),
            CoreError::DuplicateConstraint(name) if name == "books_pkey"
        ));
    }

    #[test]
    fn rejects_unknown_entities_and_columns() {
        let mut manifest = library();
        manifest.constraints.push(ConstraintDescriptor::new(
            "authors_pkey",
            "authors",
            &["id"],
            ConstraintKind::PrimaryKey,
        ));
        assert!(matches!(
            ConstraintRegistry::build(&manifest).unwrap_err(),
            CoreError::UnknownEntity { .. }
        ));

        let mut manifest = library();
        manifest.constraints.push(ConstraintDescriptor::new(
            "unique_book_slug",
            "books",
            &["slug"],
            ConstraintKind::Unique,
        ));
        assert!(matches!(
            ConstraintRegistry::build(&manifest).unwrap_err(),
            CoreError::UnknownColumn { column, .. } if column == "slug"
        ));
    }

    #[test]
    fn rejects_malformed_descriptors() {
        let mut manifest = library();
        manifest.constraints[0].columns.clear();
        assert!(matches!(
            ConstraintRegistry::build(&manifest).unwrap_err(),
            CoreError::InvalidData(_)
        ));

        let mut manifest = library();
        manifest.constraints[0].columns = vec!["isbn".into(), "isbn".into()];
        assert!(matches!(
            ConstraintRegistry::build(&manifest).unwrap_err(),
            CoreError::InvalidData(_)
        ));

        let mut manifest = library();
        manifest.version = 2;
        assert!(matches!(
            ConstraintRegistry::build(&manifest).unwrap_err(),
            CoreError::UnsupportedManifestVersion { found: 2, .. }
        ));
    }

    #[test]
    fn rejects_identity_collisions() {
        let mut manifest = library();
        manifest.constraints.push(ConstraintDescriptor::new(
            "users_username_key",
            "users",
            &["username"],
            ConstraintKind::Unique,
        ));
        match ConstraintRegistry::build(&manifest).unwrap_err() {
            CoreError::IdentityCollision { identity, first, second } => {
                assert_eq!(identity, "UserUsernameConflict");
                assert_eq!(first, "unique_user_username");
                assert_eq!(second, "users_username_key");
            }
            other => panic!("expected IdentityCollision, got {other:?}"),
        }

        let mut manifest = library();
        manifest.constraints[0].identity = Some("User".into());
        assert!(matches!(
            ConstraintRegistry::build(&manifest).unwrap_err(),
            CoreError::IdentityCollision { .. }
        ));
    }
}
