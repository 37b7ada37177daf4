// 🔍 Person Extractor - one document per (identity, role, source record)
//
// Identity resolution is exact-match only: normalized national id, NIDA
// number, or passport number. The same person shows up once per role per
// filing; the index keeps all of those rows on purpose.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

use crate::entities::{CleanedEntity, Role};
use crate::sources::SourceKind;

// ============================================================================
// PERSON ROLE DOCUMENT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonRoleDocument {
    pub id: String,
    pub person_identifier: String,
    pub full_name: Option<String>,
    pub role: String,
    pub registration_id: String,
    pub source_record_id: String,
    pub registration_type: String,
    pub approval_status: Option<String>,
    pub details: Value,
}

/// Document id for an (identity, role, record) triple. Record ids are only
/// unique within their source, so the record part carries the source index.
pub fn document_id(identity: &str, role: Role, source: SourceKind, source_record_id: &str) -> String {
    format!(
        "{}_{}_{}_{}",
        identity,
        role.as_str(),
        source.index_name(),
        source_record_id
    )
}

/// All role documents of one entity, skipping people without an identity.
///
/// The entity itself is indexed regardless; only its people are dropped here.
pub fn extract_people(entity: &CleanedEntity) -> Vec<PersonRoleDocument> {
    let mut documents = Vec::new();

    for (role, people) in entity.roles() {
        for person in people {
            let identity = match person.identity_key() {
                Some(identity) => identity,
                None => {
                    debug!(
                        record = entity.id(),
                        role = role.as_str(),
                        "person without identifier, not indexed"
                    );
                    continue;
                }
            };

            documents.push(PersonRoleDocument {
                id: document_id(&identity, role, entity.kind(), entity.id()),
                person_identifier: identity,
                full_name: person.full_name(),
                role: role.as_str().to_string(),
                registration_id: entity.registration_id().to_string(),
                source_record_id: entity.id().to_string(),
                registration_type: entity.kind().name().to_string(),
                approval_status: entity.approval_status().map(str::to_string),
                details: serde_json::to_value(person).unwrap_or(Value::Null),
            });
        }
    }

    documents
}

// ============================================================================
// DEDUPLICATOR
// ============================================================================

/// Run-scoped set of emitted document ids.
///
/// Owned by one load pass and dropped with it; nothing here is global.
#[derive(Debug, Default)]
pub struct PersonDeduplicator {
    seen: HashSet<String>,
    pub emitted: usize,
    pub duplicates: usize,
}

impl PersonDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract an entity's people, dropping triples already emitted this pass.
    pub fn extract(&mut self, entity: &CleanedEntity) -> Vec<PersonRoleDocument> {
        extract_people(entity)
            .into_iter()
            .filter(|doc| {
                if self.seen.insert(doc.id.clone()) {
                    self.emitted += 1;
                    true
                } else {
                    self.duplicates += 1;
                    false
                }
            })
            .collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================
