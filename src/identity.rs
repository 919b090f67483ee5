//! Node identity assignment.
//!
//! `assign_uuid` writes the identifier into the record it is given. Graph
//! builders receive their metadata lists by value, so records owned by a caller
//! are never touched by a build.
use crate::error::GraphError;
use crate::store::{AttrValue, NodeMetadata, NodeType, NodeUuid};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Gives `record` a UUID and returns it.
///
/// With `assign_new_uuid` a fresh v4 UUID is generated. Otherwise the value of
/// `field` is carried through; a missing or empty field is an error.
pub fn assign_uuid(record: &mut NodeMetadata, assign_new_uuid: bool, field: &str) -> Result<NodeUuid, GraphError> {
    let uuid = if assign_new_uuid {
        NodeUuid::generate()
    } else {
        let key = record.key_of(field).ok_or_else(|| GraphError::MissingIdentifier {
            node_type: record.node_type.unwrap_or(NodeType::Production),
            index: record.index.unwrap_or_default(),
            field: field.to_string(),
        })?;
        NodeUuid::from(key)
    };
    record.uuid = Some(uuid.clone());
    Ok(uuid)
}

/// Tags every record of one node type: uuid, index, type and system.
pub(crate) fn tag_records(
    records: &mut [NodeMetadata],
    node_type: NodeType,
    system: &str,
    assign_new_uuids: bool,
    field: &str,
) -> Result<(), GraphError> {
    for (index, record) in records.iter_mut().enumerate() {
        record.require_name_unit(node_type, index)?;
        record.node_type = Some(node_type);
        record.index = Some(index);
        record.system = Some(system.to_string());
        assign_uuid(record, assign_new_uuids, field)?;
    }
    Ok(())
}

type ContentKey = (Option<String>, Option<String>, Option<u64>, Option<String>, Vec<(String, AttrValue)>);

fn content_key(record: &NodeMetadata) -> ContentKey {
    (
        record.name.clone(),
        record.unit.clone(),
        record.production.map(f64::to_bits),
        record.system.clone(),
        record.extra.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
    )
}

/// Assigns fresh UUIDs so that records with identical content share one.
///
/// `uuid`, `type` and `index` do not count as content.
pub fn assign_shared_uuids(records: &mut [NodeMetadata]) {
    let mut cache: HashMap<ContentKey, NodeUuid> = HashMap::new();
    for record in records.iter_mut() {
        let uuid = match cache.entry(content_key(record)) {
            Entry::Occupied(e) => e.get().clone(),
            Entry::Vacant(e) => e.insert(NodeUuid::generate()).clone(),
        };
        record.uuid = Some(uuid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_new_uuid_mutates_record() {
        let mut r = NodeMetadata::new("Steel", "kg");
        let u = assign_uuid(&mut r, true, "uuid").unwrap();
        assert_eq!(r.uuid.as_ref(), Some(&u));
        assert!(uuid::Uuid::parse_str(u.as_str()).is_ok());
    }

    #[test]
    fn test_fresh_uuids_are_distinct() {
        let mut a = NodeMetadata::new("Steel", "kg");
        let mut b = a.clone();
        assert_ne!(assign_uuid(&mut a, true, "uuid").unwrap(), assign_uuid(&mut b, true, "uuid").unwrap());
    }

    #[test]
    fn test_carry_through_identifier() {
        let mut r = NodeMetadata::new("Steel", "kg").with("code", "123abc");
        let u = assign_uuid(&mut r, false, "code").unwrap();
        assert_eq!(u.as_str(), "123abc");
        assert_eq!(r.uuid.as_ref().map(|u| u.as_str()), Some("123abc"));
    }

    #[test]
    fn test_missing_identifier() {
        let mut r = NodeMetadata::new("Steel", "kg");
        let err = assign_uuid(&mut r, false, "code").unwrap_err();
        assert!(matches!(err, GraphError::MissingIdentifier { ref field, .. } if field == "code"));
        assert!(r.uuid.is_none());
    }

    #[test]
    fn test_shared_uuids() {
        let mut records = vec![
            NodeMetadata::new("A", "kg"),
            NodeMetadata::new("B", "kg"),
            NodeMetadata::new("A", "kg"),
        ];
        assign_shared_uuids(&mut records);
        assert_eq!(records[0].uuid, records[2].uuid);
        assert_ne!(records[0].uuid, records[1].uuid);
    }
}
