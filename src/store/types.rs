use crate::error::GraphError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Dense handle of a node inside one `EcoGraph` arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline(always)]
    pub fn index(&self) -> usize { self.0 as usize }
    pub fn new(idx: usize) -> Self { Self(idx as u32) }
}

/// Globally unique node identifier.
///
/// Either a generated v4 UUID rendered as a string, or a key carried through
/// from the source dataset (an ecoinvent code, a sector name, ...).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeUuid(String);

impl NodeUuid {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl From<&str> for NodeUuid {
    fn from(s: &str) -> Self { Self(s.to_string()) }
}

impl From<String> for NodeUuid {
    fn from(s: String) -> Self { Self(s) }
}

impl fmt::Display for NodeUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl fmt::Debug for NodeUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:?}", self.0) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// A technosphere activity or input-output sector.
    Production,
    /// An environmental flow (biosphere / satellite account).
    Extension,
    /// An impact category or indicator.
    Characterization,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Production => "production",
            NodeType::Extension => "extension",
            NodeType::Characterization => "characterization",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// How the diagonal of the production matrix is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Convention {
    /// Technical coefficients; every activity produces exactly one unit.
    #[default]
    IMinusA,
    /// Raw flow table; the diagonal holds each activity's reference output.
    A,
}

impl FromStr for Convention {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "I-A" => Ok(Convention::IMinusA),
            "A" => Ok(Convention::A),
            other => Err(GraphError::InvalidConvention(other.to_string())),
        }
    }
}

impl TryFrom<String> for Convention {
    type Error = GraphError;
    fn try_from(s: String) -> Result<Self, Self::Error> { s.parse() }
}

impl From<Convention> for String {
    fn from(c: Convention) -> Self {
        match c {
            Convention::IMinusA => "I-A".to_string(),
            Convention::A => "A".to_string(),
        }
    }
}

/// A passthrough attribute.
///
/// Ordering is total: `Null < Bool < numbers < Text < List < Map`. Numbers
/// compare exactly, so distinct `Int`s never collide and an `Int` equals a
/// `Float` only when the float holds that same integer. Lists and maps compare
/// element-wise, and hashing agrees with equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<AttrValue>),
    Map(BTreeMap<String, AttrValue>),
}

impl AttrValue {
    fn rank(&self) -> u8 {
        match self {
            AttrValue::Null => 0,
            AttrValue::Bool(_) => 1,
            AttrValue::Int(_) | AttrValue::Float(_) => 2,
            AttrValue::Text(_) => 3,
            AttrValue::List(_) => 4,
            AttrValue::Map(_) => 5,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(i) => Some(*i as f64),
            AttrValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Renders text and integer values as an identifier; anything else has none.
    pub fn as_key(&self) -> Option<String> {
        match self {
            AttrValue::Text(s) if !s.is_empty() => Some(s.clone()),
            AttrValue::Int(i) => Some(i.to_string()),
            _ => None,
        }
    }
}

fn cmp_int_float(i: i64, f: f64) -> Ordering {
    match (i as f64).total_cmp(&f) {
        // `f` is then an integer within i64 range (or 2^63 exactly), so the
        // i128 cast is lossless.
        Ordering::Equal => (i as i128).cmp(&(f as i128)),
        other => other,
    }
}

impl Ord for AttrValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (AttrValue::Bool(a), AttrValue::Bool(b)) => a.cmp(b),
            (AttrValue::Int(a), AttrValue::Int(b)) => a.cmp(b),
            (AttrValue::Float(a), AttrValue::Float(b)) => a.total_cmp(b),
            (AttrValue::Int(a), AttrValue::Float(b)) => cmp_int_float(*a, *b),
            (AttrValue::Float(a), AttrValue::Int(b)) => cmp_int_float(*b, *a).reverse(),
            (AttrValue::Text(a), AttrValue::Text(b)) => a.cmp(b),
            (AttrValue::List(a), AttrValue::List(b)) => a.cmp(b),
            (AttrValue::Map(a), AttrValue::Map(b)) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

impl PartialOrd for AttrValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl PartialEq for AttrValue {
    fn eq(&self, other: &Self) -> bool { self.cmp(other) == Ordering::Equal }
}

impl Eq for AttrValue {}

impl Hash for AttrValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            AttrValue::Null => {}
            AttrValue::Bool(b) => b.hash(state),
            AttrValue::Int(_) | AttrValue::Float(_) => {
                self.as_f64().unwrap_or_default().to_bits().hash(state)
            }
            AttrValue::Text(s) => s.hash(state),
            AttrValue::List(items) => items.hash(state),
            AttrValue::Map(entries) => entries.hash(state),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self { AttrValue::Text(s.to_string()) }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self { AttrValue::Text(s) }
}

impl From<f64> for AttrValue {
    fn from(f: f64) -> Self { AttrValue::Float(f) }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self { AttrValue::Int(i) }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self { AttrValue::Bool(b) }
}

/// A node-metadata record as handed over by a parser.
///
/// Only `name` and `unit` are required; builders fill in `uuid`, `node_type`,
/// `index`, `system` and `production`. Unknown keys land in `extra` and are
/// passed through to the graph untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<NodeUuid>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, AttrValue>,
}

impl NodeMetadata {
    pub fn new(name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self { name: Some(name.into()), unit: Some(unit.into()), ..Default::default() }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn with_production(mut self, production: f64) -> Self {
        self.production = Some(production);
        self
    }

    /// Builds a record from a dictionary-shaped JSON object.
    pub fn from_json(value: serde_json::Value) -> Result<Self, GraphError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Reads `field` as an identifier string, if present and non-empty.
    pub fn key_of(&self, field: &str) -> Option<String> {
        let non_empty = |s: &Option<String>| s.as_ref().filter(|s| !s.is_empty()).cloned();
        match field {
            "uuid" => self.uuid.as_ref().map(|u| u.to_string()).filter(|s| !s.is_empty()),
            "name" => non_empty(&self.name),
            "unit" => non_empty(&self.unit),
            "system" => non_empty(&self.system),
            other => self.extra.get(other).and_then(AttrValue::as_key),
        }
    }

    /// Checks the two required fields.
    pub(crate) fn require_name_unit(&self, node_type: NodeType, index: usize) -> Result<(), GraphError> {
        if self.name.as_deref().map_or(true, str::is_empty) {
            return Err(GraphError::MissingAttribute { node_type, index, field: "name" });
        }
        if self.unit.as_deref().map_or(true, str::is_empty) {
            return Err(GraphError::MissingAttribute { node_type, index, field: "unit" });
        }
        Ok(())
    }

    /// Freezes a fully tagged record into a graph node.
    ///
    /// Callers must have assigned `uuid` and checked `name`/`unit` first.
    pub(crate) fn into_record(self, node_type: NodeType, index: usize, system: &str) -> NodeRecord {
        NodeRecord {
            uuid: self.uuid.unwrap_or_else(NodeUuid::generate),
            node_type,
            name: self.name.unwrap_or_default(),
            unit: self.unit.unwrap_or_default(),
            system: self.system.unwrap_or_else(|| system.to_string()),
            production: self.production.unwrap_or(1.0),
            index,
            extra: self.extra,
        }
    }
}

/// A node as stored in the graph. Required fields are no longer optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub uuid: NodeUuid,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub name: String,
    pub unit: String,
    pub system: String,
    pub production: f64,
    pub index: usize,
    #[serde(default)]
    pub extra: BTreeMap<String, AttrValue>,
}

impl NodeRecord {
    /// Reads any attribute by name; absent keys read as `Null`.
    pub fn attr(&self, key: &str) -> AttrValue {
        match key {
            "uuid" => AttrValue::Text(self.uuid.to_string()),
            "type" => AttrValue::Text(self.node_type.as_str().to_string()),
            "name" => AttrValue::Text(self.name.clone()),
            "unit" => AttrValue::Text(self.unit.clone()),
            "system" => AttrValue::Text(self.system.clone()),
            "production" => AttrValue::Float(self.production),
            "index" => AttrValue::Int(self.index as i64),
            other => self.extra.get(other).cloned().unwrap_or(AttrValue::Null),
        }
    }
}

/// A directed flow between two nodes of the same arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    /// Non-negative flow magnitude.
    pub flow: f64,
    /// Direction semantics reported by the source, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positive: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashSet;

    #[rstest]
    #[case("I-A", Convention::IMinusA)]
    #[case("A", Convention::A)]
    fn test_convention_parse(#[case] input: &str, #[case] expected: Convention) {
        assert_eq!(input.parse::<Convention>().unwrap(), expected);
    }

    #[test]
    fn test_convention_rejects_unknown() {
        let err = "I+A".parse::<Convention>().unwrap_err();
        assert!(matches!(err, GraphError::InvalidConvention(ref s) if s == "I+A"));

        let from_json: Result<Convention, _> = serde_json::from_str("\"AI\"");
        assert!(from_json.is_err());
    }

    #[test]
    fn test_attr_value_order_and_hash() {
        let mut values = vec![
            AttrValue::Text("b".into()),
            AttrValue::Float(2.5),
            AttrValue::Null,
            AttrValue::Int(1),
            AttrValue::Bool(true),
        ];
        values.sort();
        assert_eq!(values[0], AttrValue::Null);
        assert_eq!(values[1], AttrValue::Bool(true));
        assert_eq!(values[2], AttrValue::Int(1));
        assert_eq!(values[3], AttrValue::Float(2.5));
        assert_eq!(values[4], AttrValue::Text("b".into()));

        // Int(1) and Float(1.0) are equal and must collapse in a set.
        let set: HashSet<AttrValue> = [AttrValue::Int(1), AttrValue::Float(1.0)].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_large_integers_stay_distinct() {
        let big = 1i64 << 53;
        assert_ne!(AttrValue::Int(big), AttrValue::Int(big + 1));
        assert!(AttrValue::Int(big) < AttrValue::Int(big + 1));
        assert_eq!(AttrValue::Int(big), AttrValue::Float(big as f64));
        assert_ne!(AttrValue::Int(big + 1), AttrValue::Float(big as f64));
        assert!(AttrValue::Float(big as f64) < AttrValue::Int(big + 1));

        let set: HashSet<AttrValue> = [AttrValue::Int(big), AttrValue::Int(big + 1)].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_nested_extras_pass_through() {
        let raw = serde_json::json!({
            "name": "steel production",
            "unit": "kg",
            "classifications": [["ISIC", "2410"], ["CPC", "41"]],
            "properties": {"carbon content": {"amount": 0.02, "unit": "kg"}},
        });
        let meta = NodeMetadata::from_json(raw.clone()).unwrap();

        let classifications = meta.extra.get("classifications").unwrap();
        assert!(matches!(classifications, AttrValue::List(items) if items.len() == 2));
        assert!(matches!(meta.extra.get("properties"), Some(AttrValue::Map(_))));
        assert_eq!(serde_json::to_value(&meta).unwrap(), raw);
    }

    #[test]
    fn test_composite_values_order_after_scalars() {
        let list = AttrValue::List(vec![AttrValue::from("a")]);
        let map = AttrValue::Map(BTreeMap::from([("k".to_string(), AttrValue::Int(1))]));
        assert!(AttrValue::from("zzz") < list);
        assert!(list < map);
        assert!(AttrValue::List(vec![AttrValue::Int(1)]) < AttrValue::List(vec![AttrValue::Int(1), AttrValue::Null]));
    }

    #[test]
    fn test_metadata_from_json_keeps_extras() {
        let meta = NodeMetadata::from_json(serde_json::json!({
            "name": "Sector A",
            "unit": "USD",
            "location": "CH",
            "code": 42,
        }))
        .unwrap();

        assert_eq!(meta.name.as_deref(), Some("Sector A"));
        assert_eq!(meta.extra.get("location"), Some(&AttrValue::Text("CH".into())));
        assert_eq!(meta.key_of("code").as_deref(), Some("42"));
        assert_eq!(meta.key_of("missing"), None);
    }

    #[test]
    fn test_require_name_unit() {
        let ok = NodeMetadata::new("Steel", "kg");
        assert!(ok.require_name_unit(NodeType::Production, 0).is_ok());

        let no_unit = NodeMetadata { name: Some("Steel".into()), ..Default::default() };
        let err = no_unit.require_name_unit(NodeType::Production, 3).unwrap_err();
        assert!(matches!(err, GraphError::MissingAttribute { index: 3, field: "unit", .. }));
    }
}
