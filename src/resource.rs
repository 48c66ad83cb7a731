use std::collections::BTreeMap;
use std::fmt;

use crate::Value;

/// Field access for a resource instance.
///
/// The rule engine never reflects over Rust types: each resource type tells it
/// which names are plain attributes and which are relations, and hands out
/// related resources only when they are already in memory.
pub trait Resource {
    /// Name of the resource type. Rules are registered per resource type.
    fn resource_type(&self) -> &str;

    /// Value of a plain attribute, or `None` if the type has no such attribute.
    fn field(&self, name: &str) -> Option<Value>;

    /// Related resource(s) reached through `name`, or `None` if `name` is
    /// not a relation of this type.
    fn relation(&self, _name: &str) -> Option<Related<'_>> {
        None
    }
}

/// State of a relation on a resource instance.
pub enum Related<'a> {
    One(&'a dyn Resource),
    Many(Vec<&'a dyn Resource>),
    /// The relation is loaded and empty.
    Nil,
    /// The relation exists but its data was never loaded onto the instance.
    NotLoaded,
}

impl fmt::Debug for Related<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Related::One(resource) => f
                .debug_tuple("One")
                .field(&resource.resource_type())
                .finish(),
            Related::Many(resources) => f.debug_tuple("Many").field(&resources.len()).finish(),
            Related::Nil => f.write_str("Nil"),
            Related::NotLoaded => f.write_str("NotLoaded"),
        }
    }
}

/// A generic in-memory resource with named attributes and associations.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    resource_type: String,
    fields: BTreeMap<String, Value>,
    associations: BTreeMap<String, Association>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Association {
    One(Box<Record>),
    Many(Vec<Record>),
    Nil,
    NotLoaded,
}

impl From<Record> for Association {
    fn from(record: Record) -> Self {
        Association::One(Box::new(record))
    }
}

impl From<Vec<Record>> for Association {
    fn from(records: Vec<Record>) -> Self {
        Association::Many(records)
    }
}

impl From<Option<Record>> for Association {
    fn from(record: Option<Record>) -> Self {
        record.map_or(Association::Nil, Into::into)
    }
}

impl Record {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            fields: BTreeMap::new(),
            associations: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_association(
        mut self,
        name: impl Into<String>,
        association: impl Into<Association>,
    ) -> Self {
        self.associations.insert(name.into(), association.into());
        self
    }

    /// Declares `name` as a relation whose data has not been loaded.
    pub fn with_unloaded(self, name: impl Into<String>) -> Self {
        self.with_association(name, Association::NotLoaded)
    }
}

impl Resource for Record {
    fn resource_type(&self) -> &str {
        &self.resource_type
    }

    fn field(&self, name: &str) -> Option<Value> {
        self.fields.get(name).cloned()
    }

    fn relation(&self, name: &str) -> Option<Related<'_>> {
        self.associations
            .get(name)
            .map(|association| match association {
                Association::One(record) => Related::One(&**record),
                Association::Many(records) => Related::Many(
                    records
                        .iter()
                        .map(|record| record as &dyn Resource)
                        .collect(),
                ),
                Association::Nil => Related::Nil,
                Association::NotLoaded => Related::NotLoaded,
            })
    }
}
