use crate::Path;
use std::fmt;
use uuid::Uuid;

/// Property and node names.
pub type Name = String;

/// Name of the identification property carrying a node's UUID.
pub const UUID: &str = "mode:uuid";
/// Name of the primary type property.
pub const PRIMARY_TYPE: &str = "jcr:primaryType";

/// A single property value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    String(String),
    Long(i64),
    Boolean(bool),
    Uuid(Uuid),
    Path(Path),
    Name(Name),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::String(s) | Value::Name(s) => write!(f, "{}", s),
            Value::Long(l) => write!(f, "{}", l),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Uuid(u) => write!(f, "{}", u),
            Value::Path(p) => write!(f, "{}", p),
        }
    }
}

/// A named, possibly multi-valued property.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Property {
    name: Name,
    values: Vec<Value>,
}

impl Property {
    pub fn new(name: &str, values: Vec<Value>) -> Self {
        Property {
            name: name.to_string(),
            values,
        }
    }

    pub fn single(name: &str, value: Value) -> Self {
        Self::new(name, vec![value])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn first_value(&self) -> Option<&Value> {
        self.values.first()
    }

    pub fn is_multiple(&self) -> bool {
        self.values.len() > 1
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let values: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        if values.len() == 1 {
            write!(f, "{}={}", self.name, values[0])
        } else {
            write!(f, "{}=[{}]", self.name, values.join(","))
        }
    }
}

/// Identifies a node by path, by identification properties, or both.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    path: Option<Path>,
    id_properties: Vec<Property>,
}

impl Location {
    pub fn with_path(path: Path) -> Self {
        Location {
            path: Some(path),
            id_properties: Vec::new(),
        }
    }

    pub fn with_id(id: Uuid) -> Self {
        Location {
            path: None,
            id_properties: vec![Property::single(UUID, Value::Uuid(id))],
        }
    }

    pub fn with_path_and_id(path: Path, id: Uuid) -> Self {
        Location {
            path: Some(path),
            id_properties: vec![Property::single(UUID, Value::Uuid(id))],
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_ref()
    }

    pub fn has_path(&self) -> bool {
        self.path.is_some()
    }

    pub fn id_properties(&self) -> &[Property] {
        &self.id_properties
    }

    pub fn id_property(&self, name: &str) -> Option<&Property> {
        self.id_properties.iter().find(|p| p.name() == name)
    }

    /// The first UUID value of the identification property, if any.
    pub fn id(&self) -> Option<Uuid> {
        self.id_property(UUID)
            .and_then(|p| p.values().iter().find_map(|v| match v {
                Value::Uuid(u) => Some(*u),
                _ => None,
            }))
    }

    /// Returns a copy of this location at another path, keeping the identification properties.
    pub fn at_path(&self, path: Path) -> Self {
        Location {
            path: Some(path),
            id_properties: self.id_properties.clone(),
        }
    }

    /// Returns a copy of this location with the given identification property added or replaced.
    pub fn with_id_property(&self, property: Property) -> Self {
        let mut id_properties: Vec<Property> = self
            .id_properties
            .iter()
            .filter(|p| p.name() != property.name())
            .cloned()
            .collect();
        id_properties.push(property);
        Location {
            path: self.path.clone(),
            id_properties,
        }
    }

    /// True when both locations share a path, or both carry identical identification properties.
    pub fn is_same(&self, other: &Location) -> bool {
        match (&self.path, &other.path) {
            (Some(a), Some(b)) => a == b,
            _ => !self.id_properties.is_empty() && self.id_properties == other.id_properties,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}", path)?,
            None => write!(f, "<no path>")?,
        }
        if !self.id_properties.is_empty() {
            let ids: Vec<String> = self.id_properties.iter().map(|p| p.to_string()).collect();
            write!(f, " && [{}]", ids.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_location_ids() {
        let id = Uuid::new_v4();
        let loc = Location::with_path_and_id(Path::parse("/a").unwrap(), id);
        assert_eq!(Some(id), loc.id());
        let moved = loc.at_path(Path::parse("/b").unwrap());
        assert_eq!(Some(id), moved.id());
        assert!(!moved.is_same(&loc));
        assert!(Location::with_id(id).is_same(&Location::with_id(id)));
    }

    #[test]
    fn test_with_id_property_replaces() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let loc = Location::with_id(first).with_id_property(Property::new(
            UUID,
            vec![Value::Uuid(first), Value::Uuid(second)],
        ));
        assert_eq!(1, loc.id_properties().len());
        assert!(loc.id_property(UUID).unwrap().is_multiple());
        assert_eq!(Some(first), loc.id());
    }

    #[test]
    fn test_display() {
        let prop = Property::new("tags", vec![Value::Long(1), Value::Long(2)]);
        assert_eq!("tags=[1,2]", prop.to_string());
        let loc = Location::with_path(Path::parse("/a/b[2]").unwrap());
        assert_eq!("/a/b[2]", loc.to_string());
    }
}
