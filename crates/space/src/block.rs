use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Immutable state of one block: its type name, keyed properties and whether
/// it is solid for connectivity purposes.
///
/// All "mutators" return a new state. Properties are kept in a BTreeMap so
/// equality and display are independent of insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockState {
    name: String,
    solid: bool,
    properties: BTreeMap<String, String>,
}

impl BlockState {
    /// Block with no properties.
    pub fn new(name: impl Into<String>, solid: bool) -> Self {
        Self {
            name: name.into(),
            solid,
            properties: BTreeMap::new(),
        }
    }

    /// The empty block.
    pub fn air() -> Self {
        Self::new("air", false)
    }

    /// Block type name, e.g. `cobblestone_wall`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the block obstructs movement.
    pub fn is_solid(&self) -> bool {
        self.solid
    }

    /// Whether this is the empty block.
    pub fn is_air(&self) -> bool {
        self.name == "air"
    }

    /// Value of one property.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// All properties, sorted by key.
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Copy of this state with one property set.
    pub fn with_property(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.properties.insert(key.into(), value.into());
        next
    }

    /// Copy of this state with every given property set; others are kept.
    pub fn with_properties<K, V>(&self, props: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut next = self.clone();
        for (k, v) in props {
            next.properties.insert(k.into(), v.into());
        }
        next
    }
}

impl Default for BlockState {
    fn default() -> Self {
        Self::air()
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.properties.is_empty() {
            let props: Vec<String> = self
                .properties
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            write!(f, "[{}]", props.join(","))?;
        }
        Ok(())
    }
}
