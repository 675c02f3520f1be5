//! Typed port descriptions

use std::any::{Any, TypeId};
use std::fmt;

/// Name and value type of a filter port
#[derive(Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub name: String,
    pub type_id: TypeId,
    pub type_name: &'static str,
}

impl PortInfo {
    /// Untyped ordering port; carries no value, only completion
    pub fn notify(name: impl Into<String>) -> Self {
        port::<()>(name)
    }

    /// Whether values of `other` may be connected into this port
    pub fn accepts(&self, other: &PortInfo) -> bool {
        self.type_id == other.type_id
    }
}

impl fmt::Debug for PortInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.type_name)
    }
}

/// Port named `name` carrying values of type `T`
pub fn port<T: Any + Send + Sync>(name: impl Into<String>) -> PortInfo {
    PortInfo {
        name: name.into(),
        type_id: TypeId::of::<T>(),
        type_name: std::any::type_name::<T>(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_types() {
        let a = port::<u32>("count");
        let b = port::<u32>("other");
        let c = port::<f32>("count");

        assert!(a.accepts(&b));
        assert!(!a.accepts(&c));
        assert_eq!(format!("{a:?}"), "count: u32");
        assert!(PortInfo::notify("x").accepts(&port::<()>("y")));
    }
}
