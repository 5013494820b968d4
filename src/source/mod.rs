//! Suppliers of requester attributes and attribute hierarchies.

pub mod cache;
pub mod local;

use std::sync::Arc;

pub use cache::AttributesStoreCache;
pub use local::AttributesStoreLocal;

use crate::attr::{Attribute, AttributeValueSet, Hierarchy};

pub trait HierarchySource: Send + Sync {
    fn hierarchy(&self, attribute: &Attribute) -> Option<Arc<Hierarchy>>;

    fn has_hierarchy(&self, attribute: &Attribute) -> bool {
        self.hierarchy(attribute).is_some()
    }
}

pub trait AttributesSource: HierarchySource {
    /// Attributes of `user`, or `None` for an unknown user.
    fn attributes(&self, user: &str) -> Option<AttributeValueSet>;

    fn users(&self) -> Vec<String>;
}

/// A source that declares no hierarchies.
pub struct NoHierarchies;

impl HierarchySource for NoHierarchies {
    fn hierarchy(&self, _attribute: &Attribute) -> Option<Arc<Hierarchy>> {
        None
    }
}

impl<T: HierarchySource + ?Sized> HierarchySource for Arc<T> {
    fn hierarchy(&self, attribute: &Attribute) -> Option<Arc<Hierarchy>> {
        (**self).hierarchy(attribute)
    }
}

impl<T: AttributesSource + ?Sized> AttributesSource for Arc<T> {
    fn attributes(&self, user: &str) -> Option<AttributeValueSet> {
        (**self).attributes(user)
    }

    fn users(&self) -> Vec<String> {
        (**self).users()
    }
}
