//! Attribute-based access control for RDF triples.
//!
//! Triples and triple patterns carry labels, boolean expressions over the
//! attributes of whoever is asking. A [`SecurityFilter`] decides per triple
//! whether the requester may see it.

pub mod attr;
pub mod config;
pub mod context;
pub mod error;
pub mod filter;
pub mod labels;
pub mod persist;
pub mod source;
pub mod storefmt;

pub use attr::{Attribute, AttributeExpr, AttributeValueSet, Hierarchy, Operator, ValueTerm};
pub use config::{AbacConfig, StoreConfig, create_labels_store};
pub use context::{ContextSettings, EvalContext};
pub use error::{AbacError, Result};
pub use filter::{FilterPolicy, LabelsGetter, NotConfigured, SecurityFilter};
pub use labels::{Label, LabelsStore, Node, Triple, TriplePattern, Txn, TxnType};
pub use persist::{LabelsStoreSqlite, StoreRegistry};
pub use source::{AttributesSource, AttributesStoreCache, AttributesStoreLocal, HierarchySource};
