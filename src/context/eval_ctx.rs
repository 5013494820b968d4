use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::{
    attr::{Attribute, AttributeValueSet, EvalEnv, Hierarchy, ValueTerm, evaluate},
    context::cache::BoundedCache,
    error::Result,
    labels::Label,
    source::HierarchySource,
};

pub const DEFAULT_LABEL_CACHE_SIZE: usize = 100_000;
pub const DEFAULT_HIERARCHY_CACHE_SIZE: usize = 100;

static NEXT_REQUEST: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl RequestId {
    fn next() -> Self {
        RequestId(NEXT_REQUEST.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ContextSettings {
    pub label_cache_size: usize,
    pub hierarchy_cache_size: usize,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            label_cache_size: DEFAULT_LABEL_CACHE_SIZE,
            hierarchy_cache_size: DEFAULT_HIERARCHY_CACHE_SIZE,
        }
    }
}

/// Turns a label into a verdict.
pub trait LabelEvaluator: Send + Sync {
    fn evaluate_label(&self, label: &Label, env: &mut dyn EvalEnv) -> Result<ValueTerm>;
}

/// Parses the label text and evaluates the expression.
pub struct ExprEvaluator;

impl LabelEvaluator for ExprEvaluator {
    fn evaluate_label(&self, label: &Label, env: &mut dyn EvalEnv) -> Result<ValueTerm> {
        evaluate(&label.parse()?, env)
    }
}

/// Hierarchy lookups go through the request's hierarchy cache.
struct CachedEnv<'c, 'a> {
    attributes: &'a AttributeValueSet,
    hierarchies: &'a dyn HierarchySource,
    cache: &'c mut BoundedCache<Attribute, Option<Arc<Hierarchy>>>,
}

impl EvalEnv for CachedEnv<'_, '_> {
    fn values(&self, attribute: &Attribute) -> &[ValueTerm] {
        self.attributes.get(attribute)
    }

    fn hierarchy(&mut self, attribute: &Attribute) -> Option<Arc<Hierarchy>> {
        if let Some(found) = self.cache.get(attribute) {
            return found;
        }
        let found = self.hierarchies.hierarchy(attribute);
        self.cache.insert(attribute.clone(), found.clone());
        found
    }
}

/// State for one request: the requester's attributes and the label and
/// hierarchy caches. Never shared between requests.
pub struct EvalContext<'a> {
    request_id: RequestId,
    attributes: &'a AttributeValueSet,
    hierarchies: &'a dyn HierarchySource,
    evaluator: &'a dyn LabelEvaluator,
    label_cache: BoundedCache<Label, ValueTerm>,
    hierarchy_cache: BoundedCache<Attribute, Option<Arc<Hierarchy>>>,
    debug: bool,
}

impl<'a> EvalContext<'a> {
    pub fn new(
        attributes: &'a AttributeValueSet,
        hierarchies: &'a dyn HierarchySource,
        settings: ContextSettings,
    ) -> Self {
        Self::with_evaluator(attributes, hierarchies, settings, &ExprEvaluator)
    }

    pub fn with_evaluator(
        attributes: &'a AttributeValueSet,
        hierarchies: &'a dyn HierarchySource,
        settings: ContextSettings,
        evaluator: &'a dyn LabelEvaluator,
    ) -> Self {
        Self {
            request_id: RequestId::next(),
            attributes,
            hierarchies,
            evaluator,
            label_cache: BoundedCache::new(settings.label_cache_size),
            hierarchy_cache: BoundedCache::new(settings.hierarchy_cache_size),
            debug: false,
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn attributes(&self) -> &AttributeValueSet {
        self.attributes
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Verdict for one label, cached for the rest of the request.
    ///
    /// A label that no longer parses is denied and logged; other failures
    /// propagate.
    pub fn evaluate(&mut self, label: &Label) -> Result<ValueTerm> {
        if let Some(verdict) = self.label_cache.get(label) {
            return Ok(verdict);
        }

        let mut env = CachedEnv {
            attributes: self.attributes,
            hierarchies: self.hierarchies,
            cache: &mut self.hierarchy_cache,
        };
        let verdict = match self.evaluator.evaluate_label(label, &mut env) {
            Ok(verdict) => verdict,
            Err(e) if e.is_syntax() => {
                log::error!("[{}] unparsable label '{label}' denied: {e}", self.request_id);
                ValueTerm::FALSE
            }
            Err(e) => return Err(e),
        };

        if self.debug {
            log::debug!("[{}] label '{label}' -> {verdict}", self.request_id);
        }
        self.label_cache.insert(label.clone(), verdict.clone());
        Ok(verdict)
    }

    pub fn label_cache(&self) -> &BoundedCache<Label, ValueTerm> {
        &self.label_cache
    }

    pub fn hierarchy_cache(&self) -> &BoundedCache<Attribute, Option<Arc<Hierarchy>>> {
        &self.hierarchy_cache
    }
}
