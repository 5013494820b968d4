pub mod cache;
pub mod eval_ctx;

pub use cache::BoundedCache;
pub use eval_ctx::{
    ContextSettings,
    DEFAULT_HIERARCHY_CACHE_SIZE,
    DEFAULT_LABEL_CACHE_SIZE,
    EvalContext,
    ExprEvaluator,
    LabelEvaluator,
    RequestId,
};
