//! Per-triple visibility decisions.

use crate::{
    context::EvalContext,
    error::Result,
    labels::{DENY_LABEL, Label, LabelsStore, Triple},
};

/// What to do when there is nothing to evaluate.
#[derive(Debug, Clone)]
pub struct FilterPolicy {
    /// Stands in for an empty label list. `None` means deny.
    pub default_label: Option<Label>,
    /// Verdict when labels are not configured at all.
    pub default_choice_no_labels: bool,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            default_label: None,
            default_choice_no_labels: true,
        }
    }
}

impl FilterPolicy {
    pub fn default_labels(&self) -> Vec<Label> {
        vec![
            self.default_label
                .clone()
                .unwrap_or_else(|| DENY_LABEL.clone()),
        ]
    }
}

/// Where the filter gets labels from. `Ok(None)` means labels are not
/// configured, which is not the same as an empty list.
pub trait LabelsGetter {
    fn labels(&self, triple: &Triple) -> Result<Option<Vec<Label>>>;
}

impl<S: LabelsStore + ?Sized> LabelsGetter for S {
    fn labels(&self, triple: &Triple) -> Result<Option<Vec<Label>>> {
        self.labels_for_triple(triple).map(Some)
    }
}

/// A dataset with no labels store.
pub struct NotConfigured;

impl LabelsGetter for NotConfigured {
    fn labels(&self, _triple: &Triple) -> Result<Option<Vec<Label>>> {
        Ok(None)
    }
}

/// Decides, triple by triple, what one request may see.
pub struct SecurityFilter<'a, G: LabelsGetter + ?Sized> {
    labels: &'a G,
    policy: FilterPolicy,
    ctx: EvalContext<'a>,
}

impl<'a, G: LabelsGetter + ?Sized> SecurityFilter<'a, G> {
    pub fn new(labels: &'a G, policy: FilterPolicy, ctx: EvalContext<'a>) -> Self {
        Self {
            labels,
            policy,
            ctx,
        }
    }

    /// Whether the requester may see `triple`. Every label must evaluate
    /// true; the first that does not ends the check.
    pub fn test(&mut self, triple: &Triple) -> Result<bool> {
        let labels = match self.labels.labels(triple)? {
            None => {
                let verdict = self.policy.default_choice_no_labels;
                if self.ctx.debug() {
                    log::debug!(
                        "[{}] {triple}: labels not configured -> {verdict}",
                        self.ctx.request_id()
                    );
                }
                return Ok(verdict);
            }
            Some(labels) if labels.is_empty() => self.policy.default_labels(),
            Some(labels) => labels,
        };

        for label in &labels {
            if !self.ctx.evaluate(label)?.is_true() {
                if self.ctx.debug() {
                    log::debug!(
                        "[{}] {triple}: denied by '{label}'",
                        self.ctx.request_id()
                    );
                }
                return Ok(false);
            }
        }
        if self.ctx.debug() {
            log::debug!("[{}] {triple}: visible", self.ctx.request_id());
        }
        Ok(true)
    }

    /// The visible subset of `triples`, in order.
    pub fn filter<'t, I>(&mut self, triples: I) -> Result<Vec<Triple>>
    where
        I: IntoIterator<Item = &'t Triple>,
    {
        let mut visible = Vec::new();
        for triple in triples {
            if self.test(triple)? {
                visible.push(triple.clone());
            }
        }
        Ok(visible)
    }

    pub fn policy(&self) -> &FilterPolicy {
        &self.policy
    }

    pub fn context(&self) -> &EvalContext<'a> {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut EvalContext<'a> {
        &mut self.ctx
    }

    pub fn into_context(self) -> EvalContext<'a> {
        self.ctx
    }
}
