use std::{borrow::Cow, collections::HashSet, fmt, sync::Arc};

use once_cell::sync::Lazy;

use crate::{
    attr::{AttributeExpr, parse::parse_expr},
    error::{AbacError, Result},
};

/// Declared character encoding of a label's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Charset {
    Utf8,
    Latin1,
}

/// Label text kept as bytes. Equality never decodes.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label {
    bytes: Arc<[u8]>,
    charset: Charset,
}

/// Applied when a triple has no labels and no default label is configured.
pub static DENY_LABEL: Lazy<Label> = Lazy::new(|| Label::from_text("!"));

pub static ALLOW_LABEL: Lazy<Label> = Lazy::new(|| Label::from_text("*"));

impl Label {
    pub fn from_text(text: &str) -> Self {
        Label {
            bytes: Arc::from(text.as_bytes()),
            charset: Charset::Utf8,
        }
    }

    pub fn from_bytes(bytes: &[u8], charset: Charset) -> Self {
        Label {
            bytes: Arc::from(bytes),
            charset,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    pub fn text(&self) -> Cow<'_, str> {
        match self.charset {
            Charset::Utf8 => String::from_utf8_lossy(&self.bytes),
            Charset::Latin1 => Cow::Owned(self.bytes.iter().map(|&b| b as char).collect()),
        }
    }

    /// The label re-encoded as UTF-8, which is what gets stored.
    pub fn utf8_bytes(&self) -> Cow<'_, [u8]> {
        match self.charset {
            Charset::Utf8 => Cow::Borrowed(&self.bytes),
            Charset::Latin1 => Cow::Owned(self.text().into_owned().into_bytes()),
        }
    }

    pub fn parse(&self) -> Result<AttributeExpr> {
        if self.charset == Charset::Utf8 && std::str::from_utf8(&self.bytes).is_err() {
            return Err(AbacError::syntax("label is not valid UTF-8"));
        }
        parse_expr(&self.text())
    }
}

impl From<&str> for Label {
    fn from(text: &str) -> Self {
        Label::from_text(text)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Label({:?})", self.text())
    }
}

/// Every label must parse and appear once.
pub fn validate_labels(labels: &[Label]) -> Result<()> {
    let mut seen = HashSet::with_capacity(labels.len());
    for label in labels {
        if !seen.insert(label) {
            return Err(AbacError::validation(format!("duplicate label: {label}")));
        }
        label.parse()?;
    }
    Ok(())
}

pub fn labels(texts: &[&str]) -> Vec<Label> {
    texts.iter().map(|t| Label::from_text(t)).collect()
}
