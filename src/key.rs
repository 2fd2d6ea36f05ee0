//! Store key construction.

use std::borrow::Cow;

/// Maps caller keys to store keys, applying an optional namespace.
///
/// Two proxies with different namespaces can share one backing store without
/// their entries colliding.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyBuilder {
    namespace: Option<String>,
}

impl KeyBuilder {
    pub fn new(namespace: Option<String>) -> Self {
        KeyBuilder { namespace }
    }

    /// Store key for a caller key: `"{namespace}:{key}"`, or `key` unchanged.
    pub fn build<'a>(&self, key: &'a str) -> Cow<'a, str> {
        match &self.namespace {
            Some(ns) => Cow::Owned(format!("{}:{}", ns, key)),
            None => Cow::Borrowed(key),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}
