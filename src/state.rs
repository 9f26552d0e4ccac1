use crate::types::AggregateVersion;

/// The state of an aggregate instance, reconstructed by folding its event
/// history, paired with the version (the count of events folded into it).
///
/// The state carries no identity of its own: it is always obtained for, and
/// used against, a specific aggregate id held by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateState<S> {
    version: AggregateVersion,
    inner: S,
}

impl<S: Default> Default for AggregateState<S> {
    fn default() -> Self {
        Self {
            version: 0,
            inner: Default::default(),
        }
    }
}

impl<S> AggregateState<S> {
    pub fn new(version: AggregateVersion, inner: S) -> Self {
        Self { version, inner }
    }

    pub fn version(&self) -> AggregateVersion {
        self.version
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}
