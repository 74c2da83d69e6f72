//! Results of best-effort collaborator calls that degrade instead of failing.

/// A value that is always usable, tagged with whether it came from the real
/// collaborator or from a fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Complete(T),
    /// The collaborator failed; `value` is the fallback and `reason` says why.
    Degraded { value: T, reason: String },
}

impl<T> Outcome<T> {
    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        Self::Degraded {
            value,
            reason: reason.into(),
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Self::Complete(v) | Self::Degraded { value: v, .. } => v,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Self::Complete(v) | Self::Degraded { value: v, .. } => v,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// Why the fallback was used, if it was.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Complete(_) => None,
            Self::Degraded { reason, .. } => Some(reason),
        }
    }

    /// Splits into the value and the degradation reason.
    pub fn into_parts(self) -> (T, Option<String>) {
        match self {
            Self::Complete(v) => (v, None),
            Self::Degraded { value, reason } => (value, Some(reason)),
        }
    }
}
