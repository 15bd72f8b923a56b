//! Partial update field

/// Tri-state update for a nullable column.
///
/// `Keep` leaves the stored value untouched, `Clear` writes NULL and `Set`
/// writes a new value. Absent optional input maps to `Keep`, so a missing
/// field in an event never overwrites what is already stored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Patch<T> {
    #[default]
    Keep,
    Clear,
    Set(T),
}

impl<T> Patch<T> {
    /// `Some` sets, `None` keeps.
    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Set(v),
            None => Self::Keep,
        }
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }

    /// Apply to a stored value.
    pub fn apply(self, target: &mut Option<T>) {
        match self {
            Self::Keep => {}
            Self::Clear => *target = None,
            Self::Set(v) => *target = Some(v),
        }
    }

    /// Value to write, or `None` for NULL. Only meaningful when not `Keep`.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Set(v) => Some(v),
            Self::Keep | Self::Clear => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply() {
        let mut stored = Some(1);
        Patch::Keep.apply(&mut stored);
        assert_eq!(stored, Some(1));
        Patch::Set(2).apply(&mut stored);
        assert_eq!(stored, Some(2));
        Patch::Clear.apply(&mut stored);
        assert_eq!(stored, None);
    }

    #[test]
    fn test_from_option() {
        assert_eq!(Patch::from_option(Some("a")), Patch::Set("a"));
        assert!(Patch::<u8>::from_option(None).is_keep());
    }
}
