use std::fmt::{Display, Formatter};

/// Displays the wrapped value, or `N/A` when there is none.
///
/// Formatting options such as precision are passed through to the value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrNa<T>(pub Option<T>);

impl<T: Display> Display for OrNa<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(value) => value.fmt(f),
            None => f.write_str("N/A"),
        }
    }
}
