use std::fmt;

use ulid::Ulid;

/// Short type tags rendered in front of an id.
pub mod tag {
    pub const CONNECTION: &str = "conn";
}

/// A ULID that renders with a type tag, e.g. `conn_01J9Z3...`.
///
/// Copyable and hashable, so it can key maps and travel in commands without
/// allocating. The string form only exists when it is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaggedId {
    tag: &'static str,
    ulid: Ulid,
}

impl TaggedId {
    pub fn new(tag: &'static str) -> Self {
        Self { tag, ulid: Ulid::new() }
    }
}

impl fmt::Display for TaggedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.tag, self.ulid)
    }
}
