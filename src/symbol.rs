use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// A named algebraic variable.
///
/// Symbols are compared and ordered by name. Cloning is cheap, so the same
/// symbol can be shared freely between encodings, unknown-variable sets and
/// monomial bases.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Symbol(Arc<str>);

impl Symbol {
    pub fn new(name: &str) -> Self {
        Symbol(Arc::from(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.as_ref().cmp(other.0.as_ref())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_ordering_by_name() {
        let a = Symbol::new("alpha");
        let b = Symbol::new("b1");
        assert!(a < b);
        assert_eq!(a, Symbol::new("alpha"));
    }
}
