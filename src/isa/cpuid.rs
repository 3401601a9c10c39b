//! A small, order-preserving vector of CPUID feature-flag tokens.
//!
//! The Intel manual lists flags in a meaningful order (the order a
//! human reading the manual would expect them enumerated in), and
//! spec.md is explicit that `cpuid_flags` equality is *sequence*
//! equality, not set equality. `Vec<String>`'s derived `Eq`/`Hash`
//! already give us that, but wrapping it keeps the "this is a
//! sequence, not a set" intent visible at call sites and gives us a
//! single place to hang a `Display` impl for reporting.

use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CpuidFlags(Vec<Box<str>>);

impl CpuidFlags {
    pub fn empty() -> Self {
        CpuidFlags(Vec::new())
    }

    pub fn from_pipe_separated(raw: &str) -> Self {
        if raw.is_empty() {
            return CpuidFlags::empty();
        }
        CpuidFlags(raw.split('|').map(Box::from).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|s| &**s)
    }
}

impl fmt::Display for CpuidFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, flag) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", flag)?;
        }
        write!(f, "]")
    }
}
