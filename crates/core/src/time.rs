//! Monotonic time newtypes.
//!
//! The runtime keeps all deadlines in nanoseconds since an arbitrary
//! monotonic epoch chosen by the platform clock. Arithmetic saturates rather
//! than wrapping: a saturated deadline (`u64::MAX`) simply never fires.

use core::fmt;
use core::ops::{Add, Sub};

/// Nanoseconds on the platform's monotonic clock.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Nanoseconds(pub u64);

impl Nanoseconds {
    pub const ZERO: Nanoseconds = Nanoseconds(0);
    pub const MAX: Nanoseconds = Nanoseconds(u64::MAX);

    pub const fn new(ns: u64) -> Self {
        Self(ns)
    }

    pub const fn from_millis(ms: u64) -> Self {
        Self(ms.saturating_mul(1_000_000))
    }

    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1_000_000_000))
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn as_millis(self) -> u64 {
        self.0 / 1_000_000
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn saturating_add(self, rhs: Nanoseconds) -> Nanoseconds {
        Nanoseconds(self.0.saturating_add(rhs.0))
    }

    pub const fn saturating_sub(self, rhs: Nanoseconds) -> Nanoseconds {
        Nanoseconds(self.0.saturating_sub(rhs.0))
    }
}

impl Add for Nanoseconds {
    type Output = Nanoseconds;

    fn add(self, rhs: Nanoseconds) -> Nanoseconds {
        self.saturating_add(rhs)
    }
}

impl Sub for Nanoseconds {
    type Output = Nanoseconds;

    fn sub(self, rhs: Nanoseconds) -> Nanoseconds {
        self.saturating_sub(rhs)
    }
}

impl fmt::Display for Nanoseconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}
