//! Blocking-policy flags declared by work items.
//!
//! A running item enforces its [`BlockingModes`] on every *other* item that
//! is still waiting for admission:
//!
//! | Mode | Effect while the item is busy |
//! |------|-------------------------------|
//! | `ALL` | no new item is admitted at all |
//! | `SAME_NAME` | items with the same name wait |
//! | `BITS` | items whose `own_bits` intersect this item's `blocking_bits` wait |
//! | `USER_INTERACTION` | observers are told that user input is blocked |
//!
//! ```
//! use prometheus_task_director::core::{BlockBits, BlockingModes};
//!
//! let modes = BlockingModes::SAME_NAME | BlockingModes::BITS;
//! assert!(modes.contains(BlockingModes::BITS));
//! assert!(!modes.contains(BlockingModes::ALL));
//!
//! let bits = BlockBits::bit(3) | BlockBits::bit(5);
//! assert_eq!(bits.iter().collect::<Vec<_>>(), vec![3, 5]);
//! ```

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Set of exclusion policies an item enforces while it is busy.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct BlockingModes(u8);

impl BlockingModes {
    /// No blocking (empty set).
    pub const NONE: Self = Self(0);
    /// Global barrier: nothing new starts.
    pub const ALL: Self = Self(1 << 0);
    /// Serialize items sharing this item's name.
    pub const SAME_NAME: Self = Self(1 << 1);
    /// Exclude items tagged with any of this item's blocking bits.
    pub const BITS: Self = Self(1 << 2);
    /// Gate user input while the item runs.
    pub const USER_INTERACTION: Self = Self(1 << 3);

    /// Returns true if every mode in `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if no mode is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Raw flag value.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for BlockingModes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for BlockingModes {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for BlockingModes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }
        let names = [
            (Self::ALL, "ALL"),
            (Self::SAME_NAME, "SAME_NAME"),
            (Self::BITS, "BITS"),
            (Self::USER_INTERACTION, "USER_INTERACTION"),
        ];
        let mut first = true;
        for (flag, name) in names {
            if self.contains(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// 64-bit resource tag mask.
///
/// Used both for the tags an item carries (`own_bits`) and for the tags it
/// excludes while busy (`blocking_bits`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct BlockBits(u64);

impl BlockBits {
    /// Number of distinct bits.
    pub const WIDTH: usize = 64;
    /// Empty mask.
    pub const EMPTY: Self = Self(0);

    /// Mask with only bit `index` set.
    ///
    /// # Panics
    ///
    /// Panics if `index >= BlockBits::WIDTH`.
    #[must_use]
    pub const fn bit(index: usize) -> Self {
        assert!(index < Self::WIDTH, "block bit index out of range");
        Self(1 << index)
    }

    /// Mask from a raw value.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw mask value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Returns true if bit `index` is set. Out-of-range indices are never set.
    #[must_use]
    pub const fn is_set(self, index: usize) -> bool {
        index < Self::WIDTH && self.0 & (1 << index) != 0
    }

    /// Returns true if no bit is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Indices of the set bits, lowest first.
    pub fn iter(self) -> impl Iterator<Item = usize> {
        (0..Self::WIDTH).filter(move |&i| self.is_set(i))
    }
}

impl BitOr for BlockBits {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for BlockBits {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for BlockBits {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

/// Immutable blocking declaration of a single item.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockingPolicy {
    /// Modes enforced on others while busy.
    pub modes: BlockingModes,
    /// Tags this item carries.
    pub own_bits: BlockBits,
    /// Tags this item excludes while busy (only with `BITS`).
    pub blocking_bits: BlockBits,
}
