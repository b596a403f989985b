//! Blocking counters contributed by busy work items.
//!
//! Every busy item adds its [`BlockingPolicy`] to the ledger exactly once and
//! removes it exactly once. The counters are never recomputed from the busy
//! set, so `acquire`/`release` must stay symmetric.

use std::collections::HashMap;

use super::policy::{BlockBits, BlockingModes, BlockingPolicy};

/// Incrementally maintained exclusion state.
#[derive(Debug, Clone)]
pub struct BlockingLedger {
    block_all: usize,
    block_input: usize,
    names: HashMap<String, usize>,
    bits: [usize; BlockBits::WIDTH],
}

impl Default for BlockingLedger {
    fn default() -> Self {
        Self {
            block_all: 0,
            block_input: 0,
            names: HashMap::new(),
            bits: [0; BlockBits::WIDTH],
        }
    }
}

impl BlockingLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the contribution of an item that became busy.
    pub fn acquire(&mut self, name: &str, policy: &BlockingPolicy) {
        if policy.modes.contains(BlockingModes::ALL) {
            self.block_all += 1;
        }
        if policy.modes.contains(BlockingModes::USER_INTERACTION) {
            self.block_input += 1;
        }
        if policy.modes.contains(BlockingModes::SAME_NAME) {
            *self.names.entry(name.to_string()).or_insert(0) += 1;
        }
        if policy.modes.contains(BlockingModes::BITS) {
            for i in policy.blocking_bits.iter() {
                self.bits[i] += 1;
            }
        }
    }

    /// Remove the contribution of an item that left the busy set.
    pub fn release(&mut self, name: &str, policy: &BlockingPolicy) {
        if policy.modes.contains(BlockingModes::ALL) {
            decrement(&mut self.block_all, "block_all");
        }
        if policy.modes.contains(BlockingModes::USER_INTERACTION) {
            decrement(&mut self.block_input, "block_input");
        }
        if policy.modes.contains(BlockingModes::SAME_NAME) {
            match self.names.get_mut(name) {
                Some(count) if *count > 1 => *count -= 1,
                Some(_) => {
                    self.names.remove(name);
                }
                None => {
                    debug_assert!(false, "released unblocked name `{name}`");
                    tracing::error!(name = name, "blocked-name counter underflow");
                }
            }
        }
        if policy.modes.contains(BlockingModes::BITS) {
            for i in policy.blocking_bits.iter() {
                decrement(&mut self.bits[i], "block_bits");
            }
        }
    }

    /// Returns true if an item with this name and tags may start now.
    ///
    /// Only the candidate's name and `own_bits` matter; its own blocking
    /// modes are irrelevant to its admission.
    #[must_use]
    pub fn admits(&self, name: &str, own_bits: BlockBits) -> bool {
        if self.names.contains_key(name) {
            return false;
        }
        own_bits.iter().all(|i| self.bits[i] == 0)
    }

    /// Number of busy items declaring `ALL`.
    #[must_use]
    pub const fn block_all_count(&self) -> usize {
        self.block_all
    }

    /// Number of busy items declaring `USER_INTERACTION`.
    #[must_use]
    pub const fn block_input_count(&self) -> usize {
        self.block_input
    }

    /// How many busy items currently block `name`.
    #[must_use]
    pub fn name_block_count(&self, name: &str) -> usize {
        self.names.get(name).copied().unwrap_or(0)
    }

    /// Number of distinct blocked names.
    #[must_use]
    pub fn blocked_name_count(&self) -> usize {
        self.names.len()
    }

    /// How many busy items currently block bit `index`.
    #[must_use]
    pub fn bit_count(&self, index: usize) -> usize {
        self.bits.get(index).copied().unwrap_or(0)
    }

    /// Returns true if nothing is blocked.
    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.block_all == 0
            && self.block_input == 0
            && self.names.is_empty()
            && self.bits.iter().all(|&c| c == 0)
    }
}

fn decrement(counter: &mut usize, which: &'static str) {
    debug_assert!(*counter > 0, "{which} counter underflow");
    if *counter == 0 {
        tracing::error!(counter = which, "blocking counter underflow");
        return;
    }
    *counter -= 1;
}
