//! Tests for blocking policies and the ledger

use prometheus_task_director::core::{BlockBits, BlockingLedger, BlockingModes, BlockingPolicy};

fn policy(modes: BlockingModes, blocking_bits: BlockBits) -> BlockingPolicy {
    BlockingPolicy {
        modes,
        own_bits: BlockBits::EMPTY,
        blocking_bits,
    }
}

#[test]
fn test_modes_combine() {
    let modes = BlockingModes::SAME_NAME | BlockingModes::USER_INTERACTION;
    assert!(modes.contains(BlockingModes::SAME_NAME));
    assert!(modes.contains(BlockingModes::USER_INTERACTION));
    assert!(!modes.contains(BlockingModes::ALL));
    assert!(BlockingModes::NONE.is_empty());
    assert_eq!(format!("{modes:?}"), "SAME_NAME | USER_INTERACTION");
}

#[test]
fn test_block_bits_set_ops() {
    let bits = BlockBits::bit(0) | BlockBits::bit(63);
    assert!(bits.is_set(0));
    assert!(bits.is_set(63));
    assert!(!bits.is_set(1));
    assert_eq!(bits.iter().collect::<Vec<_>>(), vec![0, 63]);
    assert!((bits & BlockBits::bit(1)).is_empty());
    assert_eq!(BlockBits::from_raw(bits.raw()), bits);
}

#[test]
fn test_ledger_same_name_counts() {
    let mut ledger = BlockingLedger::new();
    let p = policy(BlockingModes::SAME_NAME, BlockBits::EMPTY);

    ledger.acquire("Build", &p);
    ledger.acquire("Build", &p);
    assert_eq!(ledger.name_block_count("Build"), 2);
    assert!(!ledger.admits("Build", BlockBits::EMPTY));
    assert!(ledger.admits("Test", BlockBits::EMPTY));

    ledger.release("Build", &p);
    assert!(!ledger.admits("Build", BlockBits::EMPTY));
    ledger.release("Build", &p);
    assert!(ledger.admits("Build", BlockBits::EMPTY));
    assert!(ledger.is_clear());
}

#[test]
fn test_ledger_bits_only_block_tagged_items() {
    let mut ledger = BlockingLedger::new();
    let writer = policy(BlockingModes::BITS, BlockBits::bit(3) | BlockBits::bit(7));
    ledger.acquire("writer", &writer);

    assert!(!ledger.admits("reader", BlockBits::bit(3)));
    assert!(!ledger.admits("reader", BlockBits::bit(4) | BlockBits::bit(7)));
    assert!(ledger.admits("reader", BlockBits::bit(4)));
    assert!(ledger.admits("untagged", BlockBits::EMPTY));

    ledger.release("writer", &writer);
    assert!(ledger.is_clear());
}

#[test]
fn test_ledger_bits_ignored_without_mode() {
    let mut ledger = BlockingLedger::new();
    let p = policy(BlockingModes::NONE, BlockBits::bit(3));
    ledger.acquire("x", &p);
    assert_eq!(ledger.bit_count(3), 0);
    assert!(ledger.admits("reader", BlockBits::bit(3)));
}

#[test]
fn test_ledger_all_and_input_counters() {
    let mut ledger = BlockingLedger::new();
    let p = policy(
        BlockingModes::ALL | BlockingModes::USER_INTERACTION,
        BlockBits::EMPTY,
    );
    ledger.acquire("modal", &p);
    assert_eq!(ledger.block_all_count(), 1);
    assert_eq!(ledger.block_input_count(), 1);

    ledger.release("modal", &p);
    assert_eq!(ledger.block_all_count(), 0);
    assert_eq!(ledger.block_input_count(), 0);
}
