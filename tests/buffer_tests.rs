//! Buffer Tests
//!
//! Tests for:
//! - Growth: capacity policy, append offsets, zero-fill
//! - ReplaceData: splice semantics and refusal cases
//! - Encoded regions: marking, activation, redirected reads

use vellum::{AssetError, Buffer};

// ============================================================================
// Growth and append
// ============================================================================

#[test]
fn append_returns_pre_append_offset() {
    let mut b = Buffer::default();
    assert_eq!(b.append_data(&[1, 2, 3, 4]), 0);
    assert_eq!(b.append_data(&[5, 6]), 4);
    assert_eq!(b.byte_length(), 6);
    assert_eq!(b.raw_data(), &[1, 2, 3, 4, 5, 6]);
}

#[test]
fn grow_zero_is_a_no_op() {
    let mut b = Buffer::default();
    b.append_data(&[9]);
    let cap = b.capacity();
    b.grow(0);
    assert_eq!(b.byte_length(), 1);
    assert_eq!(b.capacity(), cap);
}

#[test]
fn grow_capacity_is_monotonic() {
    let mut b = Buffer::default();
    let mut last_cap = 0;
    for _ in 0..64 {
        b.append_data(&[0u8; 7]);
        assert!(b.capacity() >= last_cap);
        assert!(b.capacity() >= b.byte_length());
        last_cap = b.capacity();
    }
    assert_eq!(b.byte_length(), 64 * 7);
}

#[test]
fn grow_at_least_one_and_a_half() {
    let mut b = Buffer::default();
    b.append_data(&[0u8; 100]);
    let cap = b.capacity();
    // Force a reallocation; the new capacity is at least 1.5x the old one.
    b.grow(cap - b.raw_data().len() + 1);
    assert!(b.capacity() >= cap + cap / 2);
}

// ============================================================================
// ReplaceData
// ============================================================================

#[test]
fn replace_same_size() {
    let mut b = Buffer::default();
    b.append_data(&[1, 2, 3, 4, 5]);
    assert!(b.replace_data(1, 3, &[7, 8, 9]));
    assert_eq!(b.raw_data(), &[1, 7, 8, 9, 5]);
    assert_eq!(b.byte_length(), 5);
}

#[test]
fn replace_shrinks_and_grows() {
    let mut b = Buffer::default();
    b.append_data(&[1, 2, 3, 4, 5]);
    assert!(b.replace_data(1, 3, &[9]));
    assert_eq!(b.raw_data(), &[1, 9, 5]);
    assert_eq!(b.byte_length(), 3);

    assert!(b.replace_data(2, 1, &[6, 7, 8]));
    assert_eq!(b.raw_data(), &[1, 9, 6, 7, 8]);
    assert_eq!(b.byte_length(), 5);
}

#[test]
fn replace_refuses_degenerate_arguments() {
    let mut b = Buffer::default();
    b.append_data(&[1, 2, 3]);
    assert!(!b.replace_data(0, 0, &[9]));
    assert!(!b.replace_data(0, 2, &[]));
    assert!(!b.replace_data(2, 5, &[9]));
    assert_eq!(b.raw_data(), &[1, 2, 3]);
}

// ============================================================================
// Encoded regions
// ============================================================================

fn region_buffer() -> Buffer {
    // 4 raw bytes, then a 4-byte "encoded" span, then 4 raw bytes.
    let mut b = Buffer::default();
    b.append_data(&[0, 1, 2, 3]);
    b.append_data(&[0xAA; 4]);
    b.append_data(&[8, 9, 10, 11]);
    b
}

#[test]
fn mark_region_restates_logical_length() {
    let mut b = region_buffer();
    b.mark_encoded_region(4, 4, vec![100, 101, 102, 103, 104, 105], "chunk")
        .unwrap();
    // 12 - 4 encoded + 6 decoded
    assert_eq!(b.byte_length(), 14);
}

#[test]
fn mark_region_rejects_empty_decoded() {
    let mut b = region_buffer();
    let err = b.mark_encoded_region(4, 4, vec![], "chunk").unwrap_err();
    assert!(matches!(err, AssetError::EmptyRegionData));
}

#[test]
fn mark_region_rejects_out_of_range() {
    let mut b = region_buffer();
    let err = b
        .mark_encoded_region(10, 4, vec![1, 2], "chunk")
        .unwrap_err();
    assert!(matches!(err, AssetError::RegionOutOfRange { .. }));
}

#[test]
fn reads_redirect_into_active_region() {
    let mut b = region_buffer();
    b.mark_encoded_region(4, 4, vec![100, 101, 102, 103, 104, 105], "chunk")
        .unwrap();

    // No active region: reads hit raw storage.
    assert_eq!(b.read_bytes(4, 2).unwrap(), &[0xAA, 0xAA]);

    b.set_current_encoded_region("chunk").unwrap();
    assert_eq!(b.read_bytes(4, 3).unwrap(), &[100, 101, 102]);
    assert_eq!(b.read_bytes(8, 2).unwrap(), &[104, 105]);
    // Outside the decoded span, raw storage again.
    assert_eq!(b.read_bytes(0, 2).unwrap(), &[0, 1]);

    b.clear_current_encoded_region();
    assert_eq!(b.read_bytes(4, 2).unwrap(), &[0xAA, 0xAA]);
}

#[test]
fn activating_unknown_region_fails() {
    let mut b = region_buffer();
    b.mark_encoded_region(4, 4, vec![1, 2, 3, 4], "chunk")
        .unwrap();
    let err = b.set_current_encoded_region("other").unwrap_err();
    assert!(matches!(err, AssetError::RegionNotFound { .. }));
    // Activating the already-active region is fine.
    b.set_current_encoded_region("chunk").unwrap();
    b.set_current_encoded_region("chunk").unwrap();
}

#[test]
fn read_past_end_fails() {
    let b = region_buffer();
    assert!(matches!(
        b.read_bytes(10, 4),
        Err(AssetError::OutOfRange { .. })
    ));
}
