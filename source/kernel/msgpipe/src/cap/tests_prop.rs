// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg(test)]
//! CONTEXT: Property-based tests for handle duplication
//! OWNERS: @kernel-cap-team
//! NOTE: Tests only; no kernel logic. Ensures rights never escalate and counts balance.
//!
//! TEST_SCOPE:
//!   - Duplicate masks rights to the requested subset
//!   - Duplicate rejects superset rights requests deterministically
//!   - Live-handle counter returns to baseline after arbitrary duplicate/close runs
//!
//! TEST_SCENARIOS:
//!   - duplicate_preserves_object_and_masks(): duplicated handle keeps koid and gets requested rights
//!   - duplicate_rejects_superset(): requesting rights outside parent returns PermissionDenied
//!   - duplicate_close_balances(): N duplicates then close leaves exactly the root open

use alloc::sync::Arc;
use alloc::vec::Vec;

use super::{CapError, Handle, KernelObject, ObjectKind, Rights};
use proptest::prelude::*;

struct Token;

impl KernelObject for Token {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Opaque
    }
}

fn arb_rights() -> impl Strategy<Value = Rights> {
    (0u8..32).prop_map(|bits| Rights::from_bits_truncate(bits as u32))
}

proptest! {
    #[test]
    fn duplicate_preserves_object_and_masks(base in arb_rights(), mask in arb_rights()) {
        let base = base | Rights::DUPLICATE;
        let root = Handle::new(Arc::new(Token), base);
        let requested = base & mask;
        let dup = root.duplicate(requested).unwrap();
        prop_assert_eq!(dup.koid(), root.koid());
        prop_assert_eq!(dup.rights(), requested);
    }

    #[test]
    fn duplicate_rejects_superset(base in arb_rights(), extra in 1u8..32) {
        let base = base | Rights::DUPLICATE;
        let root = Handle::new(Arc::new(Token), base);
        let extra = Rights::from_bits_truncate(extra as u32);
        prop_assume!(!base.contains(extra));
        prop_assert_eq!(
            root.duplicate(base | extra).unwrap_err(),
            CapError::PermissionDenied { held: base, requested: base | extra }
        );
        prop_assert_eq!(root.live_handles(), 1);
    }

    #[test]
    fn duplicate_close_balances(count in 0usize..48) {
        let root = Handle::new(Arc::new(Token), Rights::all());
        let dups: Vec<Handle> = (0..count).map(|_| root.duplicate(Rights::READ).unwrap()).collect();
        prop_assert_eq!(root.live_handles(), count + 1);
        dups.into_iter().for_each(Handle::close);
        prop_assert_eq!(root.live_handles(), 1);
    }
}
