// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Owner attribution between objects of arbitrary kinds.

use kube::{Resource, ResourceExt};
use std::sync::Arc;

/// Whether `parent` is the controlling owner of `child`
pub fn is_controlled_by<C: Resource, P: Resource>(child: &C, parent: &P) -> bool {
    let Some(uid) = parent.uid() else {
        return false;
    };

    child.namespace() == parent.namespace()
        && child
            .owner_references()
            .iter()
            .any(|owner| owner.controller == Some(true) && owner.uid == uid)
}

/// The controlling owner of `child` among `parents`, if any
pub fn find_owner<'a, C: Resource, P: Resource>(
    parents: &'a [Arc<P>],
    child: &C,
) -> Option<&'a Arc<P>> {
    parents
        .iter()
        .find(|parent| is_controlled_by(child, parent.as_ref()))
}
