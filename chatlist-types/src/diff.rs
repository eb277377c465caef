//! View diff operations produced by list mutations.

use serde::{Deserialize, Serialize};
use std::iter::FusedIterator;
use std::ops::{BitOr, BitOrAssign};

/// A single structural change to the rows shown by the view layer.
///
/// Positions are row indices at the moment the operation is applied, in the
/// order the operations are yielded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DiffOp {
    /// `count` rows were inserted starting at `position`.
    Inserted {
        /// First inserted row.
        position: usize,
        /// Number of inserted rows.
        count: usize,
    },
    /// The row at `position` was removed.
    Removed {
        /// Removed row.
        position: usize,
    },
    /// The row at `from` now lives at `to`.
    Moved {
        /// Previous row.
        from: usize,
        /// New row.
        to: usize,
    },
    /// The row at `position` must be re-bound.
    Changed {
        /// Changed row.
        position: usize,
    },
}

impl DiffOp {
    /// Whether this op changes the row structure (everything but `Changed`).
    pub fn is_structural(&self) -> bool {
        !matches!(self, DiffOp::Changed { .. })
    }

    /// The same op with every position moved down by `offset` rows.
    pub fn shifted(self, offset: usize) -> Self {
        match self {
            DiffOp::Inserted { position, count } => DiffOp::Inserted {
                position: position + offset,
                count,
            },
            DiffOp::Removed { position } => DiffOp::Removed {
                position: position + offset,
            },
            DiffOp::Moved { from, to } => DiffOp::Moved {
                from: from + offset,
                to: to + offset,
            },
            DiffOp::Changed { position } => DiffOp::Changed {
                position: position + offset,
            },
        }
    }
}

/// The finite sequence of diff operations produced by one mutation.
///
/// A patch is consumed exactly once by the view layer: it is an iterator,
/// it cannot be cloned or rewound, and once drained it stays empty.
#[derive(Debug, Default)]
#[must_use = "a patch must be handed to the view layer"]
pub struct Patch {
    ops: std::vec::IntoIter<DiffOp>,
}

impl Patch {
    /// A patch with no operations.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a patch from operations in application order.
    pub fn from_ops(ops: Vec<DiffOp>) -> Self {
        Self {
            ops: ops.into_iter(),
        }
    }

    /// Remaining operations without consuming them.
    pub fn as_slice(&self) -> &[DiffOp] {
        self.ops.as_slice()
    }

    /// Whether there is nothing left to apply.
    pub fn is_empty(&self) -> bool {
        self.ops.len() == 0
    }

    /// Whether any remaining op is structural.
    pub fn has_structural_change(&self) -> bool {
        self.as_slice().iter().any(DiffOp::is_structural)
    }

    /// Rewrite the remaining ops so that every position is shifted by `offset`.
    pub fn shifted(self, offset: usize) -> Self {
        if offset == 0 {
            return self;
        }
        Self::from_ops(self.map(|op| op.shifted(offset)).collect())
    }

    /// Append another patch after this one.
    pub fn chain(self, other: Patch) -> Self {
        if other.is_empty() {
            return self;
        }
        let mut ops: Vec<DiffOp> = self.collect();
        ops.extend(other);
        Self::from_ops(ops)
    }
}

impl Iterator for Patch {
    type Item = DiffOp;

    fn next(&mut self) -> Option<DiffOp> {
        self.ops.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ops.size_hint()
    }
}

impl ExactSizeIterator for Patch {}

impl FusedIterator for Patch {}

/// Follow-up work a caller must perform after applying a patch.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateFlags(u8);

impl UpdateFlags {
    /// Nothing to do.
    pub const NONE: UpdateFlags = UpdateFlags(0);
    /// Keep the first visible row anchored while applying the patch.
    pub const RETAIN_SCROLL_ANCHOR: UpdateFlags = UpdateFlags(0x01);
    /// Separators between the special prefix and ordinary rows must be redrawn.
    pub const INVALIDATE_DECORATIONS: UpdateFlags = UpdateFlags(0x02);

    /// Whether every bit of `other` is set.
    pub const fn contains(&self, other: UpdateFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no bit is set.
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Set `other` when `condition` holds.
    pub fn set_if(&mut self, other: UpdateFlags, condition: bool) {
        if condition {
            self.0 |= other.0;
        }
    }
}

impl BitOr for UpdateFlags {
    type Output = UpdateFlags;

    fn bitor(self, rhs: UpdateFlags) -> UpdateFlags {
        UpdateFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for UpdateFlags {
    fn bitor_assign(&mut self, rhs: UpdateFlags) {
        self.0 |= rhs.0;
    }
}

impl std::fmt::Debug for UpdateFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names = Vec::new();
        if self.contains(Self::RETAIN_SCROLL_ANCHOR) {
            names.push("RETAIN_SCROLL_ANCHOR");
        }
        if self.contains(Self::INVALIDATE_DECORATIONS) {
            names.push("INVALIDATE_DECORATIONS");
        }
        write!(f, "UpdateFlags({})", names.join(" | "))
    }
}
