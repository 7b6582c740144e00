//! Room membership: who is present and when they joined.

use room_types::{Identity, OccupantSnapshot};

/// Holds the occupant view the application sees.
///
/// Snapshots are replaced wholesale on every update and the local identity is
/// always stripped before the snapshot is stored. The tracker never diffs;
/// use [`OccupantDelta::between`] on consecutive snapshots for that.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipTracker {
    occupants: OccupantSnapshot,
}

impl MembershipTracker {
    /// Create a tracker with no occupants.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current view with `raw`, minus `local_id`.
    ///
    /// Takes the raw map by value so callers cannot keep a handle on what the
    /// tracker stores. Returns the stored (filtered) view for notification.
    pub fn apply_snapshot(
        &mut self,
        mut raw: OccupantSnapshot,
        local_id: Option<&Identity>,
    ) -> &OccupantSnapshot {
        if let Some(local_id) = local_id {
            raw.remove(local_id);
        }
        self.occupants = raw;
        &self.occupants
    }

    /// Current occupants (local identity excluded).
    pub fn occupants(&self) -> &OccupantSnapshot {
        &self.occupants
    }
}

/// Joins and leaves between two consecutive snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OccupantDelta {
    /// Present in `next` but not in `previous`.
    pub joined: Vec<Identity>,
    /// Present in `previous` but not in `next`.
    pub left: Vec<Identity>,
}

impl OccupantDelta {
    /// Compute the delta. Both lists are sorted by identity.
    ///
    /// A peer whose join timestamp changed is reported as having left and
    /// rejoined.
    pub fn between(previous: &OccupantSnapshot, next: &OccupantSnapshot) -> Self {
        let joined = next
            .iter()
            .filter(|(id, ts)| previous.get(*id) != Some(*ts))
            .map(|(id, _)| id.clone())
            .collect();
        let left = previous
            .iter()
            .filter(|(id, ts)| next.get(*id) != Some(*ts))
            .map(|(id, _)| id.clone())
            .collect();
        Self { joined, left }
    }

    /// True when nobody joined or left.
    pub fn is_empty(&self) -> bool {
        self.joined.is_empty() && self.left.is_empty()
    }
}
