//! Viewer-dependent visibility policy.
//!
//! A pure function from the viewer context to the base predicate restricting
//! which items may appear in results at all, independent of the query text.
//! The engine ANDs it in before the compiled expression and before any seek
//! predicate.

use crate::{
    predicate::{CompareOp, FieldKey, Predicate, Value},
    record::ItemStatus,
};

/// The viewer's role, supplied by the authorization collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Not signed in.
    Guest,
    /// A signed-in user.
    Member,
    /// Moderation staff.
    Moderator,
}

/// Who is asking. Treated as trusted input from the authorization layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    /// The viewer's role.
    pub role: Role,
    /// Whether the viewer passed the adult-content gate.
    pub adult: bool,
    /// The viewer's user id, when signed in.
    pub user_id: Option<u64>,
}

impl Viewer {
    /// An anonymous viewer without the adult gate.
    pub fn guest() -> Self {
        Self {
            role: Role::Guest,
            adult: false,
            user_id: None,
        }
    }

    /// A signed-in member.
    pub fn member(user_id: u64, adult: bool) -> Self {
        Self {
            role: Role::Member,
            adult,
            user_id: Some(user_id),
        }
    }

    /// A moderator.
    pub fn moderator(user_id: u64) -> Self {
        Self {
            role: Role::Moderator,
            adult: true,
            user_id: Some(user_id),
        }
    }
}

/// Builds the base predicate for a viewer; `None` means unrestricted.
///
/// Moderators see everything. Everyone else sees approved items, plus their
/// own uploads when signed in; viewers without the adult gate additionally
/// never see explicit-flagged items.
pub fn visibility_predicate(viewer: &Viewer) -> Option<Predicate> {
    if viewer.role == Role::Moderator {
        return None;
    }

    let approved = Predicate::cmp(
        FieldKey::Status,
        CompareOp::Eq,
        Value::Status(ItemStatus::Approved),
    );
    let reachable = match viewer.user_id {
        Some(user_id) => Predicate::Or(vec![
            approved,
            Predicate::cmp(FieldKey::UploaderId, CompareOp::Eq, Value::Int(user_id as i64)),
        ]),
        None => approved,
    };

    if viewer.adult {
        Some(reachable)
    } else {
        let sfw = Predicate::cmp(FieldKey::Explicit, CompareOp::Eq, Value::Bool(false));
        Some(Predicate::And(vec![reachable, sfw]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        memory::evaluate,
        record::{MediaRecord, Tag},
    };

    fn item(status: ItemStatus, explicit: bool, uploader_id: u64) -> MediaRecord {
        MediaRecord {
            id: 1,
            status,
            explicit,
            uploader_id,
            tags: vec![Tag::new("cat", false)],
            ..MediaRecord::default()
        }
    }

    fn visible(viewer: &Viewer, record: &MediaRecord) -> bool {
        visibility_predicate(viewer).is_none_or(|predicate| evaluate(record, &predicate))
    }

    #[test]
    fn moderators_are_unrestricted() {
        assert_eq!(visibility_predicate(&Viewer::moderator(1)), None);
        assert!(visible(&Viewer::moderator(1), &item(ItemStatus::Hidden, true, 5)));
    }

    #[test]
    fn guests_see_approved_sfw_only() {
        let guest = Viewer::guest();
        assert!(visible(&guest, &item(ItemStatus::Approved, false, 5)));
        assert!(!visible(&guest, &item(ItemStatus::Approved, true, 5)));
        assert!(!visible(&guest, &item(ItemStatus::Pending, false, 5)));
    }

    #[test]
    fn members_see_their_own_pending_uploads() {
        let member = Viewer::member(5, false);
        assert!(visible(&member, &item(ItemStatus::Pending, false, 5)));
        assert!(!visible(&member, &item(ItemStatus::Pending, false, 6)));
    }

    #[test]
    fn adult_gate_controls_explicit_items() {
        assert!(visible(&Viewer::member(5, true), &item(ItemStatus::Approved, true, 6)));
        assert!(!visible(&Viewer::member(5, false), &item(ItemStatus::Approved, true, 6)));
    }
}
