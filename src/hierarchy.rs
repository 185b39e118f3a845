//! # Hierarchy: Roles and Authorization Predicates
//!
//! Users form a three-level tree below the admins: vendors own team leaders,
//! team leaders own workers. The tree is stored as nullable parent links on a
//! flat user record (`vendor_id`, `team_leader_id`) plus a role tag. Workers
//! carry the `vendor_id` of their team leader so subtree checks never need a
//! second lookup.
//!
//! Every authorization decision in the API goes through the predicates in
//! this module. They are pure functions over [`Principal`] so they can be
//! tested without a database.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Vendor,
    TeamLeader,
    Worker,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Vendor => "vendor",
            Role::TeamLeader => "team_leader",
            Role::Worker => "worker",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "vendor" => Ok(Role::Vendor),
            "team_leader" => Ok(Role::TeamLeader),
            "worker" => Ok(Role::Worker),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// The parts of a user that authorization depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
    pub vendor_id: Option<Uuid>,
    pub team_leader_id: Option<Uuid>,
}

/// Broken hierarchy link on user creation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("{0} accounts cannot have a parent vendor or team leader")]
    UnexpectedParent(Role),
    #[error("team_leader accounts require a vendor_id")]
    MissingVendor,
    #[error("worker accounts require a team_leader_id")]
    MissingTeamLeader,
    #[error("vendor_id must reference a vendor, found {0}")]
    VendorRoleMismatch(Role),
    #[error("team_leader_id must reference a team_leader, found {0}")]
    TeamLeaderRoleMismatch(Role),
}

/// Resolved parent links for a new account: `(vendor_id, team_leader_id)`.
pub type Links = (Option<Uuid>, Option<Uuid>);

/// Check the parent links of a new account and derive the stored links.
///
/// `vendor` and `team_leader` are the already-fetched parents named in the
/// request. Workers inherit their team leader's vendor.
pub fn resolve_links(
    role: Role,
    vendor: Option<&Principal>,
    team_leader: Option<&Principal>,
) -> Result<Links, LinkError> {
    match role {
        Role::Admin | Role::Vendor => {
            if vendor.is_some() || team_leader.is_some() {
                return Err(LinkError::UnexpectedParent(role));
            }
            Ok((None, None))
        }
        Role::TeamLeader => {
            if team_leader.is_some() {
                return Err(LinkError::UnexpectedParent(role));
            }
            let vendor = vendor.ok_or(LinkError::MissingVendor)?;
            if vendor.role != Role::Vendor {
                return Err(LinkError::VendorRoleMismatch(vendor.role));
            }
            Ok((Some(vendor.id), None))
        }
        Role::Worker => {
            let tl = team_leader.ok_or(LinkError::MissingTeamLeader)?;
            if tl.role != Role::TeamLeader {
                return Err(LinkError::TeamLeaderRoleMismatch(tl.role));
            }
            Ok((tl.vendor_id, Some(tl.id)))
        }
    }
}

/// Whether `actor` may create an account of `role` hanging off the given links.
pub fn can_create(actor: &Principal, role: Role, links: Links) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Vendor => match role {
            Role::TeamLeader | Role::Worker => links.0 == Some(actor.id),
            Role::Admin | Role::Vendor => false,
        },
        Role::TeamLeader | Role::Worker => false,
    }
}

/// Whether `actor` sits above `target` in the tree (admins sit above everyone).
pub fn is_superior_of(actor: &Principal, target: &Principal) -> bool {
    if actor.id == target.id {
        return false;
    }
    match actor.role {
        Role::Admin => true,
        Role::Vendor => {
            matches!(target.role, Role::TeamLeader | Role::Worker)
                && target.vendor_id == Some(actor.id)
        }
        Role::TeamLeader => {
            target.role == Role::Worker && target.team_leader_id == Some(actor.id)
        }
        Role::Worker => false,
    }
}

/// Whether `actor` may act on behalf of `worker` (sessions, counts, stats).
pub fn can_act_for(actor: &Principal, worker: &Principal) -> bool {
    actor.id == worker.id || is_superior_of(actor, worker)
}

/// Whether `actor` may set a recount on a session led by `session_team_leader`.
pub fn can_recount(actor: &Principal, session_team_leader: Uuid) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::TeamLeader => actor.id == session_team_leader,
        Role::Vendor | Role::Worker => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: Role, vendor: Option<Uuid>, tl: Option<Uuid>) -> Principal {
        Principal {
            id: Uuid::new_v4(),
            role,
            vendor_id: vendor,
            team_leader_id: tl,
        }
    }

    struct Tree {
        admin: Principal,
        vendor: Principal,
        other_vendor: Principal,
        tl: Principal,
        worker: Principal,
        foreign_worker: Principal,
    }

    fn tree() -> Tree {
        let admin = principal(Role::Admin, None, None);
        let vendor = principal(Role::Vendor, None, None);
        let other_vendor = principal(Role::Vendor, None, None);
        let tl = principal(Role::TeamLeader, Some(vendor.id), None);
        let other_tl = principal(Role::TeamLeader, Some(other_vendor.id), None);
        let worker = principal(Role::Worker, Some(vendor.id), Some(tl.id));
        let foreign_worker = principal(Role::Worker, Some(other_vendor.id), Some(other_tl.id));
        Tree {
            admin,
            vendor,
            other_vendor,
            tl,
            worker,
            foreign_worker,
        }
    }

    #[test]
    fn role_parse_round_trips_known_names() {
        for role in [Role::Admin, Role::Vendor, Role::TeamLeader, Role::Worker] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("supervisor".parse::<Role>().is_err());
    }

    #[test]
    fn worker_inherits_vendor_from_team_leader() {
        let t = tree();
        let links = resolve_links(Role::Worker, None, Some(&t.tl)).unwrap();
        assert_eq!(links, (Some(t.vendor.id), Some(t.tl.id)));
    }

    #[test]
    fn worker_requires_team_leader_parent() {
        let t = tree();
        assert_eq!(
            resolve_links(Role::Worker, None, None),
            Err(LinkError::MissingTeamLeader)
        );
        assert_eq!(
            resolve_links(Role::Worker, None, Some(&t.vendor)),
            Err(LinkError::TeamLeaderRoleMismatch(Role::Vendor))
        );
    }

    #[test]
    fn team_leader_requires_vendor_parent() {
        let t = tree();
        assert_eq!(
            resolve_links(Role::TeamLeader, None, None),
            Err(LinkError::MissingVendor)
        );
        assert_eq!(
            resolve_links(Role::TeamLeader, Some(&t.tl), None),
            Err(LinkError::VendorRoleMismatch(Role::TeamLeader))
        );
        assert_eq!(
            resolve_links(Role::TeamLeader, Some(&t.vendor), None).unwrap(),
            (Some(t.vendor.id), None)
        );
    }

    #[test]
    fn top_level_roles_reject_parents() {
        let t = tree();
        assert_eq!(
            resolve_links(Role::Vendor, Some(&t.other_vendor), None),
            Err(LinkError::UnexpectedParent(Role::Vendor))
        );
        assert_eq!(resolve_links(Role::Admin, None, None).unwrap(), (None, None));
    }

    #[test]
    fn vendor_creates_only_inside_own_subtree() {
        let t = tree();
        assert!(can_create(&t.vendor, Role::TeamLeader, (Some(t.vendor.id), None)));
        assert!(can_create(&t.vendor, Role::Worker, (Some(t.vendor.id), Some(t.tl.id))));
        assert!(!can_create(&t.other_vendor, Role::Worker, (Some(t.vendor.id), Some(t.tl.id))));
        assert!(!can_create(&t.vendor, Role::Vendor, (None, None)));
        assert!(!can_create(&t.tl, Role::Worker, (Some(t.vendor.id), Some(t.tl.id))));
        assert!(can_create(&t.admin, Role::Admin, (None, None)));
    }

    #[test]
    fn superiority_follows_links() {
        let t = tree();
        assert!(is_superior_of(&t.admin, &t.worker));
        assert!(is_superior_of(&t.vendor, &t.tl));
        assert!(is_superior_of(&t.vendor, &t.worker));
        assert!(is_superior_of(&t.tl, &t.worker));
        assert!(!is_superior_of(&t.tl, &t.foreign_worker));
        assert!(!is_superior_of(&t.other_vendor, &t.worker));
        assert!(!is_superior_of(&t.worker, &t.tl));
        assert!(!is_superior_of(&t.admin, &t.admin));
    }

    #[test]
    fn workers_act_only_for_themselves() {
        let t = tree();
        assert!(can_act_for(&t.worker, &t.worker));
        assert!(!can_act_for(&t.worker, &t.foreign_worker));
        assert!(can_act_for(&t.tl, &t.worker));
    }

    #[test]
    fn recount_is_reserved_for_session_team_leader_and_admin() {
        let t = tree();
        assert!(can_recount(&t.tl, t.tl.id));
        assert!(can_recount(&t.admin, t.tl.id));
        assert!(!can_recount(&t.vendor, t.tl.id));
        assert!(!can_recount(&t.worker, t.tl.id));
        let other_tl = principal(Role::TeamLeader, Some(t.vendor.id), None);
        assert!(!can_recount(&other_tl, t.tl.id));
    }
}
