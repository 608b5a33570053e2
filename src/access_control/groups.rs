//! Transitive group membership
//!
//! Groups may list identities and other groups. The closure of an identity
//! is produced in preorder: each group is followed by every group that
//! contains it before moving on to the next sibling in declaration order.
//! `@all` always comes last.

use crate::access_control::types::ALL_GROUP;
use crate::error::PolicyResult;
use crate::policy::PolicyDocument;
use std::collections::HashSet;
use std::iter::FusedIterator;
use tracing::trace;

struct Frame {
    member: String,
    next: usize,
}

/// Lazy, single-pass sequence of the groups an identity belongs to
pub struct Membership {
    groups: Vec<(String, Vec<String>)>,
    stack: Vec<Frame>,
    visited: HashSet<String>,
    all_emitted: bool,
}

impl Membership {
    fn new(groups: Vec<(String, Vec<String>)>, identity: &str) -> Self {
        Self {
            groups,
            stack: vec![Frame {
                member: identity.to_string(),
                next: 0,
            }],
            visited: HashSet::new(),
            all_emitted: false,
        }
    }
}

impl Iterator for Membership {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        while let Some(frame) = self.stack.last_mut() {
            let found = self.groups[frame.next..]
                .iter()
                .position(|(name, members)| {
                    !self.visited.contains(name)
                        && members
                            .iter()
                            .any(|m| *m == frame.member || m == ALL_GROUP)
                });

            match found {
                Some(offset) => {
                    let index = frame.next + offset;
                    frame.next = index + 1;

                    let group = self.groups[index].0.clone();
                    trace!(member = %frame.member, group = %group, "found membership");
                    self.visited.insert(group.clone());
                    self.stack.push(Frame {
                        member: group.clone(),
                        next: 0,
                    });
                    return Some(group);
                }
                None => {
                    self.stack.pop();
                }
            }
        }

        if self.all_emitted {
            None
        } else {
            self.all_emitted = true;
            Some(ALL_GROUP.to_string())
        }
    }
}

impl FusedIterator for Membership {}

/// Groups `identity` belongs to, directly or through other groups.
///
/// Cyclic group definitions are tolerated: each group is produced at most
/// once during the traversal.
pub fn membership_closure(policy: &PolicyDocument, identity: &str) -> PolicyResult<Membership> {
    let mut groups = Vec::new();
    for name in policy.groups() {
        let members = policy.group_members(name)?.unwrap_or_default();
        groups.push((name.to_string(), members));
    }
    Ok(Membership::new(groups, identity))
}
