//! Presence roster - derived view of the room's membership
//!
//! The membership layer owns presence. The roster only mirrors what it
//! has announced so the classroom can resolve roles and names by session.

use std::collections::HashMap;

use crate::models::{ClassRole, Participant, PresenceMeta, SessionId};
use crate::roles::{resolve_role, RoleResolver};

/// Mirror of the presence registry
#[derive(Debug, Default, Clone)]
pub struct Roster {
    members: HashMap<SessionId, PresenceMeta>,
}

impl Roster {
    /// Create an empty roster
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the roster with a full presence snapshot
    pub fn load<I>(&mut self, snapshot: I)
    where
        I: IntoIterator<Item = (SessionId, PresenceMeta)>,
    {
        self.members = snapshot.into_iter().collect();
        tracing::debug!(members = self.members.len(), "Loaded presence snapshot");
    }

    /// Insert or update a member, returning the previous metadata
    pub fn upsert(&mut self, session_id: SessionId, meta: PresenceMeta) -> Option<PresenceMeta> {
        self.members.insert(session_id, meta)
    }

    /// Remove a member, returning its last metadata
    pub fn remove(&mut self, session_id: &SessionId) -> Option<PresenceMeta> {
        self.members.remove(session_id)
    }

    /// Get a member's metadata
    pub fn get(&self, session_id: &SessionId) -> Option<&PresenceMeta> {
        self.members.get(session_id)
    }

    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.members.contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Iterate over all members
    pub fn iter(&self) -> impl Iterator<Item = (&SessionId, &PresenceMeta)> {
        self.members.iter()
    }

    /// Display name of a member, if known
    pub fn display_name(&self, session_id: &SessionId) -> Option<&str> {
        self.members
            .get(session_id)
            .map(|meta| meta.profile.name_or_unknown())
    }

    /// Participants sorted by display name
    pub fn participants(&self) -> Vec<Participant> {
        let mut list: Vec<_> = self
            .members
            .iter()
            .map(|(id, meta)| Participant {
                session_id: id.clone(),
                display_name: meta.profile.name_or_unknown().to_string(),
                is_teacher: resolve_role(meta).is_teacher(),
            })
            .collect();
        list.sort_by(|a, b| {
            a.display_name
                .cmp(&b.display_name)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        list
    }

    /// Members currently resolved as teachers
    pub fn teachers(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self
            .members
            .iter()
            .filter(|(_, meta)| resolve_role(meta).is_teacher())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}

impl RoleResolver for Roster {
    fn role_of(&self, session_id: &SessionId) -> ClassRole {
        self.members
            .get(session_id)
            .map(resolve_role)
            .unwrap_or(ClassRole::Student)
    }
}
