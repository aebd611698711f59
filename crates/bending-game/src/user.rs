//! Per-session user state.

use glam::Vec3;

use crate::ability::EYE_HEIGHT;
use crate::profile::{PlayerProfile, SLOT_COUNT};
use crate::PlayerId;

/// Host-reported state, refreshed every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct UserState {
    /// Feet position.
    pub position: Vec3,
    /// Unit look direction.
    pub direction: Vec3,
    pub world: String,
    pub spectator: bool,
}

impl Default for UserState {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            direction: Vec3::Z,
            world: "world".into(),
            spectator: false,
        }
    }
}

impl UserState {
    pub fn eye_position(&self) -> Vec3 {
        self.position + Vec3::Y * EYE_HEIGHT
    }

    /// Look direction, falling back to +Z for a zero vector.
    pub fn look(&self) -> Vec3 {
        self.direction.try_normalize().unwrap_or(Vec3::Z)
    }
}

/// Identifies one join of a player; a rejoin gets a new token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionToken(pub u64);

/// An online player.
#[derive(Debug, Clone)]
pub struct User {
    pub id: PlayerId,
    pub name: String,
    pub session: SessionToken,
    pub state: UserState,
    selected_slot: usize,
    profile: PlayerProfile,
    /// Profile is a stand-in while the store is unreachable.
    fallback: bool,
    /// The player edited the profile since it was installed.
    modified: bool,
}

impl User {
    pub fn new(id: PlayerId, name: &str, session: SessionToken, state: UserState) -> Self {
        Self {
            id,
            name: name.to_string(),
            session,
            state,
            selected_slot: 0,
            profile: PlayerProfile::new(id, name),
            fallback: true,
            modified: false,
        }
    }

    pub fn profile(&self) -> &PlayerProfile {
        &self.profile
    }

    /// Mutable access for player-driven edits. Marks the profile as modified.
    pub fn profile_mut(&mut self) -> &mut PlayerProfile {
        self.modified = true;
        &mut self.profile
    }

    /// Install a loaded profile.
    pub(crate) fn install_profile(&mut self, profile: PlayerProfile, fallback: bool) {
        self.profile = profile;
        self.fallback = fallback;
        self.modified = false;
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn selected_slot(&self) -> usize {
        self.selected_slot
    }

    /// Select a hotbar slot (0-based). Out-of-range slots are ignored.
    pub fn select_slot(&mut self, slot: usize) -> bool {
        if slot >= SLOT_COUNT {
            return false;
        }
        self.selected_slot = slot;
        true
    }

    /// Ability bound to the selected slot.
    pub fn selected_ability(&self) -> Option<&str> {
        self.profile.bound(self.selected_slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn new_user_starts_on_fallback_profile() {
        let id = Uuid::new_v4();
        let user = User::new(id, "Aang", SessionToken(1), UserState::default());
        assert!(user.is_fallback());
        assert!(!user.is_modified());
        assert_eq!(user.profile().player_id, id);
        assert_eq!(user.selected_slot(), 0);
    }

    #[test]
    fn profile_mut_marks_modified() {
        let mut user = User::new(Uuid::new_v4(), "Aang", SessionToken(1), UserState::default());
        user.profile_mut().bind(0, "air-blast").unwrap();
        assert!(user.is_modified());
        assert_eq!(user.selected_ability(), Some("air-blast"));
    }

    #[test]
    fn select_slot_bounds() {
        let mut user = User::new(Uuid::new_v4(), "Aang", SessionToken(1), UserState::default());
        assert!(user.select_slot(8));
        assert!(!user.select_slot(9));
        assert_eq!(user.selected_slot(), 8);
    }

    #[test]
    fn look_normalizes() {
        let mut state = UserState::default();
        state.direction = Vec3::new(0.0, 0.0, 0.0);
        assert_eq!(state.look(), Vec3::Z);
        state.direction = Vec3::new(2.0, 0.0, 0.0);
        assert_eq!(state.look(), Vec3::X);
        assert_eq!(state.eye_position().y, EYE_HEIGHT);
    }
}
