//! Persistent world state: session groups, classrooms, and their id
//! counters. One registry exists per world and is passed explicitly to every
//! operation that needs it — there is no global instance.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::{Classroom, ClassroomId, FixtureId, GroupId, SessionGroup};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct GroupRegistry {
    groups: Vec<SessionGroup>,
    classrooms: Vec<Classroom>,
    next_group_id: u64,
    next_classroom_id: u64,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate_group_id(&mut self) -> GroupId {
        let id = GroupId(self.next_group_id);
        self.next_group_id += 1;
        id
    }

    pub fn add_group(&mut self, group: SessionGroup) {
        info!(group_id = %group.id, name = %group.name, "Session group added");
        self.groups.push(group);
    }

    pub fn remove_group(&mut self, id: GroupId) -> Option<SessionGroup> {
        let index = self.groups.iter().position(|group| group.id == id)?;
        let group = self.groups.remove(index);
        info!(group_id = %id, name = %group.name, "Session group removed");
        Some(group)
    }

    pub fn group(&self, id: GroupId) -> Option<&SessionGroup> {
        self.groups.iter().find(|group| group.id == id)
    }

    pub fn group_mut(&mut self, id: GroupId) -> Option<&mut SessionGroup> {
        self.groups.iter_mut().find(|group| group.id == id)
    }

    pub fn groups(&self) -> &[SessionGroup] {
        &self.groups
    }

    pub fn groups_mut(&mut self) -> impl Iterator<Item = &mut SessionGroup> {
        self.groups.iter_mut()
    }

    pub fn group_ids(&self) -> Vec<GroupId> {
        self.groups.iter().map(|group| group.id).collect()
    }

    pub fn add_classroom(&mut self, name: impl Into<String>, fixture: FixtureId) -> ClassroomId {
        let id = ClassroomId(self.next_classroom_id);
        self.next_classroom_id += 1;
        let classroom = Classroom::new(id, name, fixture);
        info!(classroom_id = %id, name = %classroom.name, "Classroom added");
        self.classrooms.push(classroom);
        id
    }

    /// Remove a classroom and every group held in it; returns the ids of the
    /// removed groups so callers can clear their schedules.
    pub fn remove_classroom(&mut self, id: ClassroomId) -> Vec<GroupId> {
        let orphaned: Vec<GroupId> = self
            .groups
            .iter()
            .filter(|group| group.classroom == id)
            .map(|group| group.id)
            .collect();
        self.groups.retain(|group| group.classroom != id);
        self.classrooms.retain(|classroom| classroom.id != id);
        info!(classroom_id = %id, orphaned = orphaned.len(), "Classroom removed");
        orphaned
    }

    pub fn classroom(&self, id: ClassroomId) -> Option<&Classroom> {
        self.classrooms.iter().find(|classroom| classroom.id == id)
    }

    pub fn classroom_mut(&mut self, id: ClassroomId) -> Option<&mut Classroom> {
        self.classrooms
            .iter_mut()
            .find(|classroom| classroom.id == id)
    }

    pub fn classrooms(&self) -> &[Classroom] {
        &self.classrooms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    use crate::domain::{AgentId, ScheduleWindow, SkillId, Subject};

    fn sample_group(registry: &mut GroupRegistry, classroom: ClassroomId) -> GroupId {
        let id = registry.allocate_group_id();
        registry.add_group(SessionGroup::new(
            id,
            "test",
            AgentId::new(),
            vec![AgentId::new()],
            Subject::skill(SkillId::Plants),
            500.0,
            ScheduleWindow::new(9, 11),
            classroom,
        ));
        id
    }

    #[test]
    fn test_group_ids_are_monotonic() {
        let mut registry = GroupRegistry::new();
        let classroom = registry.add_classroom("room", FixtureId(Uuid::new_v4()));
        let first = sample_group(&mut registry, classroom);
        let second = sample_group(&mut registry, classroom);
        assert!(second > first);

        registry.remove_group(first);
        let third = sample_group(&mut registry, classroom);
        assert!(third > second);
    }

    #[test]
    fn test_removing_classroom_removes_its_groups() {
        let mut registry = GroupRegistry::new();
        let classroom = registry.add_classroom("room", FixtureId(Uuid::new_v4()));
        let keeper_room = registry.add_classroom("other", FixtureId(Uuid::new_v4()));
        let doomed = sample_group(&mut registry, classroom);
        let keeper = sample_group(&mut registry, keeper_room);

        let orphaned = registry.remove_classroom(classroom);
        assert_eq!(orphaned, vec![doomed]);
        assert!(registry.group(doomed).is_none());
        assert!(registry.group(keeper).is_some());
    }

    #[test]
    fn test_registry_round_trips_through_serde() {
        let mut registry = GroupRegistry::new();
        let classroom = registry.add_classroom("room", FixtureId(Uuid::new_v4()));
        let id = sample_group(&mut registry, classroom);

        let json = serde_json::to_string(&registry).unwrap();
        let mut back: GroupRegistry = serde_json::from_str(&json).unwrap();
        assert!(back.group(id).is_some());
        assert_eq!(back.allocate_group_id(), registry.allocate_group_id());
    }
}
