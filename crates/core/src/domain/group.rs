//! The persistent record of one recurring class.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{
    Acceptance, AgentId, ClassroomId, RejectReason, ScheduleWindow, Subject,
};

/// Monotonic numeric id, stable across save/reload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub u64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group_{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionGroup {
    pub id: GroupId,
    pub name: String,
    pub teacher: AgentId,
    /// Ordered, duplicate-free, never contains the teacher.
    pub students: Vec<AgentId>,
    pub subject: Subject,
    /// Finite completion goal. Ignored by infinite subjects.
    pub goal: f32,
    #[serde(default)]
    pub progress: f32,
    pub window: ScheduleWindow,
    #[serde(default)]
    pub suspended: bool,
    pub classroom: ClassroomId,
}

impl SessionGroup {
    pub fn new(
        id: GroupId,
        name: impl Into<String>,
        teacher: AgentId,
        students: Vec<AgentId>,
        subject: Subject,
        goal: f32,
        window: ScheduleWindow,
        classroom: ClassroomId,
    ) -> Self {
        let mut group = Self {
            id,
            name: name.into(),
            teacher,
            students: Vec::new(),
            subject,
            goal,
            progress: 0.0,
            window,
            suspended: false,
            classroom,
        };
        for student in students {
            group.add_student(student);
        }
        group
    }

    /// Authoring-time shape check. Qualification and facility checks belong
    /// to role assignment and ongoing validation.
    pub fn validate(&self) -> Acceptance {
        if self.name.trim().is_empty() {
            return RejectReason::EmptyName.into();
        }
        if self.students.is_empty() {
            return RejectReason::NoStudents.into();
        }
        Acceptance::Accepted
    }

    /// Progress only moves forward; negative amounts are ignored.
    pub fn add_progress(&mut self, amount: f32) {
        self.progress += amount.max(0.0);
    }

    pub fn progress_fraction(&self) -> f32 {
        if self.goal > 0.0 {
            self.progress / self.goal
        } else {
            0.0
        }
    }

    pub fn is_completed(&self) -> bool {
        !self.subject.is_infinite() && self.progress >= self.goal
    }

    /// Insert while keeping the students list duplicate-free and excluding
    /// the teacher.
    pub fn add_student(&mut self, student: AgentId) -> bool {
        if student == self.teacher || self.students.contains(&student) {
            return false;
        }
        self.students.push(student);
        true
    }

    pub fn remove_student(&mut self, student: AgentId) -> bool {
        let before = self.students.len();
        self.students.retain(|other| *other != student);
        self.students.len() != before
    }

    pub fn is_member(&self, agent: AgentId) -> bool {
        agent == self.teacher || self.students.contains(&agent)
    }

    /// Teacher first, then students in roster order.
    pub fn participants(&self) -> Vec<AgentId> {
        let mut all = Vec::with_capacity(self.students.len() + 1);
        all.push(self.teacher);
        all.extend_from_slice(&self.students);
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SkillId;

    fn group() -> SessionGroup {
        SessionGroup::new(
            GroupId(1),
            "Morning cooking",
            AgentId::new(),
            vec![AgentId::new(), AgentId::new()],
            Subject::skill(SkillId::Cooking),
            1000.0,
            ScheduleWindow::new(8, 10),
            ClassroomId(0),
        )
    }

    #[test]
    fn test_students_stay_unique_and_exclude_teacher() {
        let mut group = group();
        let teacher = group.teacher;
        let student = group.students[0];

        assert!(!group.add_student(teacher));
        assert!(!group.add_student(student));
        assert_eq!(group.students.len(), 2);
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut group = group();
        group.add_progress(10.0);
        group.add_progress(-50.0);
        assert_eq!(group.progress, 10.0);
    }

    #[test]
    fn test_completion_requires_finite_goal() {
        let mut group = group();
        group.progress = group.goal;
        assert!(group.is_completed());

        group.subject = Subject::childcare();
        assert!(!group.is_completed());
    }

    #[test]
    fn test_validate_rejects_empty_roster() {
        let mut group = group();
        group.students.clear();
        assert_eq!(group.validate().reason(), Some(&RejectReason::NoStudents));
    }

    #[test]
    fn test_serde_round_trip_keeps_identity() {
        let group = group();
        let json = serde_json::to_string(&group).unwrap();
        let back: SessionGroup = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, group.id);
        assert_eq!(back.students, group.students);
        assert_eq!(back.window, group.window);
    }
}
