//! Precondition and ongoing-status validation shared by the launcher and the
//! coordinator's supervisory check. Validation never raises; callers receive
//! an `Acceptance` and decide whether to warn, wait, or cancel.

use classworks_core::{
    Acceptance, AgentDirectory, FacilityDirectory, GroupRegistry, RejectReason, SessionGroup,
};

use crate::roles::{role_eligibility, RoleId};

/// Authoring-time facility prerequisites: the classroom fixture exists,
/// enough workstations are linked, and a signal device is on site.
pub fn validate_prerequisites(
    registry: &GroupRegistry,
    facilities: &dyn FacilityDirectory,
    group: &SessionGroup,
) -> Acceptance {
    let Some(classroom) = registry.classroom(group.classroom) else {
        return RejectReason::FixtureMissing.into();
    };
    if !facilities.fixture_usable(classroom.fixture) {
        return RejectReason::FixtureMissing.into();
    }
    let Some(site) = facilities.fixture_site(classroom.fixture) else {
        return RejectReason::FixtureMissing.into();
    };

    let present = group.subject.available_stations(facilities, classroom.fixture);
    if present < group.students.len() {
        return RejectReason::NotEnoughStations {
            kind: group.subject.station_kind(),
            needed: group.students.len(),
            present,
        }
        .into();
    }

    if facilities.signal_devices(site).is_empty() {
        return RejectReason::NoSignalDevice.into();
    }
    Acceptance::Accepted
}

/// Full ongoing check: prerequisites plus participant placement and
/// eligibility. Students inside a transported sub-location of the site are
/// tolerated (`site_of` reports the source site for them).
pub fn validate_session_status(
    registry: &GroupRegistry,
    agents: &dyn AgentDirectory,
    facilities: &dyn FacilityDirectory,
    group: &SessionGroup,
) -> Acceptance {
    let prerequisites = validate_prerequisites(registry, facilities, group);
    if !prerequisites.accepted() {
        return prerequisites;
    }
    let Some(classroom) = registry.classroom(group.classroom) else {
        return RejectReason::FixtureMissing.into();
    };
    let Some(site) = facilities.fixture_site(classroom.fixture) else {
        return RejectReason::FixtureMissing.into();
    };

    if agents.site_of(group.teacher) != Some(site) {
        return RejectReason::TeacherOffSite.into();
    }
    if !agents.can_reach(group.teacher, classroom.fixture) {
        return RejectReason::FixtureMissing.into();
    }
    let teacher_report =
        role_eligibility(registry, agents, group, group.teacher, RoleId::Teacher);
    if !teacher_report.accepted() {
        return teacher_report;
    }

    if group.students.is_empty() {
        return RejectReason::NoStudents.into();
    }
    let mut off_site = 0usize;
    let mut unqualified = 0usize;
    for student in &group.students {
        if agents.site_of(*student) != Some(site) {
            off_site += 1;
            continue;
        }
        if !role_eligibility(registry, agents, group, *student, RoleId::Student).accepted() {
            unqualified += 1;
        }
    }
    if off_site > 0 {
        return RejectReason::StudentsOffSite.into();
    }
    if unqualified > 0 {
        return RejectReason::StudentsUnqualified.into();
    }
    Acceptance::Accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use classworks_core::testing::{MockAgents, MockFacilities};
    use classworks_core::{GroupId, ScheduleWindow, SessionGroup, SkillId, StationKind, Subject};

    struct Fixture {
        agents: MockAgents,
        facilities: MockFacilities,
        registry: GroupRegistry,
        group: SessionGroup,
    }

    fn fixture() -> Fixture {
        let mut agents = MockAgents::new();
        let mut facilities = MockFacilities::new(agents.site());
        facilities.add_stations(StationKind::Desk, 2);
        facilities.add_device(true, true);

        let mut registry = GroupRegistry::new();
        let classroom = registry.add_classroom("room", facilities.fixture());

        let teacher = agents.add_adult("teacher");
        agents.set_skill(teacher, SkillId::Medicine, 9.0);
        let students = vec![agents.add_child("a"), agents.add_child("b")];
        let group = SessionGroup::new(
            GroupId(0),
            "Field medicine",
            teacher,
            students,
            Subject::skill(SkillId::Medicine),
            2000.0,
            ScheduleWindow::new(9, 11),
            classroom,
        );
        Fixture {
            agents,
            facilities,
            registry,
            group,
        }
    }

    #[test]
    fn test_healthy_setup_passes() {
        let fixture = fixture();
        let report = validate_session_status(
            &fixture.registry,
            &fixture.agents,
            &fixture.facilities,
            &fixture.group,
        );
        assert!(report.accepted());
    }

    #[test]
    fn test_missing_fixture_fails() {
        let mut fixture = fixture();
        fixture.facilities.destroy_fixture();
        let report = validate_prerequisites(&fixture.registry, &fixture.facilities, &fixture.group);
        assert_eq!(report.reason(), Some(&RejectReason::FixtureMissing));
    }

    #[test]
    fn test_too_few_stations_fails_with_counts() {
        let mut fixture = fixture();
        fixture.group.add_student(fixture.agents.add_child("c"));
        let report = validate_prerequisites(&fixture.registry, &fixture.facilities, &fixture.group);
        match report.reason() {
            Some(RejectReason::NotEnoughStations { needed, present, .. }) => {
                assert_eq!((*needed, *present), (3, 2));
            }
            other => panic!("expected station shortage, got {other:?}"),
        }
    }

    #[test]
    fn test_no_signal_device_fails() {
        let mut agents = MockAgents::new();
        let mut facilities = MockFacilities::new(agents.site());
        facilities.add_stations(StationKind::Desk, 1);
        let mut registry = GroupRegistry::new();
        let classroom = registry.add_classroom("room", facilities.fixture());
        let group = SessionGroup::new(
            GroupId(0),
            "quiet room",
            agents.add_adult("t"),
            vec![agents.add_child("s")],
            Subject::childcare(),
            0.0,
            ScheduleWindow::new(8, 9),
            classroom,
        );
        let report = validate_prerequisites(&registry, &facilities, &group);
        assert_eq!(report.reason(), Some(&RejectReason::NoSignalDevice));
    }

    #[test]
    fn test_off_site_student_fails() {
        let mut fixture = fixture();
        fixture.agents.send_off_site(fixture.group.students[0]);
        let report = validate_session_status(
            &fixture.registry,
            &fixture.agents,
            &fixture.facilities,
            &fixture.group,
        );
        assert_eq!(report.reason(), Some(&RejectReason::StudentsOffSite));
    }
}
