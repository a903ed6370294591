use super::common::*;
use std::sync::Arc;

use crate::scheduling::{
    AssignmentStatus, AuditFilter, Decision, ProfessionalPatch, SchedulingError,
    SubstitutionStatus, DEFAULT_ACTOR,
};

#[test]
fn request_inside_lead_time_is_rejected_without_a_record() {
    let fixture = Fixture::new();
    let p1 = fixture.professional("P1");
    let p2 = fixture.professional("P2");
    let shift = fixture.shift("2025-07-01", "08:00", "14:00");
    let assignment = fixture.assign(&p1, &shift);

    let late = fixture.services_at(at("2025-07-01", "07:00"));
    match late
        .substitutions
        .request(&substitution(&assignment, &p1, &p2), DEFAULT_ACTOR)
    {
        Err(SchedulingError::LeadTimeViolation {
            shift_start,
            requested_at,
            lead_hours,
        }) => {
            assert_eq!(shift_start, at("2025-07-01", "08:00"));
            assert_eq!(requested_at, at("2025-07-01", "07:00"));
            assert_eq!(lead_hours, 12);
        }
        other => panic!("expected lead time violation, got {other:?}"),
    }

    assert!(fixture
        .services
        .substitutions
        .list(None)
        .expect("list")
        .is_empty());
}

#[test]
fn lead_time_boundary_is_exclusive() {
    let fixture = Fixture::new();
    let p1 = fixture.professional("P1");
    let p2 = fixture.professional("P2");
    let shift = fixture.shift("2025-07-01", "08:00", "14:00");
    let assignment = fixture.assign(&p1, &shift);
    let new = substitution(&assignment, &p1, &p2);

    let exactly_twelve = fixture.services_at(at("2025-06-30", "20:00"));
    assert!(matches!(
        exactly_twelve.substitutions.request(&new, DEFAULT_ACTOR),
        Err(SchedulingError::LeadTimeViolation { .. })
    ));

    let just_in_time = fixture.services_at(at("2025-06-30", "19:59"));
    let request = just_in_time
        .substitutions
        .request(&new, "P1")
        .expect("a minute earlier is accepted");
    assert_eq!(request.status, SubstitutionStatus::Pending);
    assert_eq!(request.reason.as_deref(), Some("consulta médica"));
    assert_eq!(request.decided_at, None);
}

#[test]
fn request_validates_people_and_assignment_state() {
    let fixture = Fixture::new();
    let p1 = fixture.professional("P1");
    let p2 = fixture.professional("P2");
    let shift = fixture.shift("2025-07-01", "08:00", "14:00");
    let assignment = fixture.assign(&p1, &shift);

    assert!(matches!(
        fixture
            .services
            .substitutions
            .request(&substitution(&assignment, &p1, &p1), DEFAULT_ACTOR),
        Err(SchedulingError::Validation(_))
    ));

    fixture
        .services
        .registry
        .deactivate_professional(p2.id, DEFAULT_ACTOR)
        .expect("deactivate");
    assert!(matches!(
        fixture
            .services
            .substitutions
            .request(&substitution(&assignment, &p1, &p2), DEFAULT_ACTOR),
        Err(SchedulingError::Validation(_))
    ));

    let p3 = fixture.professional("P3");
    fixture
        .services
        .assignments
        .cancel(assignment.id, DEFAULT_ACTOR)
        .expect("cancel");
    assert!(matches!(
        fixture
            .services
            .substitutions
            .request(&substitution(&assignment, &p1, &p3), DEFAULT_ACTOR),
        Err(SchedulingError::InvalidState(_))
    ));
}

#[test]
fn suggestions_skip_overlaps_and_rank_by_weekly_load() {
    let fixture = Fixture::new();
    let p1 = fixture.professional("P1");
    let p2 = fixture.professional("P2");
    let p3 = fixture.professional("P3");
    let p4 = fixture.professional("P4");
    let p5 = fixture.professional("P5");
    let p6 = fixture.professional("P6");
    let p7 = fixture.professional("P7");

    let target = fixture.shift("2025-07-01", "08:00", "14:00");
    let assignment = fixture.assign(&p1, &target);

    let monday_day = fixture.shift("2025-06-30", "07:00", "19:00");
    fixture.assign(&p2, &monday_day);
    // Spills into the target morning.
    let monday_night = fixture.shift("2025-06-30", "22:00", "09:00");
    fixture.assign(&p4, &monday_night);
    let wednesday = fixture.shift("2025-07-02", "08:00", "14:00");
    fixture.assign(&p5, &wednesday);
    fixture
        .services
        .registry
        .update_professional(
            p6.id,
            ProfessionalPatch {
                active: Some(false),
                ..ProfessionalPatch::default()
            },
            DEFAULT_ACTOR,
        )
        .expect("deactivate");

    let suggestions = fixture
        .services
        .substitutions
        .suggest(assignment.id, 3)
        .expect("suggestions");
    let ranked: Vec<_> = suggestions.iter().map(|c| c.professional_id).collect();
    assert_eq!(ranked, vec![p3.id, p7.id, p5.id]);

    let first = suggestions.iter().next().expect("one candidate");
    assert_eq!(first.weekly_minutes, 0);
    assert_eq!(
        suggestions.iter().nth(2).map(|c| c.weekly_minutes),
        Some(360)
    );

    let everyone: Vec<_> = fixture
        .services
        .substitutions
        .suggest(assignment.id, 10)
        .expect("suggestions")
        .iter()
        .map(|c| c.professional_id)
        .collect();
    assert_eq!(everyone, vec![p3.id, p7.id, p5.id, p2.id]);
}

#[test]
fn approval_swaps_the_assignment_and_audits_every_step() {
    let fixture = Fixture::new();
    let p1 = fixture.professional("P1");
    let p2 = fixture.professional("P2");
    let shift = fixture.shift("2025-07-01", "08:00", "14:00");
    let assignment = fixture.assign(&p1, &shift);
    let request = fixture
        .services
        .substitutions
        .request(&substitution(&assignment, &p1, &p2), "P1")
        .expect("request");

    let decided = fixture
        .services
        .substitutions
        .decide(request.id, Decision::Approved, "supervisor")
        .expect("approve");
    assert_eq!(decided.status, SubstitutionStatus::Approved);
    assert_eq!(decided.decided_at, Some(default_now()));

    let original = fixture
        .services
        .assignments
        .get(assignment.id)
        .expect("original row");
    assert_eq!(original.status, AssignmentStatus::Cancelled);

    let active = fixture.active_views(&shift);
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].professional_id, p2.id);

    let supervisor_actions: Vec<_> = fixture
        .services
        .audit
        .query(&AuditFilter {
            actor: Some("supervisor".to_string()),
            ..AuditFilter::default()
        })
        .expect("audit query")
        .into_iter()
        .map(|entry| format!("{}:{}", entry.entity, entry.action))
        .collect();
    assert_eq!(supervisor_actions.len(), 3);
    assert!(supervisor_actions.contains(&"assignment:cancelled".to_string()));
    assert!(supervisor_actions.contains(&"assignment:created".to_string()));
    assert!(supervisor_actions.contains(&"substitution:status_approved".to_string()));

    assert!(matches!(
        fixture
            .services
            .substitutions
            .decide(request.id, Decision::Rejected, "supervisor"),
        Err(SchedulingError::InvalidState(_))
    ));
}

#[test]
fn rejection_leaves_the_assignment_alone() {
    let fixture = Fixture::new();
    let p1 = fixture.professional("P1");
    let p2 = fixture.professional("P2");
    let shift = fixture.shift("2025-07-01", "08:00", "14:00");
    let assignment = fixture.assign(&p1, &shift);
    let request = fixture
        .services
        .substitutions
        .request(&substitution(&assignment, &p1, &p2), DEFAULT_ACTOR)
        .expect("request");

    let decided = fixture
        .services
        .substitutions
        .decide(request.id, Decision::Rejected, "supervisor")
        .expect("reject");
    assert_eq!(decided.status, SubstitutionStatus::Rejected);

    let active = fixture.active_views(&shift);
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, assignment.id);

    let rejected = fixture
        .services
        .substitutions
        .list(Some(SubstitutionStatus::Rejected))
        .expect("list");
    assert_eq!(rejected.len(), 1);
    assert!(fixture
        .services
        .substitutions
        .list(Some(SubstitutionStatus::Pending))
        .expect("list")
        .is_empty());
}

#[test]
fn approval_over_the_cap_rolls_back() {
    let fixture = Fixture::new();
    let p1 = fixture.professional("P1");
    let p2 = fixture.professional("P2");
    fixture.book_36_hours(&p2);
    let shift = fixture.shift("2025-07-01", "08:00", "14:00");
    let assignment = fixture.assign(&p1, &shift);
    let request = fixture
        .services
        .substitutions
        .request(&substitution(&assignment, &p1, &p2), DEFAULT_ACTOR)
        .expect("request");

    assert!(matches!(
        fixture
            .services
            .substitutions
            .decide(request.id, Decision::Approved, "supervisor"),
        Err(SchedulingError::CapacityExceeded { .. })
    ));

    let still_pending = fixture
        .services
        .substitutions
        .get(request.id)
        .expect("request");
    assert_eq!(still_pending.status, SubstitutionStatus::Pending);
    assert_eq!(fixture.active_views(&shift)[0].id, assignment.id);
}

#[test]
fn approval_is_atomic_under_injected_failure() {
    let fixture = Fixture::new();
    let p1 = fixture.professional("P1");
    let p2 = fixture.professional("P2");
    let shift = fixture.shift("2025-07-01", "08:00", "14:00");
    let assignment = fixture.assign(&p1, &shift);
    let request = fixture
        .services
        .substitutions
        .request(&substitution(&assignment, &p1, &p2), DEFAULT_ACTOR)
        .expect("request");
    let audit_before = fixture.audit_log().len();

    let faulty = Arc::new(FaultyStore::new(Arc::clone(&fixture.store)));
    faulty.arm();
    let services = services_at(Arc::clone(&faulty), default_now());

    match services
        .substitutions
        .decide(request.id, Decision::Approved, "supervisor")
    {
        Err(SchedulingError::Store(_)) => {}
        other => panic!("expected injected store failure, got {other:?}"),
    }

    let original = fixture
        .services
        .assignments
        .get(assignment.id)
        .expect("original row");
    assert_eq!(original.status, AssignmentStatus::Active);
    assert_eq!(
        fixture
            .services
            .substitutions
            .get(request.id)
            .expect("request")
            .status,
        SubstitutionStatus::Pending
    );
    assert_eq!(fixture.audit_log().len(), audit_before);
}
