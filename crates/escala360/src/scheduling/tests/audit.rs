use super::common::*;

use crate::scheduling::{AuditEntryId, AuditFilter, DateRange, SchedulingError, DEFAULT_ACTOR};

#[test]
fn every_mutation_leaves_a_trail_entry() {
    let fixture = Fixture::new();
    let p1 = fixture.professional("P1");
    let shift = fixture.shift("2025-07-01", "08:00", "14:00");
    let assignment = fixture.assign(&p1, &shift);
    fixture
        .services
        .assignments
        .cancel(assignment.id, "coordinator")
        .expect("cancel");

    let trail: Vec<_> = fixture
        .audit_log()
        .into_iter()
        .map(|entry| (entry.entity, entry.action, entry.actor))
        .collect();

    assert_eq!(
        trail,
        vec![
            (
                "assignment".to_string(),
                "cancelled".to_string(),
                "coordinator".to_string()
            ),
            (
                "assignment".to_string(),
                "created".to_string(),
                DEFAULT_ACTOR.to_string()
            ),
            (
                "shift".to_string(),
                "created".to_string(),
                DEFAULT_ACTOR.to_string()
            ),
            (
                "professional".to_string(),
                "created".to_string(),
                DEFAULT_ACTOR.to_string()
            ),
        ],
        "newest first"
    );
}

#[test]
fn rejected_operations_write_nothing() {
    let fixture = Fixture::new();
    let p1 = fixture.professional("P1");
    let p2 = fixture.professional("P2");
    let shift = fixture.shift("2025-07-01", "08:00", "14:00");
    fixture.assign(&p1, &shift);
    let before = fixture.audit_log().len();

    assert!(fixture
        .services
        .assignments
        .create(p2.id, shift.id, DEFAULT_ACTOR)
        .is_err());
    assert_eq!(fixture.audit_log().len(), before);
}

#[test]
fn query_filters_by_substring_and_day() {
    let fixture = Fixture::new();
    let p1 = fixture.professional("P1");
    let shift = fixture.shift("2025-07-01", "08:00", "14:00");

    let later = fixture.services_at(at("2025-06-22", "23:59"));
    later
        .assignments
        .create(p1.id, shift.id, "Maria Supervisora")
        .expect("assign");

    let by_actor = fixture
        .services
        .audit
        .query(&AuditFilter {
            actor: Some("supervisora".to_string()),
            ..AuditFilter::default()
        })
        .expect("query");
    assert_eq!(by_actor.len(), 1);
    assert_eq!(by_actor[0].entity, "assignment");

    let by_entity = fixture
        .services
        .audit
        .query(&AuditFilter {
            entity: Some("ASSIGN".to_string()),
            ..AuditFilter::default()
        })
        .expect("query");
    assert_eq!(by_entity.len(), 1);

    let on_the_22nd = fixture
        .services
        .audit
        .query(&AuditFilter {
            range: DateRange::between(date("2025-06-22"), date("2025-06-22")),
            ..AuditFilter::default()
        })
        .expect("query");
    assert_eq!(on_the_22nd.len(), 1, "'to' covers the whole day");

    let before_the_22nd = fixture
        .services
        .audit
        .query(&AuditFilter {
            range: DateRange {
                from: None,
                to: Some(date("2025-06-21")),
            },
            ..AuditFilter::default()
        })
        .expect("query");
    assert_eq!(before_the_22nd.len(), 2);
}

#[test]
fn wildcard_characters_in_filters_match_literally() {
    let fixture = Fixture::new();
    let p1 = fixture.professional("P1");
    let shift = fixture.shift("2025-07-01", "08:00", "14:00");
    fixture
        .services
        .assignments
        .create(p1.id, shift.id, "plantao_noturno")
        .expect("assign");

    let actors = |needle: &str| {
        fixture
            .services
            .audit
            .query(&AuditFilter {
                actor: Some(needle.to_string()),
                ..AuditFilter::default()
            })
            .expect("query")
            .into_iter()
            .map(|entry| entry.actor)
            .collect::<Vec<_>>()
    };

    assert_eq!(actors("_"), vec!["plantao_noturno".to_string()]);
    assert!(actors("%").is_empty());
    assert!(actors("\\").is_empty());
    assert!(actors("plantao_n%").is_empty());
    assert_eq!(actors("O_N").len(), 1);

    let by_entity = fixture
        .services
        .audit
        .query(&AuditFilter {
            entity: Some("%".to_string()),
            ..AuditFilter::default()
        })
        .expect("query");
    assert!(by_entity.is_empty());
}

#[test]
fn inverted_range_is_a_validation_error() {
    let fixture = Fixture::new();
    assert!(matches!(
        fixture.services.audit.query(&AuditFilter {
            range: DateRange::between(date("2025-07-02"), date("2025-07-01")),
            ..AuditFilter::default()
        }),
        Err(SchedulingError::Validation(_))
    ));
}

#[test]
fn get_and_summary_reflect_the_trail() {
    let fixture = Fixture::new();
    let p1 = fixture.professional("P1");
    fixture.professional("P2");
    let shift = fixture.shift("2025-07-01", "08:00", "14:00");
    fixture.assign(&p1, &shift);

    let newest = fixture.audit_log().remove(0);
    let fetched = fixture
        .services
        .audit
        .get(newest.id)
        .expect("entry exists");
    assert_eq!(fetched, newest);
    assert!(matches!(
        fixture.services.audit.get(AuditEntryId(9_999)),
        Err(SchedulingError::NotFound { .. })
    ));

    let summary = fixture.services.audit.summary().expect("summary");
    assert_eq!(summary.total_records, 4);
    assert_eq!(summary.distinct_entities, 3);
    let professional_created = summary
        .breakdown
        .iter()
        .find(|count| count.entity == "professional" && count.action == "created")
        .expect("professional rows");
    assert_eq!(professional_created.total, 2);
}
