use super::common::*;

use crate::scheduling::{
    DateRange, NewProfessional, NewShift, ProfessionalPatch, SchedulingError, ShiftPatch,
    DEFAULT_ACTOR,
};

fn ana() -> NewProfessional {
    NewProfessional {
        name: "Ana Souza".to_string(),
        role: "Técnica de enfermagem".to_string(),
        email: "ana@hospital.test".to_string(),
        phone: Some("+55 11 99999-0000".to_string()),
        active: true,
    }
}

#[test]
fn duplicate_email_is_a_conflict() {
    let fixture = Fixture::new();
    let registry = &fixture.services.registry;
    registry
        .register_professional(ana(), DEFAULT_ACTOR)
        .expect("first registration");

    let mut twin = ana();
    twin.email = "ANA@hospital.test".to_string();
    match registry.register_professional(twin, DEFAULT_ACTOR) {
        Err(SchedulingError::Conflict(message)) => assert!(message.contains("already registered")),
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[test]
fn update_and_deactivate_keep_the_record() {
    let fixture = Fixture::new();
    let registry = &fixture.services.registry;
    let professional = registry
        .register_professional(ana(), DEFAULT_ACTOR)
        .expect("register");

    let updated = registry
        .update_professional(
            professional.id,
            ProfessionalPatch {
                role: Some("Enfermeira".to_string()),
                ..ProfessionalPatch::default()
            },
            "rh",
        )
        .expect("update");
    assert_eq!(updated.role, "Enfermeira");
    assert_eq!(updated.email, professional.email);

    let deactivated = registry
        .deactivate_professional(professional.id, "rh")
        .expect("deactivate");
    assert!(!deactivated.active);
    assert!(matches!(
        registry.deactivate_professional(professional.id, "rh"),
        Err(SchedulingError::InvalidState(_))
    ));

    assert_eq!(registry.list_professionals(false).expect("list").len(), 1);
    assert!(registry.list_professionals(true).expect("list").is_empty());
    assert!(!registry
        .get_professional(professional.id)
        .expect("still readable")
        .active);

    let actions: Vec<_> = fixture
        .audit_log()
        .into_iter()
        .map(|entry| entry.action)
        .collect();
    assert_eq!(actions, vec!["deactivated", "updated", "created"]);
}

#[test]
fn shifts_need_distinct_start_and_end() {
    let fixture = Fixture::new();
    let result = fixture.services.registry.create_shift(
        NewShift {
            date: date("2025-07-01"),
            start: time("08:00"),
            end: time("08:00"),
            function_id: 1,
            location_id: 1,
        },
        DEFAULT_ACTOR,
    );
    assert!(matches!(result, Err(SchedulingError::Validation(_))));
}

#[test]
fn list_shifts_honours_the_window() {
    let fixture = Fixture::new();
    fixture.shift("2025-06-30", "08:00", "14:00");
    let tuesday = fixture.shift("2025-07-01", "19:00", "07:00");
    fixture.shift("2025-07-02", "08:00", "14:00");

    let shifts = fixture
        .services
        .registry
        .list_shifts(&DateRange::between(date("2025-07-01"), date("2025-07-01")))
        .expect("list");
    assert_eq!(shifts, vec![tuesday.clone()]);
    assert!(shifts[0].crosses_midnight());
    assert_eq!(
        fixture.services.registry.get_shift(tuesday.id).expect("get"),
        tuesday
    );
}

#[test]
fn lengthening_a_staffed_shift_rechecks_the_cap() {
    let fixture = Fixture::new();
    let p1 = fixture.professional("P1");
    fixture.book_36_hours(&p1);
    let shift = fixture.shift("2025-07-01", "08:00", "12:00");
    fixture.assign(&p1, &shift);

    let longer = ShiftPatch {
        end: Some(time("14:00")),
        ..ShiftPatch::default()
    };
    assert!(matches!(
        fixture
            .services
            .registry
            .update_shift(shift.id, longer, DEFAULT_ACTOR),
        Err(SchedulingError::CapacityExceeded { .. })
    ));

    let shorter = ShiftPatch {
        end: Some(time("11:00")),
        ..ShiftPatch::default()
    };
    let updated = fixture
        .services
        .registry
        .update_shift(shift.id, shorter, DEFAULT_ACTOR)
        .expect("shorter shift fits");
    assert_eq!(updated.duration_minutes(), 180);
}

#[test]
fn imports_skip_known_rows() {
    let fixture = Fixture::new();
    let registry = &fixture.services.registry;

    assert!(registry
        .import_professional(ana(), "import")
        .expect("import")
        .is_some());
    assert!(registry
        .import_professional(ana(), "import")
        .expect("import")
        .is_none());

    let new_shift = || NewShift {
        date: date("2025-07-01"),
        start: time("08:00"),
        end: time("14:00"),
        function_id: 2,
        location_id: 3,
    };
    assert!(registry
        .import_shift(new_shift(), "import")
        .expect("import")
        .is_some());
    assert!(registry
        .import_shift(new_shift(), "import")
        .expect("import")
        .is_none());
    assert_eq!(registry.list_shifts(&DateRange::all()).expect("list").len(), 1);
}

#[test]
fn far_future_shifts_are_rejected_everywhere() {
    let fixture = Fixture::new();
    let registry = &fixture.services.registry;
    let last_day = chrono::NaiveDate::MAX;
    let far = || NewShift {
        date: last_day,
        start: time("22:00"),
        end: time("06:00"),
        function_id: 1,
        location_id: 1,
    };

    assert!(matches!(
        registry.create_shift(far(), DEFAULT_ACTOR),
        Err(SchedulingError::Validation(_))
    ));
    assert!(matches!(
        registry.import_shift(far(), "import"),
        Err(SchedulingError::Validation(_))
    ));

    let shift = fixture.shift("2025-07-01", "08:00", "14:00");
    let moved = ShiftPatch {
        date: Some(last_day),
        ..ShiftPatch::default()
    };
    assert!(matches!(
        registry.update_shift(shift.id, moved, DEFAULT_ACTOR),
        Err(SchedulingError::Validation(_))
    ));
    assert_eq!(registry.get_shift(shift.id).expect("unchanged"), shift);
}
