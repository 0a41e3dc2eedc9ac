//! Scale test: thousands of identities and grants.
//!
//! Validates that grant lookups and doctor removal stay correct when the
//! graph is large and heavily connected, and that a write costs the same
//! on a large registry as on an empty one.

use std::time::{Duration, Instant};

use medblock_registry::{AccessLevel, IdentityId, Principal, RegistryConfig, RegistryService};

#[test]
fn stress_1000_patients_8_doctors_full_mesh() {
    let registry = RegistryService::new(RegistryConfig::default());

    let patients: Vec<IdentityId> = (0..1_000)
        .map(|i| {
            registry
                .add_patient(&Principal::Anonymous, &format!("patient-{i}"), i % 120)
                .unwrap()
        })
        .collect();
    let doctors: Vec<IdentityId> = (0..8)
        .map(|i| {
            registry
                .add_doctor(&Principal::Anonymous, &format!("doctor-{i}"))
                .unwrap()
        })
        .collect();

    for (i, patient) in patients.iter().enumerate() {
        let as_patient = Principal::Patient(patient.clone());
        for (j, doctor) in doctors.iter().enumerate() {
            let level = if (i + j) % 3 == 0 {
                AccessLevel::ReadWrite
            } else {
                AccessLevel::Read
            };
            registry
                .give_access(&as_patient, doctor, patient, level)
                .unwrap();
        }
    }

    let stats = registry.stats().unwrap();
    assert_eq!(stats.grants, 8_000);
    registry.check_consistency().unwrap();

    for doctor in &doctors {
        assert_eq!(
            registry
                .patients_connected(&Principal::Doctor(doctor.clone()))
                .unwrap(),
            1_000
        );
    }

    // Remove half the doctors; their grants must all disappear
    for doctor in doctors.iter().take(4) {
        registry
            .remove_doctor(&Principal::Doctor(doctor.clone()), doctor)
            .unwrap();
    }
    assert_eq!(registry.stats().unwrap().grants, 4_000);
    for patient in patients.iter().step_by(37) {
        assert_eq!(
            registry
                .doctors_connected(&Principal::Patient(patient.clone()))
                .unwrap(),
            4
        );
    }
    registry.check_consistency().unwrap();
    registry.verify_ledger().unwrap();
}

#[test]
fn stress_long_ledger_verifies() {
    let registry = RegistryService::new(RegistryConfig {
        admin_enabled: true,
        ..RegistryConfig::default()
    });
    let alice = registry
        .add_patient(&Principal::Anonymous, "Alice", 30)
        .unwrap();
    let bob = registry.add_doctor(&Principal::Anonymous, "Dr. Bob").unwrap();
    let as_alice = Principal::Patient(alice.clone());

    for i in 0..1_000 {
        let level = if i % 2 == 0 {
            AccessLevel::Read
        } else {
            AccessLevel::ReadWrite
        };
        registry.change_access(&as_alice, &bob, &alice, level).unwrap();
    }

    registry.verify_ledger().unwrap();
    let events = registry.events(&Principal::Admin, 0).unwrap();
    assert_eq!(events.len(), 1_002);
    assert_eq!(registry.events(&Principal::Admin, 1_000).unwrap().len(), 2);
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.sequence, i as u64 + 1);
    }
}

#[test]
fn stress_write_cost_flat_as_registry_grows() {
    let registry = RegistryService::new(RegistryConfig::default());
    let add_batch = |offset: usize| {
        let start = Instant::now();
        for i in offset..offset + 1_000 {
            registry
                .add_patient(&Principal::Anonymous, &format!("patient-{i}"), 40)
                .unwrap();
        }
        start.elapsed()
    };

    let first = add_batch(0);
    for round in 1..20 {
        add_batch(round * 1_000);
    }
    let late = add_batch(20_000);

    // A write that copied the registry would be ~20x slower by now
    let bound = first.max(Duration::from_millis(50)) * 6;
    assert!(
        late <= bound,
        "1000 writes took {late:?} at 20k patients vs {first:?} on an empty registry"
    );
    assert_eq!(registry.stats().unwrap().patients, 21_000);
}
