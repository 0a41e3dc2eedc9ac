//! Concurrency test: parallel readers and writers on one registry.
//!
//! Validates that operations are atomic with respect to each other and
//! that readers never observe a half-applied mutation.

use std::collections::HashSet;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use medblock_registry::{
    AccessLevel, FileBackend, IdentityId, Principal, RegistryConfig, RegistryError,
    RegistryService,
};

fn shared_registry() -> Arc<RegistryService> {
    Arc::new(RegistryService::new(RegistryConfig::default()))
}

#[test]
fn stress_concurrent_registrations_get_unique_ids() {
    let registry = shared_registry();
    let ids = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for thread_id in 0..16 {
        let registry = Arc::clone(&registry);
        let ids = Arc::clone(&ids);
        handles.push(thread::spawn(move || {
            for i in 0..50 {
                let id = if i % 2 == 0 {
                    registry
                        .add_patient(&Principal::Anonymous, &format!("p-{thread_id}-{i}"), 40)
                        .expect("registration should succeed")
                } else {
                    registry
                        .add_doctor(&Principal::Anonymous, &format!("d-{thread_id}-{i}"))
                        .expect("registration should succeed")
                };
                ids.lock().unwrap().push(id);
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let ids = ids.lock().unwrap();
    assert_eq!(ids.len(), 800);
    let unique: HashSet<&IdentityId> = ids.iter().collect();
    assert_eq!(unique.len(), 800, "ids must never repeat");

    let stats = registry.stats().unwrap();
    assert_eq!(stats.patients, 400);
    assert_eq!(stats.active_doctors, 400);
    assert_eq!(stats.events, 800);
    registry.verify_ledger().unwrap();
}

#[test]
fn stress_readers_never_see_torn_grant_state() {
    let registry = shared_registry();
    let alice = registry
        .add_patient(&Principal::Anonymous, "Alice", 30)
        .unwrap();
    let doctors: Vec<IdentityId> = (0..8)
        .map(|i| {
            registry
                .add_doctor(&Principal::Anonymous, &format!("Dr. {i}"))
                .unwrap()
        })
        .collect();

    let barrier = Arc::new(Barrier::new(5));
    let mut handles = Vec::new();

    // One writer toggles every doctor's grant on and off
    {
        let registry = Arc::clone(&registry);
        let barrier = Arc::clone(&barrier);
        let alice = alice.clone();
        let doctors = doctors.clone();
        handles.push(thread::spawn(move || {
            let as_alice = Principal::Patient(alice.clone());
            barrier.wait();
            for round in 0..200 {
                for doctor in &doctors {
                    if round % 2 == 0 {
                        registry
                            .give_access(&as_alice, doctor, &alice, AccessLevel::Read)
                            .unwrap();
                    } else {
                        registry.revoke_access(&as_alice, doctor, &alice).unwrap();
                    }
                }
            }
        }));
    }

    // Readers check both indexes agree at every observation
    for _ in 0..4 {
        let registry = Arc::clone(&registry);
        let barrier = Arc::clone(&barrier);
        let alice = alice.clone();
        let doctors = doctors.clone();
        handles.push(thread::spawn(move || {
            let as_alice = Principal::Patient(alice.clone());
            barrier.wait();
            for i in 0..500 {
                registry.check_consistency().unwrap();
                let connected = registry.connected_doctors(&as_alice).unwrap();
                assert!(connected.len() <= doctors.len());

                let doctor = &doctors[i % doctors.len()];
                let as_doctor = Principal::Doctor(doctor.clone());
                match registry.get_patient_data(&as_doctor, &alice) {
                    Ok(record) => assert_eq!(record.name, "Alice"),
                    Err(RegistryError::Denied(_)) => {}
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    // 200 rounds end on a revoke round
    assert_eq!(
        registry
            .doctors_connected(&Principal::Patient(alice))
            .unwrap(),
        0
    );
    registry.check_consistency().unwrap();
    registry.verify_ledger().unwrap();
}

#[test]
fn stress_removal_races_with_grants() {
    let registry = shared_registry();
    let patients: Vec<IdentityId> = (0..20)
        .map(|i| {
            registry
                .add_patient(&Principal::Anonymous, &format!("patient-{i}"), 30)
                .unwrap()
        })
        .collect();
    let bob = registry.add_doctor(&Principal::Anonymous, "Dr. Bob").unwrap();

    let barrier = Arc::new(Barrier::new(patients.len() + 1));
    let mut handles = Vec::new();

    for patient in patients.clone() {
        let registry = Arc::clone(&registry);
        let barrier = Arc::clone(&barrier);
        let bob = bob.clone();
        handles.push(thread::spawn(move || {
            barrier.wait();
            let result = registry.give_access(
                &Principal::Patient(patient.clone()),
                &bob,
                &patient,
                AccessLevel::Read,
            );
            // Either lands before the removal (and is dropped by it) or
            // after it (and sees the doctor as gone).
            match result {
                Ok(()) | Err(RegistryError::NotFound(_)) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }));
    }

    {
        let registry = Arc::clone(&registry);
        let barrier = Arc::clone(&barrier);
        let bob = bob.clone();
        handles.push(thread::spawn(move || {
            barrier.wait();
            registry
                .remove_doctor(&Principal::Doctor(bob.clone()), &bob)
                .unwrap();
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    // No grant may outlive the doctor
    assert_eq!(registry.stats().unwrap().grants, 0);
    for patient in &patients {
        assert_eq!(
            registry
                .doctors_connected(&Principal::Patient(patient.clone()))
                .unwrap(),
            0
        );
    }
    registry.check_consistency().unwrap();
}

#[test]
fn stress_concurrent_writers_on_file_backend() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.json");
    let registry = Arc::new(
        RegistryService::open(RegistryConfig::default(), Box::new(FileBackend::new(&path)))
            .unwrap(),
    );

    let mut handles = Vec::new();
    for thread_id in 0..8 {
        let registry = Arc::clone(&registry);
        handles.push(thread::spawn(move || {
            for i in 0..10 {
                registry
                    .add_patient(&Principal::Anonymous, &format!("p-{thread_id}-{i}"), 50)
                    .unwrap();
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let reopened =
        RegistryService::open(RegistryConfig::default(), Box::new(FileBackend::new(&path)))
            .unwrap();
    let stats = reopened.stats().unwrap();
    assert_eq!(stats.patients, 80);
    assert_eq!(stats.revision, 80);
    reopened.verify_ledger().unwrap();
}
