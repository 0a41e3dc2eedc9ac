//! Stress test: grant indexes under random operation sequences.
//!
//! Drives the registry with seeded random give/change/revoke/remove
//! sequences and cross-checks every answer against a plain reference map.

use std::collections::{BTreeSet, HashMap};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use medblock_registry::{
    AccessLevel, IdentityId, IdentityStore, Principal, RegistryConfig, RegistryService,
    RelationshipGraph,
};

const LEVELS: [AccessLevel; 3] = [AccessLevel::None, AccessLevel::Read, AccessLevel::ReadWrite];

fn cross_check(
    graph: &RelationshipGraph,
    model: &HashMap<(IdentityId, IdentityId), AccessLevel>,
    doctors: &[IdentityId],
    patients: &[IdentityId],
) {
    graph.check_consistency().expect("indexes should agree");
    assert_eq!(graph.len(), model.len());

    for doctor in doctors {
        let expected: BTreeSet<IdentityId> = model
            .keys()
            .filter(|(d, _)| d == doctor)
            .map(|(_, p)| p.clone())
            .collect();
        assert_eq!(graph.patients_of(doctor), expected, "patients of {doctor}");
    }
    for patient in patients {
        let expected: BTreeSet<IdentityId> = model
            .keys()
            .filter(|(_, p)| p == patient)
            .map(|(d, _)| d.clone())
            .collect();
        assert_eq!(graph.doctors_of(patient), expected, "doctors of {patient}");
    }
    for ((doctor, patient), level) in model {
        assert_eq!(graph.level_for(doctor, patient), *level);
    }
}

#[test]
fn stress_random_graph_operations_keep_indexes_consistent() {
    let mut rng = StdRng::seed_from_u64(0x6d65_6462);
    let mut store = IdentityStore::new();
    let patients: Vec<IdentityId> = (0..20)
        .map(|i| store.add_patient(&format!("patient-{i}"), 20 + i).unwrap())
        .collect();
    let mut doctors: Vec<IdentityId> = (0..10)
        .map(|i| store.add_doctor(&format!("doctor-{i}")).unwrap())
        .collect();

    let mut graph = RelationshipGraph::new();
    let mut model: HashMap<(IdentityId, IdentityId), AccessLevel> = HashMap::new();

    for step in 0..5_000 {
        if doctors.is_empty() {
            break;
        }
        let doctor = doctors[rng.gen_range(0..doctors.len())].clone();
        let patient = patients[rng.gen_range(0..patients.len())].clone();

        match rng.gen_range(0..100) {
            0..=59 => {
                let level = LEVELS[rng.gen_range(0..LEVELS.len())];
                let previous = graph
                    .upsert_grant(&store, &doctor, &patient, level)
                    .unwrap();
                let key = (doctor, patient);
                let expected_previous = model.get(&key).copied().unwrap_or_default();
                assert_eq!(previous, expected_previous, "step {step}");
                if level == AccessLevel::None {
                    model.remove(&key);
                } else {
                    model.insert(key, level);
                }
            }
            60..=97 => {
                let removed = graph.remove_grant(&doctor, &patient);
                assert_eq!(removed, model.remove(&(doctor, patient)).is_some());
            }
            _ => {
                let mut dropped = graph.remove_all_grants_for_doctor(&doctor);
                store.remove_doctor(&doctor).unwrap();
                let mut expected: Vec<IdentityId> = model
                    .keys()
                    .filter(|(d, _)| d == &doctor)
                    .map(|(_, p)| p.clone())
                    .collect();
                model.retain(|(d, _), _| d != &doctor);
                dropped.sort();
                expected.sort();
                assert_eq!(dropped, expected);
                doctors.retain(|d| d != &doctor);
            }
        }

        if step % 250 == 0 {
            cross_check(&graph, &model, &doctors, &patients);
        }
    }

    cross_check(&graph, &model, &doctors, &patients);
}

#[test]
fn stress_random_service_operations_keep_indexes_consistent() {
    let mut rng = StdRng::seed_from_u64(42);
    let registry = RegistryService::new(RegistryConfig {
        admin_enabled: true,
        ..RegistryConfig::default()
    });

    let patients: Vec<IdentityId> = (0..12)
        .map(|i| {
            registry
                .add_patient(&Principal::Anonymous, &format!("patient-{i}"), 30)
                .unwrap()
        })
        .collect();
    let mut doctors: Vec<IdentityId> = (0..6)
        .map(|i| {
            registry
                .add_doctor(&Principal::Anonymous, &format!("doctor-{i}"))
                .unwrap()
        })
        .collect();

    let mut model: HashMap<(IdentityId, IdentityId), AccessLevel> = HashMap::new();

    for _ in 0..1_500 {
        if doctors.is_empty() {
            break;
        }
        let doctor = doctors[rng.gen_range(0..doctors.len())].clone();
        let patient = patients[rng.gen_range(0..patients.len())].clone();
        let as_patient = Principal::Patient(patient.clone());

        match rng.gen_range(0..100) {
            0..=54 => {
                let level = LEVELS[rng.gen_range(1..LEVELS.len())];
                registry
                    .give_access(&as_patient, &doctor, &patient, level)
                    .unwrap();
                model.insert((doctor, patient), level);
            }
            55..=79 => {
                registry
                    .change_access(&as_patient, &doctor, &patient, AccessLevel::None)
                    .unwrap();
                model.remove(&(doctor, patient));
            }
            80..=98 => {
                let revoked = registry
                    .revoke_access(&as_patient, &doctor, &patient)
                    .unwrap();
                assert_eq!(revoked, model.remove(&(doctor, patient)).is_some());
            }
            _ => {
                registry
                    .remove_doctor(&Principal::Doctor(doctor.clone()), &doctor)
                    .unwrap();
                model.retain(|(d, _), _| d != &doctor);
                doctors.retain(|d| d != &doctor);
            }
        }
    }

    registry.check_consistency().unwrap();
    registry.verify_ledger().unwrap();
    assert_eq!(registry.stats().unwrap().grants, model.len());

    for ((doctor, patient), level) in &model {
        let seen = registry
            .access_level(&Principal::Admin, doctor, patient)
            .unwrap();
        assert_eq!(seen, *level);
        let readable = registry
            .get_patient_data(&Principal::Doctor(doctor.clone()), patient)
            .is_ok();
        assert!(readable, "{doctor} should read {patient} at {level}");
    }

    for patient in &patients {
        let expected = model.keys().filter(|(_, p)| p == patient).count();
        assert_eq!(
            registry
                .doctors_connected(&Principal::Patient(patient.clone()))
                .unwrap(),
            expected
        );
    }
}
