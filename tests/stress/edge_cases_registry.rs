//! Edge case tests: input validation, idempotent revocation, self-grants,
//! removed doctors, wrong-kind ids, and no-op commits.

use medblock_registry::{
    AccessLevel, ErrorKind, IdentityId, Principal, RegistryConfig, RegistryError,
    RegistryService,
};

fn registry() -> RegistryService {
    RegistryService::new(RegistryConfig::default())
}

// === Input validation ===

#[test]
fn edge_empty_and_whitespace_names_rejected() {
    let registry = registry();
    for name in ["", "   ", "\t\n"] {
        let err = registry
            .add_patient(&Principal::Anonymous, name, 30)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput, "name {name:?}");
        let err = registry.add_doctor(&Principal::Anonymous, name).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput, "name {name:?}");
    }
    assert_eq!(registry.stats().unwrap().events, 0);
}

#[test]
fn edge_negative_and_oversized_ages_rejected() {
    let registry = registry();
    assert!(matches!(
        registry.add_patient(&Principal::Anonymous, "Alice", -1),
        Err(RegistryError::InvalidInput(_))
    ));
    assert!(matches!(
        registry.add_patient(&Principal::Anonymous, "Alice", i64::from(u32::MAX) + 1),
        Err(RegistryError::InvalidInput(_))
    ));
    let id = registry
        .add_patient(&Principal::Anonymous, "Newborn", 0)
        .unwrap();
    assert_eq!(
        registry
            .get_patient_data(&Principal::Patient(id.clone()), &id)
            .unwrap()
            .age,
        0
    );
}

#[test]
fn edge_name_length_limit_counts_characters() {
    let registry = RegistryService::new(RegistryConfig {
        max_name_len: 4,
        ..RegistryConfig::default()
    });
    // Four characters, more than four bytes
    registry
        .add_patient(&Principal::Anonymous, "Zoë!", 30)
        .unwrap();
    assert!(matches!(
        registry.add_patient(&Principal::Anonymous, "Zoëy!", 30),
        Err(RegistryError::InvalidInput(_))
    ));
}

#[test]
fn edge_invalid_update_changes_nothing() {
    let registry = registry();
    let alice = registry
        .add_patient(&Principal::Anonymous, "Alice", 30)
        .unwrap();
    let as_alice = Principal::Patient(alice.clone());
    let before = registry.stats().unwrap();

    // A valid name with an invalid age must not half-apply
    assert!(registry
        .update_patient_data(&as_alice, &alice, Some("Alicia"), Some(-5))
        .is_err());
    let record = registry.get_patient_data(&as_alice, &alice).unwrap();
    assert_eq!(record.name, "Alice");
    assert_eq!(record.age, 30);
    assert_eq!(registry.stats().unwrap(), before);
}

// === Grants ===

#[test]
fn edge_revoke_missing_grant_is_noop() {
    let registry = registry();
    let alice = registry
        .add_patient(&Principal::Anonymous, "Alice", 30)
        .unwrap();
    let bob = registry.add_doctor(&Principal::Anonymous, "Dr. Bob").unwrap();
    let as_alice = Principal::Patient(alice.clone());
    let before = registry.stats().unwrap();

    assert!(!registry.revoke_access(&as_alice, &bob, &alice).unwrap());
    assert!(!registry.revoke_access(&as_alice, &bob, &alice).unwrap());
    assert_eq!(registry.stats().unwrap(), before);

    registry
        .give_access(&as_alice, &bob, &alice, AccessLevel::Read)
        .unwrap();
    assert!(registry.revoke_access(&as_alice, &bob, &alice).unwrap());
    assert!(!registry.revoke_access(&as_alice, &bob, &alice).unwrap());
}

#[test]
fn edge_give_access_twice_replaces_level() {
    let registry = registry();
    let alice = registry
        .add_patient(&Principal::Anonymous, "Alice", 30)
        .unwrap();
    let bob = registry.add_doctor(&Principal::Anonymous, "Dr. Bob").unwrap();
    let as_alice = Principal::Patient(alice.clone());

    registry
        .give_access(&as_alice, &bob, &alice, AccessLevel::ReadWrite)
        .unwrap();
    registry
        .give_access(&as_alice, &bob, &alice, AccessLevel::Read)
        .unwrap();

    assert_eq!(
        registry.access_level(&as_alice, &bob, &alice).unwrap(),
        AccessLevel::Read
    );
    assert_eq!(registry.stats().unwrap().grants, 1);
    assert_eq!(registry.doctors_connected(&as_alice).unwrap(), 1);
}

#[test]
fn edge_give_access_none_on_missing_grant_commits_nothing() {
    let registry = registry();
    let alice = registry
        .add_patient(&Principal::Anonymous, "Alice", 30)
        .unwrap();
    let bob = registry.add_doctor(&Principal::Anonymous, "Dr. Bob").unwrap();
    let before = registry.stats().unwrap();

    registry
        .give_access(
            &Principal::Patient(alice.clone()),
            &bob,
            &alice,
            AccessLevel::None,
        )
        .unwrap();
    assert_eq!(registry.stats().unwrap(), before);
}

#[test]
fn edge_swapped_ids_are_not_found() {
    let registry = registry();
    let alice = registry
        .add_patient(&Principal::Anonymous, "Alice", 30)
        .unwrap();
    let bob = registry.add_doctor(&Principal::Anonymous, "Dr. Bob").unwrap();

    // Doctor and patient arguments swapped
    let result = registry.give_access(
        &Principal::Patient(alice.clone()),
        &alice,
        &bob,
        AccessLevel::Read,
    );
    assert!(matches!(result, Err(RegistryError::NotFound(_))));

    // A patient id used as a doctor principal
    let result = registry.get_patient_data(&Principal::Doctor(alice.clone()), &alice);
    assert!(matches!(result, Err(RegistryError::NotFound(_))));
}

#[test]
fn edge_patient_cannot_manage_other_patients_grants() {
    let registry = registry();
    let alice = registry
        .add_patient(&Principal::Anonymous, "Alice", 30)
        .unwrap();
    let mallory = registry
        .add_patient(&Principal::Anonymous, "Mallory", 35)
        .unwrap();
    let bob = registry.add_doctor(&Principal::Anonymous, "Dr. Bob").unwrap();
    let as_alice = Principal::Patient(alice.clone());

    registry
        .give_access(&as_alice, &bob, &alice, AccessLevel::Read)
        .unwrap();

    let as_mallory = Principal::Patient(mallory);
    assert!(matches!(
        registry.revoke_access(&as_mallory, &bob, &alice),
        Err(RegistryError::Denied(_))
    ));
    assert!(matches!(
        registry.change_access(&as_mallory, &bob, &alice, AccessLevel::ReadWrite),
        Err(RegistryError::Denied(_))
    ));
    assert!(matches!(
        registry.access_level(&as_mallory, &bob, &alice),
        Err(RegistryError::Denied(_))
    ));
    assert_eq!(
        registry.access_level(&as_alice, &bob, &alice).unwrap(),
        AccessLevel::Read
    );
}

// === Doctor removal ===

#[test]
fn edge_remove_doctor_twice() {
    let registry = registry();
    let bob = registry.add_doctor(&Principal::Anonymous, "Dr. Bob").unwrap();
    let as_bob = Principal::Doctor(bob.clone());

    registry.remove_doctor(&as_bob, &bob).unwrap();
    assert!(matches!(
        registry.remove_doctor(&as_bob, &bob),
        Err(RegistryError::NotFound(_))
    ));
}

#[test]
fn edge_patient_cannot_remove_doctor() {
    let registry = registry();
    let alice = registry
        .add_patient(&Principal::Anonymous, "Alice", 30)
        .unwrap();
    let bob = registry.add_doctor(&Principal::Anonymous, "Dr. Bob").unwrap();
    let dana = registry.add_doctor(&Principal::Anonymous, "Dr. Dana").unwrap();

    assert!(matches!(
        registry.remove_doctor(&Principal::Patient(alice), &bob),
        Err(RegistryError::Denied(_))
    ));
    assert!(matches!(
        registry.remove_doctor(&Principal::Doctor(dana), &bob),
        Err(RegistryError::Denied(_))
    ));
    assert_eq!(registry.stats().unwrap().active_doctors, 2);
}

#[test]
fn edge_removed_doctor_id_is_never_reused() {
    let registry = registry();
    let bob = registry.add_doctor(&Principal::Anonymous, "Dr. Bob").unwrap();
    registry
        .remove_doctor(&Principal::Doctor(bob.clone()), &bob)
        .unwrap();

    for i in 0..200 {
        let id = registry
            .add_doctor(&Principal::Anonymous, &format!("Dr. {i}"))
            .unwrap();
        assert_ne!(id, bob);
    }
}

// === Dashboards ===

#[test]
fn edge_dashboards_require_matching_kind() {
    let registry = registry();
    let alice = registry
        .add_patient(&Principal::Anonymous, "Alice", 30)
        .unwrap();
    let bob = registry.add_doctor(&Principal::Anonymous, "Dr. Bob").unwrap();

    assert!(matches!(
        registry.connected_patients(&Principal::Patient(alice.clone())),
        Err(RegistryError::Denied(_))
    ));
    assert!(matches!(
        registry.connected_doctors(&Principal::Doctor(bob.clone())),
        Err(RegistryError::Denied(_))
    ));
    assert!(matches!(
        registry.connected_doctors(&Principal::Anonymous),
        Err(RegistryError::Denied(_))
    ));
    assert_eq!(
        registry
            .doctors_connected(&Principal::Patient(alice))
            .unwrap(),
        0
    );
    assert_eq!(
        registry.patients_connected(&Principal::Doctor(bob)).unwrap(),
        0
    );
}

#[test]
fn edge_unknown_ids_are_not_found() {
    let registry = registry();
    let alice = registry
        .add_patient(&Principal::Anonymous, "Alice", 30)
        .unwrap();
    let as_alice = Principal::Patient(alice.clone());

    let err = registry
        .get_patient_data(&as_alice, &IdentityId::from("pat_nobody"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = registry
        .give_access(
            &as_alice,
            &IdentityId::from("doc_nobody"),
            &alice,
            AccessLevel::Read,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
