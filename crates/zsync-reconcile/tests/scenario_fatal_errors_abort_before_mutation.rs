mod support;

use std::collections::BTreeSet;

use support::*;
use zsync_reconcile::*;

fn policy() -> ProtectionPolicy {
    ProtectionPolicy::for_service_account("svc-sync", Vec::<String>::new())
}

#[test]
fn empty_directory_never_reaches_the_target() {
    let mut source = FixedDirectory::members(&[]);
    let mut target = MemoryTarget::with_accounts(&[("alice", "1"), ("bob", "2")]);

    let err = run_sync(
        &mut source,
        &mut target,
        &policy(),
        &CountingSecrets::default(),
        &GroupId::new("7"),
    )
    .unwrap_err();

    assert_eq!(err, SyncError::EmptyAuthoritativeSource);
    assert_eq!(target.fetch_calls, 0);
    assert_eq!(target.mutation_calls(), 0);
    assert_eq!(target.aliases().len(), 2);
}

#[test]
fn directory_failure_never_reaches_the_target() {
    let mut source =
        FixedDirectory::failing(SyncError::DirectoryUnavailable("bind failed".to_string()));
    let mut target = MemoryTarget::with_accounts(&[("alice", "1")]);

    let err = run_sync(
        &mut source,
        &mut target,
        &policy(),
        &CountingSecrets::default(),
        &GroupId::new("7"),
    )
    .unwrap_err();

    assert!(matches!(err, SyncError::DirectoryUnavailable(_)));
    assert_eq!(target.fetch_calls, 0);
    assert_eq!(target.mutation_calls(), 0);
}

#[test]
fn target_failure_aborts_before_any_mutation() {
    let mut source = FixedDirectory::members(&["alice", "bob"]);
    let mut target = MemoryTarget::with_accounts(&[]);
    target.unavailable = Some("connection refused".to_string());

    let err = run_sync(
        &mut source,
        &mut target,
        &policy(),
        &CountingSecrets::default(),
        &GroupId::new("7"),
    )
    .unwrap_err();

    assert_eq!(
        err,
        SyncError::TargetSystemUnavailable("connection refused".to_string())
    );
    assert_eq!(source.calls, 1);
    assert_eq!(target.mutation_calls(), 0);
}

#[test]
fn full_run_reports_confirmed_counts_and_leaves_protected_alone() {
    let mut source = FixedDirectory::members(&["alice", "bob", "Admin"]);
    let mut target = MemoryTarget::with_accounts(&[
        ("alice", "1"),
        ("carol", "2"),
        ("Admin", "3"),
        ("guest", "4"),
        ("svc-sync", "5"),
    ])
    .batching();

    let report = run_sync(
        &mut source,
        &mut target,
        &policy(),
        &CountingSecrets::default(),
        &GroupId::new("7"),
    )
    .unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(report.deleted, 1);
    assert!(!report.has_failures());
    assert_eq!(
        target.aliases(),
        ["Admin", "alice", "bob", "guest", "svc-sync"]
            .iter()
            .map(|s| s.to_string())
            .collect::<BTreeSet<String>>()
    );
}

#[test]
fn in_sync_run_is_a_zero_report() {
    let mut source = FixedDirectory::members(&["alice"]);
    let mut target = MemoryTarget::with_accounts(&[("alice", "1"), ("guest", "2")]);

    let report = run_sync(
        &mut source,
        &mut target,
        &policy(),
        &CountingSecrets::default(),
        &GroupId::new("7"),
    )
    .unwrap();

    assert_eq!(report, RunReport::empty());
    assert_eq!(target.mutation_calls(), 0);
}
