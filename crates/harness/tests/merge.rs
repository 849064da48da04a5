use missionsync_core::{
    Category, ContentDigest, CoreError, LocalSnapshot, PlanContent, RecordKey, RemotePlan,
    RemoteSnapshot, VehicleId,
};
use missionsync_engine::{EngineConfig, MergeIssue, ReconciliationEngine};
use missionsync_harness::fixtures::{beacon, picky_digester, plan};
use missionsync_harness::{TestFleet, TestVehicle, init_tracing};
use missionsync_storage::{Record, SyncState};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn engine() -> ReconciliationEngine {
    init_tracing();
    ReconciliationEngine::new(EngineConfig::default())
}

/// Every local plan digests to `byte`.
fn fixed_digest(byte: u8) -> impl Fn(&PlanContent) -> Result<ContentDigest, CoreError> + Send {
    move |_| Ok(ContentDigest::from_bytes(vec![byte]))
}

fn remote_plan(id: &str, byte: u8) -> RemotePlan {
    RemotePlan::new(id, ContentDigest::from_bytes(vec![byte]))
}

fn find(engine: &ReconciliationEngine, category: Category, key: &str) -> Option<Record> {
    let key = RecordKey::new(key).ok()?;
    engine.records().find(category, &key).cloned()
}

fn state(engine: &ReconciliationEngine, category: Category, key: &str) -> Option<SyncState> {
    find(engine, category, key).map(|r| r.sync_state)
}

fn display_keys(engine: &ReconciliationEngine, category: Category) -> Vec<String> {
    engine
        .snapshot(category)
        .iter()
        .map(|r| r.key().to_string())
        .collect()
}

// ============================================================================
// Classification
// ============================================================================

#[test]
fn local_plan_without_remote_is_local() -> TestResult {
    let mut engine = ReconciliationEngine::with_digester(EngineConfig::default(), fixed_digest(0xAA));
    let vehicle = VehicleId::from("auv-1");
    let local = LocalSnapshot::new().with_plan(PlanContent::new("p1"))?;

    let report = engine.merge(&vehicle, Some(local), Some(RemoteSnapshot::empty()));

    assert!(report.is_clean());
    assert_eq!(state(&engine, Category::Plan, "p1"), Some(SyncState::Local));
    Ok(())
}

#[test]
fn equal_digests_are_sync() -> TestResult {
    let mut engine = ReconciliationEngine::with_digester(EngineConfig::default(), fixed_digest(0xAA));
    let vehicle = VehicleId::from("auv-1");
    let local = LocalSnapshot::new().with_plan(PlanContent::new("p1"))?;
    let remote = RemoteSnapshot::new(vec![remote_plan("p1", 0xAA)], vec![]);

    engine.merge(&vehicle, Some(local), Some(remote));

    assert_eq!(state(&engine, Category::Plan, "p1"), Some(SyncState::Sync));
    Ok(())
}

#[test]
fn different_digests_are_not_sync() -> TestResult {
    let mut engine = ReconciliationEngine::with_digester(EngineConfig::default(), fixed_digest(0xAA));
    let vehicle = VehicleId::from("auv-1");
    let local = LocalSnapshot::new().with_plan(PlanContent::new("p1"))?;
    let remote = RemoteSnapshot::new(vec![remote_plan("p1", 0xBB)], vec![]);

    engine.merge(&vehicle, Some(local), Some(remote));

    assert_eq!(state(&engine, Category::Plan, "p1"), Some(SyncState::NotSync));
    Ok(())
}

#[test]
fn record_absent_on_both_sides_is_removed() -> TestResult {
    let mut engine = ReconciliationEngine::with_digester(EngineConfig::default(), fixed_digest(0xAA));
    let vehicle = VehicleId::from("auv-1");
    let local = LocalSnapshot::new().with_plan(PlanContent::new("p1"))?;
    engine.merge(&vehicle, Some(local), Some(RemoteSnapshot::empty()));
    assert_eq!(state(&engine, Category::Plan, "p1"), Some(SyncState::Local));

    let report = engine.merge(&vehicle, Some(LocalSnapshot::new()), Some(RemoteSnapshot::empty()));

    assert!(engine.snapshot(Category::Plan).is_empty());
    assert!(report.removed.contains(Category::Plan, &RecordKey::new("p1")?));
    assert_eq!(report.removed.len(), 1);
    Ok(())
}

#[test]
fn remote_only_plan_carries_remote_digest() -> TestResult {
    let mut engine = engine();
    let mut vehicle = TestVehicle::new("auv-1");
    vehicle.upload_plan(plan("survey", 1));

    engine.merge(&vehicle.id, Some(LocalSnapshot::new()), Some(vehicle.poll()?));

    let record = find(&engine, Category::Plan, "survey").ok_or("missing record")?;
    assert_eq!(record.sync_state, SyncState::Remote);
    assert!(record.local.is_none());
    assert_eq!(record.content_digest.as_ref(), record.remote.as_ref().and_then(|r| r.digest()));
    assert_eq!(record.remote_index, None);
    Ok(())
}

#[test]
fn edited_plan_drifts_then_resyncs() -> TestResult {
    let mut engine = engine();
    let mut vehicle = TestVehicle::new("auv-1");
    vehicle.upload_plan(plan("survey", 1));

    let mut local = LocalSnapshot::new().with_plan(plan("survey", 1))?;
    engine.merge(&vehicle.id, Some(local.clone()), Some(vehicle.poll()?));
    assert_eq!(state(&engine, Category::Plan, "survey"), Some(SyncState::Sync));

    local.insert_plan(plan("survey", 2))?;
    engine.merge(&vehicle.id, Some(local.clone()), None);
    assert_eq!(state(&engine, Category::Plan, "survey"), Some(SyncState::NotSync));

    vehicle.upload_plan(plan("survey", 2));
    engine.merge(&vehicle.id, None, Some(vehicle.poll()?));
    assert_eq!(state(&engine, Category::Plan, "survey"), Some(SyncState::Sync));
    Ok(())
}

// ============================================================================
// Idempotence and ordering
// ============================================================================

#[test]
fn repeated_merge_is_idempotent() -> TestResult {
    let mut engine = engine();
    let mut vehicle = TestVehicle::new("auv-1");
    vehicle.upload_plan(plan("a", 1));
    vehicle.upload_plan(plan("b", 1));
    vehicle.set_beacons(vec![beacon("b1", 41.18, -8.70), beacon("b2", 41.19, -8.71)]);
    let local = LocalSnapshot::new()
        .with_plan(plan("b", 2))?
        .with_plan(plan("c", 1))?
        .with_beacon(beacon("b2", 41.19, -8.71))?;
    let remote = vehicle.poll()?;

    engine.merge(&vehicle.id, Some(local.clone()), Some(remote.clone()));
    let plans = engine.snapshot(Category::Plan);
    let beacons = engine.snapshot(Category::Beacon);

    let second = engine.merge(&vehicle.id, Some(local), Some(remote));

    assert!(second.removed.is_empty());
    assert_eq!(engine.snapshot(Category::Plan), plans);
    assert_eq!(engine.snapshot(Category::Beacon), beacons);
    Ok(())
}

#[test]
fn records_are_ordered_case_insensitively() -> TestResult {
    let mut engine = engine();
    let vehicle = VehicleId::from("auv-1");
    let local = LocalSnapshot::new()
        .with_plan(plan("delta", 1))?
        .with_plan(plan("Bravo", 1))?;
    let remote = RemoteSnapshot::new(
        vec![remote_plan("charlie", 1), remote_plan("alpha", 1)],
        vec![],
    );

    engine.merge(&vehicle, Some(local), Some(remote));

    assert_eq!(
        display_keys(&engine, Category::Plan),
        vec!["alpha", "Bravo", "charlie", "delta"]
    );
    Ok(())
}

#[test]
fn local_casing_wins_for_display() -> TestResult {
    let mut engine = engine();
    let mut vehicle = TestVehicle::new("auv-1");
    vehicle.upload_plan(plan("SURVEY", 1));

    engine.merge(&vehicle.id, Some(LocalSnapshot::new()), Some(vehicle.poll()?));
    assert_eq!(display_keys(&engine, Category::Plan), vec!["SURVEY"]);

    let local = LocalSnapshot::new().with_plan(plan("Survey", 1))?;
    engine.merge(&vehicle.id, Some(local), None);

    assert_eq!(display_keys(&engine, Category::Plan), vec!["Survey"]);
    assert_eq!(engine.snapshot(Category::Plan).len(), 1);
    Ok(())
}

#[test]
fn remote_casing_change_keeps_first_display_key() -> TestResult {
    let mut engine = engine();
    let vehicle = VehicleId::from("auv-1");
    let first = RemoteSnapshot::new(vec![remote_plan("survey", 1)], vec![]);
    engine.merge(&vehicle, Some(LocalSnapshot::new()), Some(first));

    let recased = RemoteSnapshot::new(vec![remote_plan("SURVEY", 1)], vec![]);
    engine.merge(&vehicle, None, Some(recased));

    assert_eq!(display_keys(&engine, Category::Plan), vec!["survey"]);
    assert_eq!(state(&engine, Category::Plan, "survey"), Some(SyncState::Remote));
    Ok(())
}

// ============================================================================
// Beacon slots
// ============================================================================

#[test]
fn beacon_index_is_vehicle_slot() -> TestResult {
    let mut engine = engine();
    let mut vehicle = TestVehicle::new("auv-1");
    vehicle.set_beacons(vec![
        beacon("B", 41.10, -8.60),
        beacon("A", 41.20, -8.70),
        beacon("C", 41.30, -8.80),
    ]);
    let local = LocalSnapshot::new().with_beacon(beacon("A", 41.20, -8.70))?;

    engine.merge(&vehicle.id, Some(local), Some(vehicle.poll()?));

    let index = |name: &str| find(&engine, Category::Beacon, name).and_then(|r| r.remote_index);
    assert_eq!(index("B"), Some(0));
    assert_eq!(index("A"), Some(1));
    assert_eq!(index("C"), Some(2));
    assert_eq!(display_keys(&engine, Category::Beacon), vec!["A", "B", "C"]);
    assert_eq!(state(&engine, Category::Beacon, "A"), Some(SyncState::Sync));
    assert_eq!(state(&engine, Category::Beacon, "B"), Some(SyncState::Remote));
    Ok(())
}

#[test]
fn beacon_index_follows_reordering() -> TestResult {
    let mut engine = engine();
    let mut vehicle = TestVehicle::new("auv-1");
    vehicle.set_beacons(vec![beacon("B", 41.1, -8.6), beacon("A", 41.2, -8.7)]);
    engine.merge(&vehicle.id, Some(LocalSnapshot::new()), Some(vehicle.poll()?));

    vehicle.set_beacons(vec![beacon("A", 41.2, -8.7)]);
    let report = engine.merge(&vehicle.id, None, Some(vehicle.poll()?));

    let a = find(&engine, Category::Beacon, "A").ok_or("missing A")?;
    assert_eq!(a.remote_index, Some(0));
    assert!(report.removed.contains(Category::Beacon, &RecordKey::new("B")?));
    Ok(())
}

#[test]
fn moved_beacon_is_not_sync() -> TestResult {
    let mut engine = engine();
    let mut vehicle = TestVehicle::new("auv-1");
    vehicle.set_beacons(vec![beacon("b1", 41.1852101, -8.7060455)]);
    let local = LocalSnapshot::new().with_beacon(beacon("b1", 41.1853101, -8.7060455))?;

    engine.merge(&vehicle.id, Some(local), Some(vehicle.poll()?));

    assert_eq!(state(&engine, Category::Beacon, "b1"), Some(SyncState::NotSync));
    Ok(())
}

#[test]
fn radian_round_trip_does_not_drift() -> TestResult {
    let mut engine = engine();
    let mut vehicle = TestVehicle::new("auv-1");
    let beacons = vec![
        beacon("b1", 41.1852101, -8.7060455),
        beacon("b2", -33.8688197, 151.2092955),
        beacon("b3", 0.0000001, 179.9999999),
    ];
    vehicle.set_beacons(beacons.clone());
    let mut local = LocalSnapshot::new();
    for b in beacons {
        local.insert_beacon(b)?;
    }

    engine.merge(&vehicle.id, Some(local), Some(vehicle.poll()?));

    for record in engine.snapshot(Category::Beacon) {
        assert_eq!(record.sync_state, SyncState::Sync, "{}", record.key());
    }
    Ok(())
}

// ============================================================================
// Degraded input
// ============================================================================

#[test]
fn unreachable_vehicle_degrades_to_local() -> TestResult {
    let mut engine = engine();
    let mut vehicle = TestVehicle::new("auv-1");
    vehicle.upload_plan(plan("survey", 1));
    vehicle.upload_plan(plan("transit", 1));
    vehicle.set_beacons(vec![beacon("b1", 41.1, -8.6)]);
    let local = LocalSnapshot::new()
        .with_plan(plan("survey", 1))?
        .with_beacon(beacon("b1", 41.1, -8.6))?;
    engine.merge(&vehicle.id, Some(local), Some(vehicle.poll()?));
    assert_eq!(state(&engine, Category::Beacon, "b1"), Some(SyncState::Sync));

    vehicle.reachable = false;
    let report = engine.merge(&vehicle.id, None, Some(vehicle.poll()?));

    let b1 = find(&engine, Category::Beacon, "b1").ok_or("missing b1")?;
    assert_eq!(b1.sync_state, SyncState::Local);
    assert_eq!(b1.remote_index, None);
    assert!(b1.remote.is_none());
    assert_eq!(state(&engine, Category::Plan, "survey"), Some(SyncState::Local));
    assert_eq!(state(&engine, Category::Plan, "transit"), None);
    assert!(report.removed.contains(Category::Plan, &RecordKey::new("transit")?));
    Ok(())
}

#[test]
fn malformed_remote_items_are_skipped() -> TestResult {
    let mut engine = engine();
    let vehicle = VehicleId::from("auv-1");
    let mut blank = beacon("x", 41.0, -8.0).to_remote();
    blank.beacon = "  ".into();
    let mut adrift = beacon("nan", 41.0, -8.0).to_remote();
    adrift.lat_rad = f64::NAN;
    let remote = RemoteSnapshot::new(
        vec![remote_plan("", 1), remote_plan("p1", 1), remote_plan("P1", 2)],
        vec![
            beacon("b0", 41.0, -8.0).to_remote(),
            blank,
            adrift,
            beacon("B0", 42.0, -8.0).to_remote(),
            beacon("b4", 43.0, -8.0).to_remote(),
        ],
    );

    let report = engine.merge(&vehicle, Some(LocalSnapshot::new()), Some(remote));

    assert_eq!(display_keys(&engine, Category::Plan), vec!["p1"]);
    assert_eq!(display_keys(&engine, Category::Beacon), vec!["b0", "b4"]);
    let b4 = find(&engine, Category::Beacon, "b4").ok_or("missing b4")?;
    assert_eq!(b4.remote_index, Some(4));

    let skipped: Vec<(Category, usize)> = report
        .issues
        .iter()
        .filter_map(|issue| match issue {
            MergeIssue::UnresolvableRemoteItem {
                category, position, ..
            } => Some((*category, *position)),
            _ => None,
        })
        .collect();
    assert_eq!(
        skipped,
        vec![
            (Category::Plan, 0),
            (Category::Plan, 2),
            (Category::Beacon, 1),
            (Category::Beacon, 2),
            (Category::Beacon, 3),
        ]
    );
    Ok(())
}

#[test]
fn comparator_failure_marks_not_sync() -> TestResult {
    init_tracing();
    let mut engine = ReconciliationEngine::with_digester(EngineConfig::default(), picky_digester);
    let mut vehicle = TestVehicle::new("auv-1");
    vehicle.upload_plan(plan("broken-1", 1));
    vehicle.upload_plan(plan("fine", 1));
    let local = LocalSnapshot::new()
        .with_plan(plan("broken-1", 1))?
        .with_plan(plan("fine", 1))?;

    let report = engine.merge(&vehicle.id, Some(local), Some(vehicle.poll()?));

    assert_eq!(state(&engine, Category::Plan, "broken-1"), Some(SyncState::NotSync));
    assert_eq!(state(&engine, Category::Plan, "fine"), Some(SyncState::Sync));
    assert!(matches!(
        report.issues.as_slice(),
        [MergeIssue::ComparatorFailure { category: Category::Plan, key, .. }] if key.as_str() == "broken-1"
    ));
    Ok(())
}

// ============================================================================
// Vehicle scoping and cached snapshots
// ============================================================================

#[test]
fn other_vehicles_records_survive() -> TestResult {
    let mut engine = engine();
    let mut fleet = TestFleet::new();
    let first = fleet.add_vehicle("auv-1");
    let second = fleet.add_vehicle("auv-2");
    fleet.vehicle_mut(first).upload_plan(plan("north", 1));
    fleet.vehicle_mut(second).upload_plan(plan("south", 1));

    let reports = fleet.poll_all(&mut engine)?;
    assert_eq!(reports.len(), 2);
    assert_eq!(display_keys(&engine, Category::Plan), vec!["north", "south"]);

    fleet.vehicle_mut(first).delete_plan("north");
    let report = engine.merge(&fleet.vehicle(first).id, None, Some(fleet.vehicle(first).poll()?));

    assert_eq!(display_keys(&engine, Category::Plan), vec!["south"]);
    let south = find(&engine, Category::Plan, "south").ok_or("missing south")?;
    assert_eq!(south.origin_vehicle, fleet.vehicle(second).id);
    assert_eq!(report.removed.len(), 1);
    Ok(())
}

#[test]
fn omitted_snapshots_reuse_cache() -> TestResult {
    let mut engine = engine();
    let mut vehicle = TestVehicle::new("auv-1");
    vehicle.upload_plan(plan("survey", 1));
    let local = LocalSnapshot::new()
        .with_plan(plan("survey", 1))?
        .with_plan(plan("draft", 1))?;
    engine.merge(&vehicle.id, Some(local), Some(vehicle.poll()?));
    let before = engine.snapshot(Category::Plan);

    let report = engine.merge(&vehicle.id, None, None);
    assert!(report.removed.is_empty());
    assert_eq!(engine.snapshot(Category::Plan), before);

    engine.merge(&vehicle.id, None, Some(RemoteSnapshot::empty()));
    assert_eq!(state(&engine, Category::Plan, "survey"), Some(SyncState::Local));
    assert_eq!(state(&engine, Category::Plan, "draft"), Some(SyncState::Local));
    Ok(())
}

#[test]
fn first_merge_without_snapshots_is_empty() {
    let mut engine = engine();
    let report = engine.merge(&VehicleId::from("auv-1"), None, None);
    assert!(report.removed.is_empty());
    assert!(report.is_clean());
    assert!(engine.records().is_empty());
}

#[test]
fn plan_body_with_foreign_id_is_unresolvable() -> TestResult {
    let mut engine = engine();
    let vehicle = VehicleId::from("auv-1");
    let mismatched = remote_plan("p2", 1).with_plan(plan("other", 1));
    let remote = RemoteSnapshot::new(vec![mismatched, remote_plan("p3", 1)], vec![]);

    let report = engine.merge(&vehicle, Some(LocalSnapshot::new()), Some(remote));

    assert_eq!(display_keys(&engine, Category::Plan), vec!["p3"]);
    assert!(matches!(
        report.issues.as_slice(),
        [MergeIssue::UnresolvableRemoteItem {
            category: Category::Plan,
            position: 0,
            ..
        }]
    ));
    Ok(())
}

#[test]
fn shared_key_follows_the_last_merged_vehicle() -> TestResult {
    let mut engine = engine();
    let mut first = TestVehicle::new("auv-1");
    let second = TestVehicle::new("auv-2");
    first.upload_plan(plan("survey", 1));
    let mission = LocalSnapshot::new().with_plan(plan("survey", 1))?;

    engine.merge(&first.id, Some(mission.clone()), Some(first.poll()?));
    let record = find(&engine, Category::Plan, "survey").ok_or("missing survey")?;
    assert_eq!(record.sync_state, SyncState::Sync);
    assert_eq!(record.origin_vehicle, first.id);

    // The second vehicle does not carry the plan, so its merge drops the first
    // vehicle's copy and takes ownership.
    engine.merge(&second.id, Some(mission), Some(second.poll()?));
    let record = find(&engine, Category::Plan, "survey").ok_or("missing survey")?;
    assert_eq!(record.sync_state, SyncState::Local);
    assert!(record.remote.is_none());
    assert_eq!(record.origin_vehicle, second.id);

    engine.merge(&first.id, None, None);
    let record = find(&engine, Category::Plan, "survey").ok_or("missing survey")?;
    assert_eq!(record.sync_state, SyncState::Sync);
    assert_eq!(record.origin_vehicle, first.id);
    Ok(())
}

#[test]
fn polled_plan_reports_encoded_size() -> TestResult {
    let mut vehicle = TestVehicle::new("auv-1");
    let survey = plan("survey", 1);
    vehicle.upload_plan(survey.clone());

    let remote = vehicle.poll()?;

    assert_eq!(remote.plans[0].size as usize, survey.canonical_bytes()?.len());
    assert_eq!(remote.plans[0].change_source, "auv-1");
    Ok(())
}
