use super::*;

fn scenario(json: &str) -> Scenario {
    Scenario::from_json(json).unwrap()
}

// =============================================================================
// Scenario parsing
// =============================================================================

#[test]
fn minimal_scenario_uses_defaults() {
    let s = scenario(r#"{"target":{"definition":{"def_name":"Bed","rotatable":true}},"events":[]}"#);
    assert_eq!(s.target.workflow, TargetWorkflow::Build);
    assert_eq!(s.target.rotation, Rotation::South);
    assert_eq!(s.settings, Settings::default());
    assert_eq!(s.pointer, Cell::default());
}

#[test]
fn events_parse_by_tag() {
    let s = scenario(
        r#"{
            "target":{"definition":{"def_name":"Bed"}},
            "events":[
                {"event":"select"},
                {"event":"pointer","x":3,"z":-2},
                {"event":"frame","pointer_down":true},
                {"event":"key","key":"right"},
                {"event":"host_click"}
            ]
        }"#,
    );
    assert!(matches!(s.events[1], ScriptEvent::Pointer { x: 3, z: -2 }));
    assert!(matches!(s.events[2], ScriptEvent::Frame { input: FrameInput { pointer_down: true, .. } }));
    assert!(matches!(s.events[3], ScriptEvent::Key { key: RotateKey::Right }));
}

#[test]
fn malformed_scenario_is_an_error() {
    let err = Scenario::from_json(r#"{"events":[]}"#).unwrap_err();
    assert!(matches!(err, ReplayError::Parse(_)));
}

#[test]
fn missing_file_reports_path() {
    let err = Scenario::load(Path::new("/nonexistent/scenario.json")).unwrap_err();
    assert!(err.to_string().contains("/nonexistent/scenario.json"));
}

// =============================================================================
// Scripted objects
// =============================================================================

#[test]
fn scripted_object_enforces_member_table() {
    let object = ScriptedObject::new(&DESIGNATOR_PLACE).with("placingRot", Value::Rotation(Rotation::East));
    assert_eq!(object.read("placingRot").unwrap().as_rotation(), Some(Rotation::East));
    assert!(matches!(object.read("missing"), Err(AccessError::NoSuchMember { .. })));
    assert!(matches!(
        object.write("PlacingDef", Value::Null),
        Err(AccessError::ReadOnly { .. })
    ));
    assert!(matches!(
        object.write("placingRot", Value::Int(1)),
        Err(AccessError::TypeMismatch { .. })
    ));
    assert!(matches!(object.read("soundSucceeded"), Ok(Value::Null)));
}

#[test]
fn built_targets_classify_as_their_workflow() {
    use crate::capability::CapabilityResolver;
    use crate::classify::{Workflow, classify_workflow, compute_rotatable};

    let resolver = CapabilityResolver::new();
    let mut target = TargetSpec {
        workflow: TargetWorkflow::Build,
        definition: Definition::thing("Bed", true),
        rotation: Rotation::South,
        source_rotation: Some(Rotation::East),
        success_sound: None,
    };
    assert_eq!(classify_workflow(&resolver, &target.build()).unwrap(), Workflow::Build);

    target.workflow = TargetWorkflow::Install;
    let install = target.build();
    assert_eq!(classify_workflow(&resolver, &install).unwrap(), Workflow::Install);
    assert!(compute_rotatable(&resolver, &install).unwrap());

    target.workflow = TargetWorkflow::Reinstall;
    assert_eq!(
        classify_workflow(&resolver, &target.build()).unwrap(),
        Workflow::Reinstall { source_rotation: Some(Rotation::East) }
    );
}

// =============================================================================
// Runs
// =============================================================================

#[test]
fn rejected_drag_keeps_rotation_and_reports_reason() {
    let report = run(&scenario(
        r#"{
            "target":{"definition":{"def_name":"Bed","rotatable":true}},
            "rejections":[{"cell":{"x":9,"z":5},"reason":"Space already occupied"}],
            "pointer":{"x":9,"z":5},
            "events":[
                {"event":"select"},
                {"event":"down"},
                {"event":"pointer","x":13,"z":5},
                {"event":"move"},
                {"event":"up"}
            ]
        }"#,
    ));
    assert!(report.rotatable);
    assert_eq!(report.final_rotation, Some(Rotation::East));

    let down = &report.steps[1];
    assert!(down.consumed);
    assert_eq!(down.phase, "pinned");
    assert_eq!(down.pinned, Some(Cell::new(9, 5)));

    let up = &report.steps[4];
    assert!(up.consumed);
    assert_eq!(up.phase, "idle");
    assert_eq!(up.calls, vec![HostCall::Rejection { reason: "Space already occupied".into() }]);
}

#[test]
fn accepted_release_commits_once_with_one_sound() {
    let report = run(&scenario(
        r#"{
            "target":{"definition":{"def_name":"Bed","rotatable":true},"success_sound":"Bed_Placed"},
            "events":[
                {"event":"select"},
                {"event":"frame","pointer_down":true,"pointer_held":true},
                {"event":"pointer","x":0,"z":-3},
                {"event":"frame","pointer_held":true},
                {"event":"frame","pointer_up":true}
            ]
        }"#,
    ));
    assert_eq!(report.final_rotation, Some(Rotation::South));
    let up = &report.steps[4];
    let commits = up.calls.iter().filter(|c| matches!(c, HostCall::Commit { .. })).count();
    assert_eq!(commits, 1);
    assert!(up.calls.contains(&HostCall::SoundSuppressed { name: SOUND_PLACE.into() }));
    assert!(up.calls.contains(&HostCall::Sound { name: "Bed_Placed".into(), location: SoundLocation::TargetMap }));
}

#[test]
fn reinstall_keeps_original_rotation_on_first_frame() {
    let report = run(&scenario(
        r#"{
            "settings":{"overrides":{"reinstall":"north"}},
            "target":{"workflow":"reinstall","definition":{"def_name":"Bed","rotatable":true},"source_rotation":"west"},
            "events":[{"event":"select"},{"event":"frame"}]
        }"#,
    ));
    assert_eq!(report.steps[1].rotation, Some(Rotation::West));
}

#[test]
fn non_rotatable_target_leaves_host_in_charge() {
    let report = run(&scenario(
        r#"{
            "target":{"definition":{"def_name":"Lamp","rotatable":false}},
            "pointer":{"x":2,"z":2},
            "events":[{"event":"select"},{"event":"host_click"}]
        }"#,
    ));
    assert!(!report.rotatable);
    let click = &report.steps[1];
    assert!(!click.consumed);
    assert_eq!(click.calls[0], HostCall::Commit { cell: Cell::new(2, 2) });
    assert!(click.calls.contains(&HostCall::Sound { name: SOUND_PLACE.into(), location: SoundLocation::TargetMap }));
}

#[test]
fn raw_host_events_are_consumed_only_while_pinned() {
    let report = run(&scenario(
        r#"{
            "target":{"definition":{"def_name":"Bed","rotatable":true}},
            "events":[
                {"event":"select"},
                {"event":"host_event","kind":"primary_down"},
                {"event":"down"},
                {"event":"host_event","kind":"primary_down"},
                {"event":"host_event","kind":"primary_up"},
                {"event":"host_event","kind":"other"}
            ]
        }"#,
    ));
    let consumed: Vec<_> = report.steps.iter().map(|s| s.consumed).collect();
    assert_eq!(consumed, vec![false, false, true, true, false, false]);
}

#[test]
fn unreadable_rotation_reports_none() {
    use crate::test_helpers::{build_target, object};

    let host = ScriptedHost::new();
    let engine = host.attach(Settings::default());
    let stub = build_target(true);
    let target = object(&stub);
    assert_eq!(read_rotation(&engine, &target), Some(Rotation::South));
    stub.dispose();
    assert_eq!(read_rotation(&engine, &target), None);
}

#[test]
fn settings_event_disables_gesture_mid_script() {
    let report = run(&scenario(
        r#"{
            "target":{"definition":{"def_name":"Bed","rotatable":true}},
            "events":[
                {"event":"select"},
                {"event":"settings","settings":{"gesture_enabled":false}},
                {"event":"down"}
            ]
        }"#,
    ));
    assert!(!report.steps[2].consumed);
    assert_eq!(report.steps[2].phase, "idle");
}

#[test]
fn report_serializes_to_json() {
    let report = run(&scenario(
        r#"{"target":{"definition":{"def_name":"Bed","rotatable":true}},"events":[{"event":"select"}]}"#,
    ));
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["final_rotation"], "south");
    assert_eq!(json["steps"][0]["phase"], "idle");
}
