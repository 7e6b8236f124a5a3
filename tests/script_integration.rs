//! Integration tests running complete scene files.

use pretty_assertions::assert_eq;

use pivot_rig::scene::{Attr, Plug, SceneGraph, Vec3};
use pivot_rig::script::{run_actions, summarize, ScriptFile};
use pivot_rig::{RigConfig, RigSession};

const SCENE: &str = r#"
current_time = 10.0
selection = ["target"]

[[transform]]
name = "target"
translate = [5.0, 0.0, 0.0]
locked = ["rotatePivot", "scalePivot"]

[[transform]]
name = "follower"

[[constraint]]
kind = "point"
targets = ["target"]
constrained = "follower"
offsets = [[1.0, 0.0, 0.0]]

[[action]]
op = "prepare"
object = "target"

[[action]]
op = "translate"
node = "PosPivot1_target"
value = [0.0, 2.0, 0.0]

[[action]]
op = "retarget"
object = "target"
anchor = "pos_pivot1"

[[action]]
op = "neutralize"
object = "target"
"#;

fn run(config: RigConfig) -> (pivot_rig::MemoryScene, RigSession, Vec<String>) {
    let script = ScriptFile::from_str(SCENE).unwrap();
    let mut scene = script.build_scene().unwrap();
    let mut session = RigSession::attach(&scene, config);
    let lines = run_actions(&mut scene, &mut session, &script.actions)
        .iter()
        .map(|outcome| outcome.line())
        .collect();
    (scene, session, lines)
}

#[test]
fn test_full_run() {
    let config = RigConfig::default().with_gizmo(pivot_rig::GizmoConfig {
        enabled: false,
        ..Default::default()
    });
    let (scene, session, lines) = run(config);

    assert_eq!(
        lines,
        vec![
            "ok       prepare target: 1 compensated, 0 already compensated; 3 marker(s) created",
            "ok       translate PosPivot1_target (0.000, 2.000, 0.000): translate (0.000, 2.000, 0.000)",
            "ok       retarget target PosPivot1: pivots at (5.000, 2.000, 0.000), 7 keys at time 10",
            "ok       neutralize target: 0 compensated, 1 already compensated",
        ]
    );

    let target = scene.find("target").unwrap();
    assert_eq!(
        scene.keyframe_at(Plug::new(target, Attr::RotatePivot), 10.0),
        Some(Vec3::new(0.0, 2.0, 0.0).into())
    );

    insta::assert_snapshot!(summarize(&scene, &session), @r"
constrained positions:
  follower                 (6.000, 0.000, 0.000)
compensation: 1 reverse node(s), 1 offset-sum node(s)
tracked objects: target
");
}

#[test]
fn test_retarget_without_markers_is_reported() {
    let script = ScriptFile::from_str(
        r#"
        selection = ["lonely"]

        [[transform]]
        name = "lonely"

        [[action]]
        op = "retarget"
        object = "lonely"
        anchor = "origin"

        [[action]]
        op = "neutralize"
        object = "lonely"
        "#,
    )
    .unwrap();
    let mut scene = script.build_scene().unwrap();
    let mut session = RigSession::attach(&scene, RigConfig::default());
    let outcomes = run_actions(&mut scene, &mut session, &script.actions);

    assert!(outcomes[0].line().starts_with("error    retarget lonely Origin:"));
    assert!(outcomes[1].line().starts_with("warning  neutralize lonely:"));
}

#[test]
fn test_attach_picks_up_existing_rig() {
    let config = RigConfig::default();
    let (scene, _, _) = run(config.clone());

    let session = RigSession::attach(&scene, config);
    let target = scene.find("target").unwrap();
    assert_eq!(session.tracked_objects(&scene), vec![target]);
    assert_eq!(session.compensation().reverse_count(), 1);
}
