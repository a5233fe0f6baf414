use episode::{
    load_posture, Dataset, DatasetLayout, DatasetSceneResolver, EpisodeError, EpisodeResult,
    EpisodeSummary, Manifest, ResultStore, TerminationReason,
};
use protocol::{EpisodeKey, Pose};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(path: &Path, text: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

struct Fixture {
    dir: TempDir,
    dataset: Dataset,
}

/// One mp3d trajectory with five posture frames, its scene mesh and the
/// screenshots for frames 1 and 2.
fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let traj = "mp3d_1/17DRP5sb8fy/traj_7";
    write(
        &root.join("posture").join(traj).join("posture.json"),
        "[[0,0,0,0],[1,0,0,90],[2,0,0,180],[3,0,0],[4,0,1,270]]",
    );
    write(&root.join("scenes/mp3d/17DRP5sb8fy/17DRP5sb8fy.glb"), "glb");
    write(&root.join("shots").join(traj).join("screenshots/1.png"), "png");
    write(&root.join("shots").join(traj).join("screenshots/2.png"), "png");
    write(
        &root.join("ins").join(traj).join("ins_0.json"),
        r#"{"instruction": "fly past the sofa", "source": [2, 4]}"#,
    );
    write(
        &root.join("ins").join(traj).join("ins_1.json"),
        r#"{"instruction": "go far", "source": [4, 99]}"#,
    );

    let layout = DatasetLayout {
        instruction_root: root.join("ins"),
        posture_root: root.join("posture"),
        screenshot_root: root.join("shots"),
    };
    let scenes = DatasetSceneResolver::new(root.join("scenes"));
    Fixture {
        dataset: Dataset::new(layout, Box::new(scenes)),
        dir,
    }
}

fn manifest(text: &str) -> Manifest {
    Manifest::parse(text).unwrap()
}

#[test]
fn posture_headings_are_converted_to_radians() {
    let f = fixture();
    let path = f.dir.path().join("posture/mp3d_1/17DRP5sb8fy/traj_7/posture.json");
    let posture = load_posture(&path).unwrap();
    assert_eq!(posture.len(), 5);
    assert!((posture[1].heading - PI / 2.0).abs() < 1e-12);
    assert_eq!(posture[3], Pose::new(3.0, 0.0, 0.0, 0.0));
}

#[test]
fn empty_or_short_posture_is_rejected() {
    let dir = TempDir::new().unwrap();
    let empty = dir.path().join("empty.json");
    write(&empty, "[]");
    assert!(matches!(load_posture(&empty), Err(EpisodeError::EmptyPosture(_))));

    let short = dir.path().join("short.json");
    write(&short, "[[1, 2]]");
    assert!(matches!(load_posture(&short), Err(EpisodeError::Protocol(_))));
}

#[test]
fn multi_instruction_plan_spans_the_whole_trajectory() {
    let f = fixture();
    let m = manifest(r#"{"mp3d_1/17DRP5sb8fy/traj_7/ins_0.json": ["take off", "land"]}"#);
    let (key, entry) = m.iter().next().unwrap();
    let plan = f.dataset.plan(key, entry).unwrap();

    assert_eq!(plan.instructions, vec!["take off", "land"]);
    assert_eq!(plan.start, Pose::new(0.0, 0.0, 0.0, 0.0));
    assert_eq!(plan.goal.position(), [4.0, 0.0, 1.0]);
    assert!(plan.glb_path.ends_with("17DRP5sb8fy.glb"));
    assert!(plan.start_image.unwrap().ends_with("screenshots/1.png"));
}

#[test]
fn single_instruction_plan_uses_source_frames() {
    let f = fixture();
    let m = manifest(
        r#"{"mp3d_1/17DRP5sb8fy/traj_7/ins_0.json": {"difficulty": "easy", "action_type": ["forward"]}}"#,
    );
    let (key, entry) = m.iter().next().unwrap();
    let plan = f.dataset.plan(key, entry).unwrap();

    assert_eq!(plan.instructions, vec!["fly past the sofa"]);
    assert_eq!(plan.start.x, 1.0);
    assert_eq!(plan.goal.x, 3.0);
    assert!(plan.start_image.unwrap().ends_with("screenshots/2.png"));
    assert_eq!(plan.metadata.difficulty.as_deref(), Some("easy"));
}

#[test]
fn out_of_range_source_is_clamped_and_missing_image_tolerated() {
    let f = fixture();
    let m = manifest(r#"{"mp3d_1/17DRP5sb8fy/traj_7/ins_1.json": {}}"#);
    let (key, entry) = m.iter().next().unwrap();
    let plan = f.dataset.plan(key, entry).unwrap();

    assert_eq!(plan.start.x, 3.0);
    assert_eq!(plan.goal.x, 4.0);
    assert!(plan.start_image.is_none());
    assert_eq!(plan.metadata.difficulty.as_deref(), Some("unknown"));
}

#[test]
fn broken_episodes_fail_individually() {
    let f = fixture();
    let m = manifest(
        r#"{
            "not-a-key": ["go"],
            "mp3d_1/17DRP5sb8fy/traj_9/ins_0.json": ["go"],
            "mp3d_1/17DRP5sb8fy/traj_7/ins_0.json": []
        }"#,
    );
    let errors: Vec<EpisodeError> = m
        .iter()
        .map(|(key, entry)| f.dataset.plan(key, entry).unwrap_err())
        .collect();
    assert!(matches!(errors[0], EpisodeError::Protocol(_)));
    assert!(matches!(errors[1], EpisodeError::MissingAsset { what: "posture", .. }));
    assert!(matches!(errors[2], EpisodeError::NoInstructions(_)));
}

#[test]
fn results_reload_identically() {
    let dir = TempDir::new().unwrap();
    let store = ResultStore::new(dir.path().join("trajectories"));
    let key = EpisodeKey::parse("/hm3d_2/TEEsavR23oF/traj 1/ins:0.json").unwrap();
    let result = EpisodeResult {
        episode_key: key.clone(),
        success: false,
        steps: 3,
        trajectory: vec![
            Pose::new(0.1, 0.2, 0.3, 0.1 + 0.2),
            Pose::new(1.0 / 3.0, -2.5e-7, 7.0, 6.283_185_307_179_586),
        ],
        termination_reason: TerminationReason::InstructionsExhausted,
        instructions: vec!["up".into(), "down".into()],
        current_instruction_index: 1,
    };
    let path = store.write(&result).unwrap();
    assert_eq!(path.file_name().unwrap(), "_hm3d_2_TEEsavR23oF_traj_1_ins_0.json.json");

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"termination_reason\": \"no_more_instructions\""));
    assert_eq!(store.load(&key).unwrap(), result);
}

#[test]
fn aggregate_is_sorted_by_key() {
    let dir = TempDir::new().unwrap();
    let store = ResultStore::new(dir.path());
    let summary = |steps| EpisodeSummary {
        success: true,
        steps,
        final_instruction_index: 0,
        termination_reason: TerminationReason::Success,
        difficulty: None,
        action_type: None,
    };
    let mut all = BTreeMap::new();
    all.insert(EpisodeKey::parse("z/s/t/f").unwrap(), summary(1));
    all.insert(EpisodeKey::parse("a/s/t/f").unwrap(), summary(2));
    store.write_aggregate(&all).unwrap();

    let text = fs::read_to_string(store.aggregate_path()).unwrap();
    assert!(text.find("a/s/t/f").unwrap() < text.find("z/s/t/f").unwrap());
    assert!(!text.contains("difficulty"));
    assert_eq!(store.load_aggregate().unwrap(), all);
}
