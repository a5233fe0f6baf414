use mailbox::{
    Channel, Disposition, FileRouter, InstructionSlot, Mailbox, MailboxLayout, Provenance,
    SlotReader, SENTINEL_FILE,
};
use protocol::{EpisodeKey, InstructionContext, Message, MessageKind, Observation, Pose, PoseUpdate};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn setup() -> (TempDir, Mailbox) {
    let dir = TempDir::new().unwrap();
    let layout = MailboxLayout::new(dir.path().join("shared"));
    layout.ensure().unwrap();
    (dir, Mailbox::new(layout, "test"))
}

fn key() -> EpisodeKey {
    EpisodeKey::parse("mp3d/17DRP5sb8fy/traj_0/ins_0.json").unwrap()
}

fn pose_update(x: f64) -> Message {
    Message::PoseUpdate(PoseUpdate {
        episode_key: key(),
        coordinates: Pose::new(x, 0.0, 0.0, 0.0),
    })
}

fn files_in(mailbox: &Mailbox, channel: Channel) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(mailbox.layout().channel_dir(channel))
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}

#[test]
fn published_messages_are_claimed_once_in_order() {
    let (_dir, mailbox) = setup();
    for x in 0..5 {
        mailbox.publish(Channel::ModelInput, &pose_update(f64::from(x))).unwrap();
    }
    assert_eq!(mailbox.pending(Channel::ModelInput).unwrap(), 5);
    let salt = mailbox.namer().salt();
    assert!(files_in(&mailbox, Channel::ModelInput)
        .iter()
        .all(|name| name.contains(salt)));

    let mut seen = Vec::new();
    let report = mailbox
        .claim(Channel::ModelInput, |env| {
            seen.push(env.message.pose().unwrap().x);
            Disposition::Consumed
        })
        .unwrap();
    assert_eq!(report.consumed, 5);
    assert_eq!(seen, vec![0.0, 1.0, 2.0, 3.0, 4.0]);

    let second = mailbox.claim(Channel::ModelInput, |_| Disposition::Consumed).unwrap();
    assert_eq!(second.consumed, 0);
    assert!(files_in(&mailbox, Channel::ModelInput).is_empty());
}

#[test]
fn deferred_messages_stay_and_discarded_ones_go() {
    let (_dir, mailbox) = setup();
    mailbox.publish(Channel::ControllerInput, &pose_update(1.0)).unwrap();
    mailbox.publish(Channel::ControllerInput, &pose_update(2.0)).unwrap();

    let report = mailbox
        .claim(Channel::ControllerInput, |env| {
            if env.message.pose().unwrap().x < 1.5 {
                Disposition::Deferred
            } else {
                Disposition::Discarded
            }
        })
        .unwrap();
    assert_eq!(report.deferred, 1);
    assert_eq!(report.discarded, 1);
    assert!(report.made_progress());
    assert_eq!(mailbox.pending(Channel::ControllerInput).unwrap(), 1);
}

#[test]
fn malformed_files_are_dropped_not_retried() {
    let (_dir, mailbox) = setup();
    let dir = mailbox.layout().channel_dir(Channel::SimInput);
    fs::write(dir.join("0001-broken.json"), b"{ half a message").unwrap();
    mailbox.publish(Channel::SimInput, &pose_update(3.0)).unwrap();

    let mut handled = 0;
    let report = mailbox
        .claim(Channel::SimInput, |_| {
            handled += 1;
            Disposition::Consumed
        })
        .unwrap();
    assert_eq!(report.malformed, 1);
    assert_eq!(handled, 1);
    assert!(files_in(&mailbox, Channel::SimInput).is_empty());
}

#[test]
fn temporary_and_foreign_files_are_invisible() {
    let (_dir, mailbox) = setup();
    let dir = mailbox.layout().channel_dir(Channel::SimOutput);
    fs::write(dir.join(".0001.json.tmp"), b"{}").unwrap();
    fs::write(dir.join("frame.png"), b"png").unwrap();
    assert_eq!(mailbox.pending(Channel::SimOutput).unwrap(), 0);
}

#[test]
fn drain_moves_with_provenance_prefix() {
    let (_dir, mailbox) = setup();
    let sim = mailbox
        .publish(
            Channel::SimOutput,
            &Message::Observation(Observation {
                episode_key: key(),
                coordinates: Pose::new(0.0, 0.0, 0.0, 0.0),
                image_path: PathBuf::from("images/a.png"),
            }),
        )
        .unwrap();
    mailbox.publish(Channel::ModelOutput, &pose_update(1.0)).unwrap();

    let router = FileRouter::standard(mailbox.clone());
    assert_eq!(router.routes().len(), 2);
    assert!(router
        .routes()
        .iter()
        .all(|route| route.to == Channel::ControllerInput));
    assert_eq!(router.relay(), 2);
    assert!(!sim.exists());
    assert_eq!(mailbox.pending(Channel::SimOutput).unwrap(), 0);
    assert_eq!(mailbox.pending(Channel::ModelOutput).unwrap(), 0);

    let mut kinds = Vec::new();
    mailbox
        .claim(Channel::ControllerInput, |env| {
            kinds.push((env.provenance, env.message.kind()));
            Disposition::Consumed
        })
        .unwrap();
    kinds.sort_by_key(|(p, _)| p.map(Provenance::prefix));
    assert_eq!(
        kinds,
        vec![
            (Some(Provenance::Model), MessageKind::PoseUpdate),
            (Some(Provenance::Simulator), MessageKind::Observation),
        ]
    );
    assert_eq!(router.relay(), 0);
}

#[test]
fn sentinel_has_fixed_name_and_is_claimed_first() {
    let (_dir, mailbox) = setup();
    mailbox.publish(Channel::SimInput, &pose_update(1.0)).unwrap();
    let path = mailbox.publish_sentinel(Channel::SimInput, &key()).unwrap();
    assert_eq!(path.file_name().unwrap(), SENTINEL_FILE);
    // a second sentinel replaces the first one
    mailbox.publish_sentinel(Channel::SimInput, &key()).unwrap();

    let mut order = Vec::new();
    mailbox
        .claim(Channel::SimInput, |env| {
            order.push((env.is_sentinel(), env.message.kind()));
            Disposition::Consumed
        })
        .unwrap();
    assert_eq!(
        order,
        vec![(true, MessageKind::Terminate), (false, MessageKind::PoseUpdate)]
    );
}

#[test]
fn purge_clears_everything() {
    let (_dir, mailbox) = setup();
    mailbox.publish(Channel::ControllerInput, &pose_update(1.0)).unwrap();
    let dir = mailbox.layout().channel_dir(Channel::ControllerInput);
    fs::write(dir.join("stray.txt"), b"x").unwrap();
    assert_eq!(mailbox.purge(Channel::ControllerInput).unwrap(), 2);
    assert!(files_in(&mailbox, Channel::ControllerInput).is_empty());
}

#[test]
fn instruction_slot_reports_each_change_once() {
    let (_dir, mailbox) = setup();
    let slot = InstructionSlot::new(mailbox.layout());
    let mut reader = SlotReader::new(mailbox.layout());
    assert!(reader.poll().unwrap().is_none());

    let mut ctx = InstructionContext {
        episode_key: key(),
        instruction: "take off".into(),
        end_coords: Pose::new(1.0, 2.0, 3.0, 0.0),
        glb_path: Some(PathBuf::from("scene.glb")),
        start_coords: Pose::new(0.0, 0.0, 0.0, 0.0),
        start_image_path: None,
        ref_image_path: None,
    };
    slot.write(&ctx).unwrap();
    assert_eq!(reader.poll().unwrap().unwrap().instruction, "take off");
    assert!(reader.poll().unwrap().is_none());

    ctx.instruction = "turn left".into();
    slot.write(&ctx).unwrap();
    assert_eq!(reader.poll().unwrap().unwrap().instruction, "turn left");
    assert!(reader.poll().unwrap().is_none());
}

#[test]
fn malformed_slot_is_reported_once() {
    let (_dir, mailbox) = setup();
    let slot = InstructionSlot::new(mailbox.layout());
    fs::write(slot.path(), b"not json").unwrap();
    let mut reader = SlotReader::new(mailbox.layout());
    assert!(reader.poll().is_err());
    assert!(reader.poll().unwrap().is_none());
    slot.clear().unwrap();
    assert!(reader.poll().unwrap().is_none());
}
