use protocol::{circular_difference, Pose, SuccessCriterion, UpdateCondition};
use std::f64::consts::{PI, TAU};

fn random_heading(rng: &fastrand::Rng) -> f64 {
    (rng.f64() - 0.5) * 8.0 * PI
}

#[test]
fn circular_difference_is_bounded_and_symmetric() {
    let rng = fastrand::Rng::with_seed(7);
    for _ in 0..10_000 {
        let a = random_heading(&rng);
        let b = random_heading(&rng);
        let ab = circular_difference(a, b);
        let ba = circular_difference(b, a);
        assert!((0.0..=PI).contains(&ab), "diff({a}, {b}) = {ab}");
        assert!((ab - ba).abs() < 1e-12, "diff not symmetric for {a}, {b}");
    }
}

#[test]
fn circular_difference_ignores_full_turns() {
    let rng = fastrand::Rng::with_seed(11);
    for _ in 0..1_000 {
        let a = random_heading(&rng);
        let b = random_heading(&rng);
        let shifted = circular_difference(a + 3.0 * TAU, b - TAU);
        assert!((circular_difference(a, b) - shifted).abs() < 1e-9);
    }
}

#[test]
fn goal_scenario_from_the_evaluation_protocol() {
    let goal = Pose::new(5.0, 0.0, 0.0, 0.0);
    let criterion = SuccessCriterion::from_degrees(0.1, 45.0);
    assert!(criterion.is_met(&Pose::new(5.05, 0.0, 0.0, 0.05), &goal));
    assert!(!criterion.is_met(&Pose::new(5.2, 0.0, 0.0, 0.0), &goal));
}

#[test]
fn success_needs_both_position_and_heading() {
    let goal = Pose::new(1.0, 1.0, 1.0, PI / 2.0);
    let criterion = SuccessCriterion::new(0.5, 0.2);
    // close, but facing the wrong way
    assert!(!criterion.is_met(&Pose::new(1.0, 1.0, 1.0, -PI / 2.0), &goal));
    // facing right, but too far
    assert!(!criterion.is_met(&Pose::new(2.0, 1.0, 1.0, PI / 2.0), &goal));
    // heading equal modulo a full turn
    assert!(criterion.is_met(&Pose::new(1.1, 1.0, 1.0, PI / 2.0 + TAU), &goal));
}

#[test]
fn success_matches_componentwise_definition() {
    let rng = fastrand::Rng::with_seed(3);
    let criterion = SuccessCriterion::new(0.3, 0.4);
    for _ in 0..5_000 {
        let goal = Pose::new(rng.f64(), rng.f64(), rng.f64(), random_heading(&rng));
        let current = Pose::new(
            goal.x + (rng.f64() - 0.5) * 0.8,
            goal.y + (rng.f64() - 0.5) * 0.8,
            goal.z,
            goal.heading + (rng.f64() - 0.5) * 1.6,
        );
        let expected = current.distance_to(&goal) <= 0.3
            && circular_difference(current.heading, goal.heading) <= 0.4;
        assert_eq!(criterion.is_met(&current, &goal), expected);
    }
}

#[test]
fn settled_agent_meets_update_condition() {
    let condition = UpdateCondition::default();
    let previous = Pose::new(2.0, 3.0, 1.0, 0.3);
    assert!(condition.is_met(&Pose::new(2.1, 3.0, 1.0, 0.35), &previous));
    assert!(!condition.is_met(&Pose::new(2.3, 3.0, 1.0, 0.3), &previous));
    assert!(!condition.is_met(&Pose::new(2.0, 3.0, 1.0, 0.3 + 20f64.to_radians()), &previous));
}
