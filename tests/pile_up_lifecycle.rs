mod common;

use approx::{assert_abs_diff_eq, assert_relative_eq};
use nalgebra::Vector3;
use nbody_flow::config::FlowConfig;
use nbody_flow::geometry::{Barycentric, DegreesOfFreedom, Position, Vector};
use nbody_flow::physics::{Ephemeris, MassiveBody, TRUNK};
use nbody_flow::pile_up::{Part, PartId, Parts, PileUp};
use nbody_flow::serialization::{
    from_bytes, to_bytes, EphemerisMessage, PartMessage, PileUpMessage,
};

use crate::common::{ephemeris_at_rest, t};

const CONFIG: &str = r#"
[history]
integrator = "yoshida6"
step = 10.0

[prolongation]
integrator = "dormand_prince_54"
max_steps = 10000
length_integration_tolerance = 1e-6
speed_integration_tolerance = 1e-6
"#;

const EARTH_MU: f64 = 3.986_004_418e14;

#[test]
fn test_force_applied_mid_step() {
    // 2^40 m away from a 1 kg body, gravity is negligible.
    let distance = 1_099_511_627_776.0;
    let mut ephemeris =
        ephemeris_at_rest(MassiveBody::from_mass("Pebble", 1.0, 0.1).unwrap(), 1.0, 1.0);
    let config = FlowConfig::from_toml_str(CONFIG).unwrap();

    let satellite = PartId::new(1);
    let mut parts = Parts::new();
    parts.insert(
        satellite,
        Part::new(
            "satellite",
            1.0,
            DegreesOfFreedom::new(Position::new(distance, 0.0, 0.0), Vector::zero()),
        )
        .unwrap(),
    );
    let mut pile_up = PileUp::new(
        vec![satellite],
        &parts,
        t(0.0),
        config.prolongation,
        config.history,
    );

    pile_up.advance_time(&mut ephemeris, &mut parts, t(15.0)).unwrap();
    pile_up.nudge_parts(&mut parts);
    {
        let part = &parts[satellite];
        assert_abs_diff_eq!(
            *part.degrees_of_freedom().velocity.coordinates(),
            Vector3::zeros(),
            epsilon = 1e-20
        );
        assert_eq!(part.tail().size(TRUNK), 2);
        assert!(!part.tail_is_authoritative());
        assert_eq!(part.tail().last_authoritative(TRUNK).unwrap().0, t(10.0));
        assert_eq!(part.tail().last(TRUNK).unwrap().0, t(15.0));
    }

    let acceleration = Vector::new(1729.0, -168.0, 504.0);
    let mass = parts[satellite].mass();
    parts[satellite].increment_intrinsic_force(acceleration * mass);
    pile_up.set_intrinsic_force(parts[satellite].intrinsic_force());
    pile_up.advance_time(&mut ephemeris, &mut parts, t(20.0)).unwrap();
    pile_up.nudge_parts(&mut parts);

    let part = &parts[satellite];
    let velocity = part.degrees_of_freedom().velocity.coordinates();
    assert_relative_eq!(
        *velocity,
        0.5 * 10.0 * *acceleration.coordinates(),
        max_relative = 1e-9
    );
    let position = part.degrees_of_freedom().position.coordinates();
    assert_abs_diff_eq!(
        *position,
        Vector3::new(distance, 0.0, 0.0) + 12.5 * *acceleration.coordinates(),
        epsilon = 1e-2
    );
    assert_eq!(part.tail().size(TRUNK), 3);
    assert!(part.tail_is_authoritative());
    assert_eq!(part.tail().last(TRUNK).unwrap().0, t(20.0));
    assert_eq!(pile_up.psychohistory().size(TRUNK), 1);
}

fn orbiting_parts() -> Parts {
    let speed = (EARTH_MU / 7e6).sqrt();
    let mut parts = Parts::new();
    parts.insert(
        PartId::new(7),
        Part::new(
            "capsule",
            1000.0,
            DegreesOfFreedom::new(Position::new(7e6, 0.0, 0.0), Vector::new(0.0, speed, 0.0)),
        )
        .unwrap(),
    );
    parts.insert(
        PartId::new(8),
        Part::new(
            "engine",
            500.0,
            DegreesOfFreedom::new(
                Position::new(7e6 + 10.0, 0.0, 0.0),
                Vector::new(0.0, speed, 0.0),
            ),
        )
        .unwrap(),
    );
    parts
}

struct Snapshot {
    ephemeris: Vec<u8>,
    parts: Vec<Vec<u8>>,
    pile_up: Vec<u8>,
}

fn snapshot(ephemeris: &Ephemeris<Barycentric>, parts: &Parts, pile_up: &PileUp) -> Snapshot {
    Snapshot {
        ephemeris: to_bytes(&ephemeris.write_to_message()),
        parts: parts
            .iter()
            .map(|(id, part)| to_bytes(&part.write_to_message(id)))
            .collect(),
        pile_up: to_bytes(&pile_up.write_to_message()),
    }
}

#[test]
fn test_serialization_is_idempotent() {
    let config = FlowConfig::from_toml_str(CONFIG).unwrap();
    let mut ephemeris =
        ephemeris_at_rest(MassiveBody::new("Earth", EARTH_MU, 6.371e6).unwrap(), 10.0, 1e-3);
    let mut parts = orbiting_parts();
    let ids: Vec<PartId> = parts.ids().collect();
    let mut pile_up = PileUp::new(
        ids.clone(),
        &parts,
        t(0.0),
        config.prolongation,
        config.history,
    );

    pile_up.advance_time(&mut ephemeris, &mut parts, t(95.0)).unwrap();
    parts[ids[0]].increment_intrinsic_force(Vector::new(0.0, 10.0, 0.0));
    parts[ids[1]].increment_intrinsic_force(Vector::new(0.0, 5.0, 1.0));
    pile_up.set_intrinsic_force(
        parts[ids[0]].intrinsic_force() + parts[ids[1]].intrinsic_force(),
    );
    pile_up.advance_time(&mut ephemeris, &mut parts, t(130.0)).unwrap();
    pile_up.nudge_parts(&mut parts);

    let first = snapshot(&ephemeris, &parts, &pile_up);

    let mut restored_ephemeris =
        Ephemeris::read_from_message(&from_bytes::<EphemerisMessage>(&first.ephemeris).unwrap())
            .unwrap();
    let mut restored_parts = Parts::new();
    for bytes in &first.parts {
        let (id, part) =
            Part::read_from_message(&from_bytes::<PartMessage>(bytes).unwrap()).unwrap();
        restored_parts.insert(id, part);
    }
    let mut restored_pile_up = PileUp::read_from_message(
        &from_bytes::<PileUpMessage>(&first.pile_up).unwrap(),
        &restored_parts,
    )
    .unwrap();

    let second = snapshot(&restored_ephemeris, &restored_parts, &restored_pile_up);
    assert_eq!(second.ephemeris, first.ephemeris);
    assert_eq!(second.parts, first.parts);
    assert_eq!(second.pile_up, first.pile_up);

    // Both copies keep flowing the same way.
    pile_up.advance_time(&mut ephemeris, &mut parts, t(200.0)).unwrap();
    restored_pile_up
        .advance_time(&mut restored_ephemeris, &mut restored_parts, t(200.0))
        .unwrap();
    pile_up.nudge_parts(&mut parts);
    restored_pile_up.nudge_parts(&mut restored_parts);
    for id in &ids {
        let expected = parts[*id].degrees_of_freedom();
        let actual = restored_parts[*id].degrees_of_freedom();
        assert_abs_diff_eq!(
            *actual.position.coordinates(),
            *expected.position.coordinates(),
            epsilon = 1e-6
        );
        assert_abs_diff_eq!(
            *actual.velocity.coordinates(),
            *expected.velocity.coordinates(),
            epsilon = 1e-9
        );
    }

    // The pile-up is rigid.
    let separation = parts[ids[1]].degrees_of_freedom().position
        - parts[ids[0]].degrees_of_freedom().position;
    assert_relative_eq!(separation.norm(), 10.0, max_relative = 1e-9);
}

#[test]
fn test_deformed_pile_up_keeps_new_shape() {
    use nbody_flow::geometry::ApparentBubble;

    let config = FlowConfig::from_toml_str(CONFIG).unwrap();
    let mut ephemeris =
        ephemeris_at_rest(MassiveBody::new("Earth", EARTH_MU, 6.371e6).unwrap(), 10.0, 1e-3);
    let mut parts = orbiting_parts();
    let ids: Vec<PartId> = parts.ids().collect();
    let mut pile_up = PileUp::new(
        ids.clone(),
        &parts,
        t(0.0),
        config.prolongation,
        config.history,
    );

    // The engine reports the parts 20 m apart along z.
    pile_up.set_part_apparent_degrees_of_freedom(
        ids[0],
        DegreesOfFreedom::<ApparentBubble>::new(Position::new(0.0, 0.0, 0.0), Vector::zero()),
    );
    pile_up.set_part_apparent_degrees_of_freedom(
        ids[1],
        DegreesOfFreedom::<ApparentBubble>::new(Position::new(0.0, 0.0, 20.0), Vector::zero()),
    );
    pile_up.deform_pile_up_if_needed(&parts);
    pile_up.advance_time(&mut ephemeris, &mut parts, t(60.0)).unwrap();
    pile_up.nudge_parts(&mut parts);

    let separation = parts[ids[1]].degrees_of_freedom().position
        - parts[ids[0]].degrees_of_freedom().position;
    assert_abs_diff_eq!(
        *separation.coordinates(),
        Vector3::new(0.0, 0.0, 20.0),
        epsilon = 1e-6
    );
    for id in &ids {
        assert_eq!(parts[*id].tail().size(TRUNK), 6);
        assert!(parts[*id].tail_is_authoritative());
    }
}

#[test]
fn test_free_fall_needs_ephemeris_before_first_step() {
    use nbody_flow::config::EphemerisParameters;
    use nbody_flow::flow_errors::FlowError;
    use nbody_flow::time::Instant;

    let config = FlowConfig::from_toml_str(CONFIG).unwrap();
    let parameters = EphemerisParameters::builder()
        .fitting_tolerance(1e-3)
        .fixed_step(config.history)
        .build()
        .unwrap();
    let mut ephemeris = Ephemeris::new(
        vec![MassiveBody::new("Earth", EARTH_MU, 6.371e6).unwrap()],
        &[DegreesOfFreedom::default()],
        Instant::J2000,
        parameters,
    )
    .unwrap();
    let mut parts = orbiting_parts();
    let ids: Vec<PartId> = parts.ids().collect();
    let mut pile_up = PileUp::new(
        ids.clone(),
        &parts,
        t(0.0),
        config.prolongation,
        config.history,
    );

    // The first Yoshida substep looks before J2000.
    assert!(matches!(
        pile_up.advance_time(&mut ephemeris, &mut parts, t(60.0)),
        Err(FlowError::OutOfRange { .. })
    ));
    for id in &ids {
        assert!(parts[*id].tail().is_empty(TRUNK));
    }

    // From a later start, the same pile-up flows.
    let mut pile_up = PileUp::new(
        ids.clone(),
        &parts,
        t(30.0),
        config.prolongation,
        config.history,
    );
    pile_up.advance_time(&mut ephemeris, &mut parts, t(60.0)).unwrap();
    for id in &ids {
        assert_eq!(parts[*id].tail().size(TRUNK), 3);
        assert!(parts[*id].tail_is_authoritative());
    }
}
