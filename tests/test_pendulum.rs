//! Planar double pendulum of point masses checked against its closed-form equations of motion.

use approx::{assert_abs_diff_eq, assert_relative_eq};
use kinetree::{
    BodyIndex, FrameIndex, MultibodyForces, MultibodyTree, MultibodyTreeContext, RevoluteJoint, SpatialInertia,
};
use nalgebra::{DMatrix, DVector, Isometry3, Matrix2, Point3, Translation3, UnitQuaternion, Vector2, Vector3};

const M1: f64 = 1.5;
const M2: f64 = 0.8;
const L1: f64 = 1.2;
const L2: f64 = 0.7;
const G: f64 = 9.81;

/// Both links point along their body x axis and rotate about z; gravity acts along -y.
fn double_pendulum() -> (MultibodyTree<f64>, BodyIndex, BodyIndex) {
    let mut tree = MultibodyTree::new();
    let upper = tree
        .add_rigid_body("upper", SpatialInertia::point_mass(M1, Vector3::new(L1, 0.0, 0.0)))
        .unwrap();
    let lower = tree
        .add_rigid_body("lower", SpatialInertia::point_mass(M2, Vector3::new(L2, 0.0, 0.0)))
        .unwrap();
    let elbow_offset = Isometry3::from_parts(Translation3::new(L1, 0.0, 0.0), UnitQuaternion::identity());
    let elbow = tree.add_frame("elbow", upper, elbow_offset).unwrap();
    let upper_frame = tree.body(upper).unwrap().body_frame();
    let lower_frame = tree.body(lower).unwrap().body_frame();
    tree.add_joint("shoulder", FrameIndex::WORLD, upper_frame, RevoluteJoint::new(Vector3::z()))
        .unwrap();
    tree.add_joint("elbow", elbow, lower_frame, RevoluteJoint::new(Vector3::z()))
        .unwrap();
    tree.add_uniform_gravity_field(Vector3::new(0.0, -G, 0.0)).unwrap();
    tree.finalize().unwrap();
    (tree, upper, lower)
}

fn context_at(tree: &MultibodyTree<f64>, q: [f64; 2], v: [f64; 2]) -> MultibodyTreeContext<f64> {
    let mut context = tree.create_default_context().unwrap();
    context.set_positions(&q).unwrap();
    context.set_velocities(&v).unwrap();
    context
}

fn expected_mass_matrix(theta2: f64) -> Matrix2<f64> {
    let m11 = M1 * L1 * L1 + M2 * (L1 * L1 + L2 * L2 + 2.0 * L1 * L2 * theta2.cos());
    let m12 = M2 * (L2 * L2 + L1 * L2 * theta2.cos());
    let m22 = M2 * L2 * L2;
    Matrix2::new(m11, m12, m12, m22)
}

fn expected_bias(theta2: f64, [w1, w2]: [f64; 2]) -> Vector2<f64> {
    let h = M2 * L1 * L2 * theta2.sin();
    Vector2::new(-h * (2.0 * w1 * w2 + w2 * w2), h * w1 * w1)
}

fn expected_gravity_forces([t1, t2]: [f64; 2]) -> Vector2<f64> {
    Vector2::new(
        -(M1 + M2) * G * L1 * t1.cos() - M2 * G * L2 * (t1 + t2).cos(),
        -M2 * G * L2 * (t1 + t2).cos(),
    )
}

fn expected_potential_energy([t1, t2]: [f64; 2]) -> f64 {
    M1 * G * L1 * t1.sin() + M2 * G * (L1 * t1.sin() + L2 * (t1 + t2).sin())
}

#[test_log::test]
fn test_mass_matrix_matches_closed_form() {
    let (tree, _, _) = double_pendulum();
    for q in [[0.0, 0.0], [0.3, -1.1], [-2.0, 2.5]] {
        let context = context_at(&tree, q, [0.0, 0.0]);
        let mass_matrix = tree.calc_mass_matrix_via_inverse_dynamics(&context).unwrap();
        let expected = expected_mass_matrix(q[1]);
        assert_relative_eq!(mass_matrix, DMatrix::from_column_slice(2, 2, expected.as_slice()), epsilon = 1e-12);
        assert_relative_eq!(mass_matrix.clone(), mass_matrix.transpose(), epsilon = 1e-12);
        assert!(mass_matrix.cholesky().is_some());
    }
}

#[test_log::test]
fn test_bias_term_matches_closed_form() {
    let (tree, _, _) = double_pendulum();
    let (q, v) = ([0.4, 0.9], [1.3, -0.6]);
    let context = context_at(&tree, q, v);
    let bias = tree.calc_bias_term(&context).unwrap();
    let expected = expected_bias(q[1], v);
    assert_abs_diff_eq!(bias[0], expected[0], epsilon = 1e-12);
    assert_abs_diff_eq!(bias[1], expected[1], epsilon = 1e-12);
}

#[test_log::test]
fn test_inverse_dynamics_is_affine_in_vdot() {
    let (tree, _, _) = double_pendulum();
    let context = context_at(&tree, [0.7, -0.2], [0.5, 2.0]);
    let forces = MultibodyForces::new(&tree).unwrap();
    let zero = DVector::zeros(2);
    let vdot = DVector::from_vec(vec![-1.0, 3.0]);

    let id_zero = tree.calc_inverse_dynamics(&context, &zero, &forces).unwrap();
    assert_relative_eq!(id_zero, tree.calc_bias_term(&context).unwrap(), epsilon = 1e-12);

    let id = tree.calc_inverse_dynamics(&context, &vdot, &forces).unwrap();
    let mass_matrix = tree.calc_mass_matrix_via_inverse_dynamics(&context).unwrap();
    assert_relative_eq!(id - id_zero, mass_matrix * vdot, epsilon = 1e-12);
}

#[test_log::test]
fn test_gravity_and_potential_energy() {
    let (tree, _, _) = double_pendulum();
    let q = [0.25, 1.0];
    let context = context_at(&tree, q, [0.0, 0.0]);

    let tau_g = tree.calc_gravity_generalized_forces(&context).unwrap();
    let expected = expected_gravity_forces(q);
    assert_abs_diff_eq!(tau_g[0], expected[0], epsilon = 1e-12);
    assert_abs_diff_eq!(tau_g[1], expected[1], epsilon = 1e-12);

    let energy = tree.calc_potential_energy(&context).unwrap();
    assert_abs_diff_eq!(energy, expected_potential_energy(q), epsilon = 1e-12);

    // Gravity forces from the force elements enter inverse dynamics with a minus sign.
    let pc = tree.eval_position_kinematics(&context).unwrap();
    let vc = tree.eval_velocity_kinematics(&context).unwrap();
    let mut forces = MultibodyForces::new(&tree).unwrap();
    tree.calc_force_elements_contribution(&context, pc, vc, &mut forces).unwrap();
    let id = tree.calc_inverse_dynamics(&context, &DVector::zeros(2), &forces).unwrap();
    assert_relative_eq!(id, -tau_g, epsilon = 1e-12);
}

#[test_log::test]
fn test_conservative_power_is_minus_energy_rate() {
    let (tree, _, _) = double_pendulum();
    let (q, v) = ([0.6, -0.4], [1.1, 0.3]);
    let context = context_at(&tree, q, v);
    let power = tree.calc_conservative_power(&context).unwrap();

    let h = 1e-6;
    let energy_at = |sign: f64| expected_potential_energy([q[0] + sign * h * v[0], q[1] + sign * h * v[1]]);
    let energy_rate = (energy_at(1.0) - energy_at(-1.0)) / (2.0 * h);
    assert_abs_diff_eq!(power, -energy_rate, epsilon = 1e-6);
}

#[test_log::test]
fn test_forward_dynamics_inverts_inverse_dynamics() {
    let (tree, _, _) = double_pendulum();
    let context = context_at(&tree, [0.1, 0.8], [-0.7, 1.4]);
    let pc = tree.eval_position_kinematics(&context).unwrap();
    let vc = tree.eval_velocity_kinematics(&context).unwrap();
    let mut forces = MultibodyForces::new(&tree).unwrap();
    tree.calc_force_elements_contribution(&context, pc, vc, &mut forces).unwrap();

    let vdot = tree.calc_forward_dynamics_via_mass_matrix(&context, &forces).unwrap();
    let residual = tree.calc_inverse_dynamics(&context, &vdot, &forces).unwrap();
    assert_abs_diff_eq!(residual, DVector::<f64>::zeros(2), epsilon = 1e-10);
}

#[test_log::test]
fn test_tip_position_and_jacobian() {
    let (tree, _, lower) = double_pendulum();
    let (q, v) = ([0.5, 0.4], [0.9, -1.7]);
    let context = context_at(&tree, q, v);
    let lower_frame = tree.body(lower).unwrap().body_frame();
    let p_tip = Vector3::new(L2, 0.0, 0.0);

    let x_wb = tree.eval_body_pose_in_world(&context, lower).unwrap();
    let expected_tip = Vector3::new(
        L1 * q[0].cos() + L2 * (q[0] + q[1]).cos(),
        L1 * q[0].sin() + L2 * (q[0] + q[1]).sin(),
        0.0,
    );
    assert_relative_eq!((x_wb * Point3::from(p_tip)).coords, expected_tip, epsilon = 1e-12);

    let jacobian = tree
        .calc_frame_geometric_jacobian_expressed_in_world(&context, lower_frame, &p_tip)
        .unwrap();
    let v_tip = &jacobian * DVector::from_column_slice(&v);
    let expected_v = Vector3::new(
        -L1 * q[0].sin() * v[0] - L2 * (q[0] + q[1]).sin() * (v[0] + v[1]),
        L1 * q[0].cos() * v[0] + L2 * (q[0] + q[1]).cos() * (v[0] + v[1]),
        0.0,
    );
    assert_relative_eq!(v_tip.fixed_rows::<3>(3).clone_owned(), expected_v, epsilon = 1e-12);
    assert_abs_diff_eq!(v_tip[2], v[0] + v[1], epsilon = 1e-12);
}

#[test]
fn test_world_body_is_first() {
    let (tree, _, _) = double_pendulum();
    assert_eq!(tree.world_body().index(), BodyIndex::WORLD);
    assert_eq!(tree.get_body_by_name("WorldBody").unwrap().index(), BodyIndex::WORLD);
}
