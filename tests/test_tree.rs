use approx::{assert_abs_diff_eq, assert_relative_eq};
use kinetree::{
    BodyIndex, FrameIndex, ModelInstanceIndex, MultibodyForces, MultibodyTree, PrismaticJoint, RevoluteJoint,
    SpatialAcceleration, SpatialForce, SpatialInertia, SpatialVelocity, TreeError, VelocityKinematicsCache,
};
use nalgebra::{
    DMatrix, DVector, Isometry3, Matrix3xX, Matrix6, Point3, Translation3, UnitQuaternion, Vector3, Vector6,
};

fn offset(x: f64, y: f64, z: f64, axisangle: Vector3<f64>) -> Isometry3<f64> {
    Isometry3::from_parts(Translation3::new(x, y, z), UnitQuaternion::from_scaled_axis(axisangle))
}

/// world -pin(z)-> a -slider(x)-> b -pin(y)-> c, with offset and tilted joint frames.
fn spatial_chain() -> (MultibodyTree<f64>, [BodyIndex; 3]) {
    let mut tree = MultibodyTree::new();
    let a = tree.add_rigid_body("a", SpatialInertia::solid_box(2.0, 0.4, 0.1, 0.2)).unwrap();
    let b = tree
        .add_rigid_body(
            "b",
            SpatialInertia::from_central_inertia(
                1.0,
                Vector3::new(0.1, 0.0, 0.05),
                SpatialInertia::solid_sphere(1.0, 0.2).central_inertia(),
            ),
        )
        .unwrap();
    let c = tree.add_rigid_body("c", SpatialInertia::solid_box(0.5, 0.1, 0.6, 0.1)).unwrap();
    let (fa, fb) = (tree.body(a).unwrap().body_frame(), tree.body(b).unwrap().body_frame());
    let a_out = tree.add_frame("a_out", a, offset(0.5, 0.0, 0.2, Vector3::new(0.0, 0.3, 0.0))).unwrap();
    let b_out = tree.add_frame("b_out", b, offset(0.0, 0.3, 0.0, Vector3::new(0.2, 0.0, 0.1))).unwrap();
    let c_in = tree.add_frame("c_in", c, offset(0.0, -0.1, 0.0, Vector3::zeros())).unwrap();
    tree.add_joint("pin_a", FrameIndex::WORLD, fa, RevoluteJoint::new(Vector3::z())).unwrap();
    tree.add_joint("slider_b", a_out, fb, PrismaticJoint::new(Vector3::x())).unwrap();
    tree.add_joint("pin_c", b_out, c_in, RevoluteJoint::new(Vector3::y())).unwrap();
    tree.add_uniform_gravity_field(Vector3::new(0.0, 0.0, -9.81)).unwrap();
    tree.finalize().unwrap();
    (tree, [a, b, c])
}

fn chain_context(tree: &MultibodyTree<f64>, q: &[f64], v: &[f64]) -> kinetree::MultibodyTreeContext<f64> {
    let mut context = tree.create_default_context().unwrap();
    context.set_positions(q).unwrap();
    context.set_velocities(v).unwrap();
    context
}

#[test_log::test]
fn test_counts_after_finalize() {
    let (mut tree, _) = spatial_chain();
    assert_eq!(tree.num_bodies(), 4);
    assert_eq!(tree.num_mobilizers(), 3);
    assert_eq!(tree.num_positions().unwrap(), 3);
    assert_eq!(tree.num_velocities().unwrap(), 3);
    assert_eq!(tree.num_states().unwrap(), 6);
    assert_eq!(tree.tree_height().unwrap(), 4);

    let nodes = tree.body_nodes().unwrap();
    assert_eq!(nodes.len(), tree.num_bodies());
    let velocities: usize = nodes.iter().map(|node| node.topology().num_mobilizer_velocities).sum();
    assert_eq!(velocities, 3);
    for (i, node) in nodes.iter().enumerate() {
        assert_eq!(node.index().0, i);
        if let Some(parent) = node.parent() {
            assert_eq!(nodes[parent.0].level() + 1, node.level());
        }
    }

    assert_eq!(
        tree.add_rigid_body("late", SpatialInertia::zero()),
        Err(TreeError::AlreadyFinalized("add_rigid_body"))
    );
    assert_eq!(tree.finalize(), Err(TreeError::AlreadyFinalized("finalize")));
}

#[test_log::test]
fn test_queries_before_finalize_fail() {
    let mut tree = MultibodyTree::<f64>::new();
    tree.add_rigid_body("a", SpatialInertia::solid_sphere(1.0, 0.1)).unwrap();
    assert_eq!(tree.num_positions(), Err(TreeError::NotFinalized("num_positions")));
    assert!(matches!(tree.create_default_context(), Err(TreeError::NotFinalized("create_default_context"))));
    assert!(matches!(tree.body_nodes(), Err(TreeError::NotFinalized(_))));
}

#[test_log::test]
fn test_failed_finalize_rolls_back() {
    let mut tree = MultibodyTree::<f64>::new();
    let a = tree.add_rigid_body("a", SpatialInertia::solid_sphere(1.0, 0.1)).unwrap();
    let b = tree.add_rigid_body("b", SpatialInertia::solid_sphere(1.0, 0.1)).unwrap();
    let (fa, fb) = (tree.body(a).unwrap().body_frame(), tree.body(b).unwrap().body_frame());
    tree.add_joint("ab", fa, fb, RevoluteJoint::new(Vector3::z())).unwrap();
    tree.add_joint("ba", fb, fa, RevoluteJoint::new(Vector3::z())).unwrap();

    assert!(matches!(tree.finalize(), Err(TreeError::Disconnected(_))));
    assert_eq!(tree.num_mobilizers(), 0);
    assert!(tree.joints().iter().all(|joint| joint.implementation().is_none()));
    // Still building.
    tree.add_rigid_body("c", SpatialInertia::zero()).unwrap();
}

#[test_log::test]
fn test_second_inboard_mobilizer_is_rejected() {
    let mut tree = MultibodyTree::<f64>::new();
    let a = tree.add_rigid_body("a", SpatialInertia::solid_sphere(1.0, 0.1)).unwrap();
    let fa = tree.body(a).unwrap().body_frame();
    tree.add_joint("first", FrameIndex::WORLD, fa, RevoluteJoint::new(Vector3::z())).unwrap();
    tree.add_joint("second", FrameIndex::WORLD, fa, PrismaticJoint::new(Vector3::z())).unwrap();
    assert_eq!(tree.finalize(), Err(TreeError::InboardMobilizerExists(a)));
    assert_eq!(tree.num_mobilizers(), 0);
}

#[test_log::test]
fn test_names_are_unique_per_instance() {
    let mut tree = MultibodyTree::<f64>::new();
    let left = tree.add_model_instance("left").unwrap();
    tree.add_rigid_body("link", SpatialInertia::zero()).unwrap();
    tree.add_rigid_body_in_instance("link", left, SpatialInertia::zero()).unwrap();
    assert!(matches!(tree.add_rigid_body("link", SpatialInertia::zero()), Err(TreeError::NotUnique { .. })));
    assert!(matches!(tree.get_body_by_name("link"), Err(TreeError::NotUnique { .. })));
    assert!(matches!(tree.add_model_instance("left"), Err(TreeError::NotUnique { .. })));
    assert_eq!(tree.get_model_instance_by_name("DefaultModelInstance"), Ok(ModelInstanceIndex::DEFAULT));
}

#[test_log::test]
fn test_context_memoizes_and_invalidates() {
    let (tree, [_, _, c]) = spatial_chain();
    let mut context = chain_context(&tree, &[0.1, 0.2, 0.3], &[1.0, 0.0, -1.0]);
    assert!(!context.has_position_kinematics());

    let x_wc = tree.eval_body_pose_in_world(&context, c).unwrap();
    tree.eval_velocity_kinematics(&context).unwrap();
    assert!(context.has_position_kinematics() && context.has_velocity_kinematics());
    assert_eq!(tree.eval_body_pose_in_world(&context, c).unwrap(), x_wc);

    context.set_velocities(&[0.0, 0.0, 0.0]).unwrap();
    assert!(context.has_position_kinematics());
    assert!(!context.has_velocity_kinematics());

    context.positions_mut()[0] = 1.0;
    assert!(!context.has_position_kinematics());
    assert_ne!(tree.eval_body_pose_in_world(&context, c).unwrap(), x_wc);
}

#[test_log::test]
fn test_forward_kinematics_is_idempotent() {
    let (tree, _) = spatial_chain();
    let (q, v) = ([0.4, -0.25, 1.3], [0.7, 2.0, -1.5]);
    let first = chain_context(&tree, &q, &v);
    let mut second = chain_context(&tree, &q, &v);

    let poses = tree.calc_all_body_poses_in_world(&first).unwrap();
    let velocities = tree.calc_all_body_spatial_velocities_in_world(&first).unwrap();
    assert_eq!(tree.calc_all_body_poses_in_world(&second).unwrap(), poses);
    assert_eq!(tree.calc_all_body_spatial_velocities_in_world(&second).unwrap(), velocities);

    // Writing the same state back drops the caches, so the next queries recompute from scratch.
    let state = second.state().clone();
    second.set_state(&state).unwrap();
    assert!(!second.has_position_kinematics());
    assert_eq!(tree.calc_all_body_poses_in_world(&second).unwrap(), poses);
    assert_eq!(tree.calc_all_body_spatial_velocities_in_world(&second).unwrap(), velocities);
}

#[test_log::test]
fn test_inverse_dynamics_rejects_wrong_size_caches() {
    let (tree, _) = spatial_chain();
    let context = chain_context(&tree, &[0.1, 0.2, 0.3], &[1.0, 0.0, -1.0]);
    let pc = tree.eval_position_kinematics(&context).unwrap();
    let num_nodes = tree.num_bodies();
    let mut a_wb = vec![SpatialAcceleration::<f64>::zero(); num_nodes];
    let mut f_bbo_w = vec![SpatialForce::<f64>::zero(); num_nodes];
    let mut tau = vec![0.0; 3];

    let short = VelocityKinematicsCache::zero(1);
    assert_eq!(
        tree.calc_inverse_dynamics_with_caches(
            &context,
            pc,
            &short,
            &[0.0; 3],
            None,
            None,
            &mut a_wb,
            &mut f_bbo_w,
            &mut tau
        ),
        Err(TreeError::DimensionMismatch {
            what: "velocity kinematics",
            expected: num_nodes,
            actual: 1,
        })
    );
    assert_eq!(tau, vec![0.0; 3]);
}

#[test_log::test]
fn test_zero_joint_axis_is_rejected() {
    let mut tree = MultibodyTree::<f64>::new();
    let a = tree.add_rigid_body("a", SpatialInertia::solid_sphere(1.0, 0.1)).unwrap();
    let fa = tree.body(a).unwrap().body_frame();
    tree.add_joint("pin", FrameIndex::WORLD, fa, RevoluteJoint::new(Vector3::zeros())).unwrap();
    assert_eq!(tree.finalize(), Err(TreeError::ZeroAxis("revolute")));
    assert_eq!(tree.num_mobilizers(), 0);

    let mut tree = MultibodyTree::<f64>::new();
    let a = tree.add_rigid_body("a", SpatialInertia::solid_sphere(1.0, 0.1)).unwrap();
    let fa = tree.body(a).unwrap().body_frame();
    tree.add_joint("slider", FrameIndex::WORLD, fa, PrismaticJoint::new(Vector3::zeros())).unwrap();
    assert_eq!(tree.finalize(), Err(TreeError::ZeroAxis("prismatic")));
}

#[test_log::test]
fn test_body_force_lands_on_its_body_node() {
    // Declared tip first, so body and body node indices disagree.
    let mut tree = MultibodyTree::<f64>::new();
    let tip = tree.add_rigid_body("tip", SpatialInertia::solid_sphere(1.0, 0.1)).unwrap();
    let base = tree.add_rigid_body("base", SpatialInertia::solid_sphere(2.0, 0.1)).unwrap();
    let (f_tip, f_base) = (tree.body(tip).unwrap().body_frame(), tree.body(base).unwrap().body_frame());
    tree.add_joint("pin", FrameIndex::WORLD, f_base, RevoluteJoint::new(Vector3::z())).unwrap();
    tree.add_joint("slider", f_base, f_tip, PrismaticJoint::new(Vector3::x())).unwrap();

    let force = SpatialForce::new(Vector3::zeros(), Vector3::new(2.0, 0.0, 0.0));
    let mut early = MultibodyForces::zeros(3, 2);
    assert_eq!(
        early.add_in_body_force_on(&tree, tip, force),
        Err(TreeError::NotFinalized("add_in_body_force_on"))
    );

    tree.finalize().unwrap();
    let tip_node = tree.body(tip).unwrap().node_index().unwrap();
    assert_ne!(tip_node.0, tip.0);

    let mut forces = MultibodyForces::new(&tree).unwrap();
    forces.add_in_body_force_on(&tree, tip, force).unwrap();
    assert_eq!(forces.body_forces()[tip_node.0], force);

    // At the zero configuration the push along x only loads the slider.
    let context = tree.create_default_context().unwrap();
    let tau = tree.calc_inverse_dynamics(&context, &DVector::zeros(2), &forces).unwrap();
    assert_abs_diff_eq!(tau, DVector::from_vec(vec![0.0, -2.0]), epsilon = 1e-14);
}

#[test_log::test]
fn test_context_of_another_tree_is_rejected() {
    let (tree, _) = spatial_chain();
    let (other, _) = spatial_chain();
    let context = other.create_default_context().unwrap();
    assert_eq!(tree.calc_bias_term(&context), Err(TreeError::IncompatibleContext));
    assert!(matches!(tree.eval_position_kinematics(&context), Err(TreeError::IncompatibleContext)));
}

#[test_log::test]
fn test_zero_configuration_two_body_chain() {
    let mut tree = MultibodyTree::<f64>::new();
    let inertia_a = SpatialInertia::solid_box(2.0, 0.3, 0.2, 0.1);
    let inertia_b = SpatialInertia::solid_box(1.0, 0.1, 0.1, 0.4);
    let a = tree.add_rigid_body("a", inertia_a).unwrap();
    let b = tree.add_rigid_body("b", inertia_b).unwrap();
    let (fa, fb) = (tree.body(a).unwrap().body_frame(), tree.body(b).unwrap().body_frame());
    tree.add_joint("ja", FrameIndex::WORLD, fa, RevoluteJoint::new(Vector3::z())).unwrap();
    tree.add_joint("jb", fa, fb, RevoluteJoint::new(Vector3::z())).unwrap();
    tree.finalize().unwrap();
    let context = tree.create_default_context().unwrap();

    for pose in tree.calc_all_body_poses_in_world(&context).unwrap() {
        assert_relative_eq!(pose, Isometry3::identity());
    }
    for velocity in tree.calc_all_body_spatial_velocities_in_world(&context).unwrap() {
        assert_eq!(velocity, SpatialVelocity::zero());
    }

    let (ia, ib) = (inertia_a.rotational_inertia()[(2, 2)], inertia_b.rotational_inertia()[(2, 2)]);
    let mass_matrix = tree.calc_mass_matrix_via_inverse_dynamics(&context).unwrap();
    assert_relative_eq!(mass_matrix, DMatrix::from_row_slice(2, 2, &[ia + ib, ib, ib, ib]), epsilon = 1e-14);
    assert_abs_diff_eq!(tree.calc_bias_term(&context).unwrap(), DVector::<f64>::zeros(2), epsilon = 1e-14);
    assert_eq!(tree.calc_gravity_generalized_forces(&context).unwrap(), DVector::<f64>::zeros(2));
}

#[test_log::test]
fn test_free_body() {
    let mut tree = MultibodyTree::<f64>::new();
    let inertia = SpatialInertia::from_central_inertia(
        3.0,
        Vector3::new(0.1, -0.2, 0.05),
        SpatialInertia::solid_box(3.0, 0.5, 0.2, 0.3).central_inertia(),
    );
    let body = tree.add_rigid_body("floating", inertia).unwrap();
    tree.finalize().unwrap();
    assert_eq!((tree.num_positions().unwrap(), tree.num_velocities().unwrap()), (7, 6));
    assert!(tree.get_free_body_mobilizer(body).is_ok());
    assert!(matches!(
        tree.get_free_body_mobilizer(BodyIndex::WORLD),
        Err(TreeError::NotFreeBody(_))
    ));

    let mut context = tree.create_default_context().unwrap();
    assert_eq!(context.positions()[0], 1.0);
    let x_wb = offset(1.0, -2.0, 0.5, Vector3::new(0.3, -0.1, 0.7));
    let v_wb = SpatialVelocity::new(Vector3::new(0.2, 0.4, -0.1), Vector3::new(1.0, 0.0, 2.0));
    tree.set_free_body_pose(&mut context, body, &x_wb).unwrap();
    tree.set_free_body_spatial_velocity(&mut context, body, &v_wb).unwrap();
    assert_relative_eq!(tree.eval_body_pose_in_world(&context, body).unwrap(), x_wb, epsilon = 1e-14);
    assert_relative_eq!(
        tree.eval_body_spatial_velocity_in_world(&context, body).unwrap().to_vector6(),
        v_wb.to_vector6(),
        epsilon = 1e-14
    );

    let body_frame = tree.body(body).unwrap().body_frame();
    let jacobian = tree
        .calc_frame_geometric_jacobian_expressed_in_world(&context, body_frame, &Vector3::zeros())
        .unwrap();
    assert_relative_eq!(Matrix6::from_column_slice(jacobian.as_slice()), Matrix6::identity(), epsilon = 1e-14);

    let mass_matrix = tree.calc_mass_matrix_via_inverse_dynamics(&context).unwrap();
    let expected = inertia.re_express(&x_wb.rotation).to_matrix();
    assert_relative_eq!(mass_matrix, DMatrix::from_column_slice(6, 6, expected.as_slice()), epsilon = 1e-12);

    let v = DVector::from_column_slice(context.velocities());
    let qdot = tree.map_velocity_to_qdot(&context, &v).unwrap();
    assert_relative_eq!(tree.map_qdot_to_velocity(&context, &qdot).unwrap(), v, epsilon = 1e-12);
}

#[test_log::test]
fn test_jacobian_maps_velocities() {
    let (tree, [_, b, c]) = spatial_chain();
    let v = [0.7, -0.3, 1.9];
    let context = chain_context(&tree, &[0.4, 0.25, -0.8], &v);
    let v = DVector::from_column_slice(&v);

    let c_frame = tree.body(c).unwrap().body_frame();
    let jacobian = tree
        .calc_frame_geometric_jacobian_expressed_in_world(&context, c_frame, &Vector3::zeros())
        .unwrap();
    let v_wc = tree.eval_body_spatial_velocity_in_world(&context, c).unwrap();
    assert_relative_eq!(&jacobian * &v, v_wc.to_vector6(), epsilon = 1e-12);

    // Points given in b's frame: the stacked Jacobian equals the translational rows of each point's Jacobian.
    let b_frame = tree.body(b).unwrap().body_frame();
    let points = Matrix3xX::from_columns(&[Vector3::new(0.1, 0.2, 0.3), Vector3::new(-0.5, 0.0, 0.4)]);
    let (p_wqi, stacked) = tree
        .calc_points_geometric_jacobian_expressed_in_world(&context, b_frame, &points)
        .unwrap();
    let x_wb = tree.eval_body_pose_in_world(&context, b).unwrap();
    for (i, p_bq) in points.column_iter().enumerate() {
        let single = tree
            .calc_frame_geometric_jacobian_expressed_in_world(&context, b_frame, &p_bq.clone_owned())
            .unwrap();
        let translational = DMatrix::from_iterator(3, 3, single.fixed_rows::<3>(3).iter().copied());
        assert_relative_eq!(stacked.rows(3 * i, 3).clone_owned(), translational, epsilon = 1e-14);
        let p_wq = x_wb * Point3::from(p_bq.clone_owned());
        assert_relative_eq!(p_wqi.column(i).clone_owned(), p_wq.coords, epsilon = 1e-14);
    }
    assert_relative_eq!(
        tree.calc_points_positions(&context, b_frame, &points, FrameIndex::WORLD).unwrap(),
        p_wqi,
        epsilon = 1e-14
    );
}

#[test_log::test]
fn test_jacobian_bias_matches_finite_difference() {
    let (tree, [_, _, c]) = spatial_chain();
    let (q, v) = ([0.4, 0.25, -0.8], [0.7, -0.3, 1.9]);
    let context = chain_context(&tree, &q, &v);
    let c_frame = tree.body(c).unwrap().body_frame();
    let p_cq = Vector3::new(0.05, 0.3, -0.1);

    // Every mobilizer in the chain has qdot = v.
    let jacobian_at = |sign: f64| {
        let h = 1e-6;
        let shifted: Vec<f64> = q.iter().zip(&v).map(|(qi, vi)| qi + sign * h * vi).collect();
        let context = chain_context(&tree, &shifted, &v);
        tree.calc_frame_geometric_jacobian_expressed_in_world(&context, c_frame, &p_cq)
            .unwrap()
    };
    let jdot = (jacobian_at(1.0) - jacobian_at(-1.0)) / 2e-6;
    let expected: Vector6<f64> = jdot * DVector::from_column_slice(&v);

    let bias = tree
        .calc_bias_for_frame_geometric_jacobian_expressed_in_world(&context, c_frame, &p_cq)
        .unwrap();
    assert_relative_eq!(bias, expected, epsilon = 1e-6);

    let points = Matrix3xX::from_columns(&[p_cq]);
    let points_bias = tree
        .calc_bias_for_points_geometric_jacobian_expressed_in_world(&context, c_frame, &points)
        .unwrap();
    assert_eq!(points_bias.len(), 3);
    assert_relative_eq!(
        Vector3::from_column_slice(points_bias.as_slice()),
        bias.fixed_rows::<3>(3).clone_owned(),
        epsilon = 1e-12
    );
}

#[test_log::test]
fn test_spatial_accelerations_from_vdot() {
    let (tree, [_, _, c]) = spatial_chain();
    let (q, v) = ([0.4, 0.25, -0.8], [0.7, -0.3, 1.9]);
    let context = chain_context(&tree, &q, &v);
    let vdot = DVector::from_vec(vec![0.5, 1.5, -2.0]);

    let c_frame = tree.body(c).unwrap().body_frame();
    let jacobian = tree
        .calc_frame_geometric_jacobian_expressed_in_world(&context, c_frame, &Vector3::zeros())
        .unwrap();
    let bias = tree
        .calc_bias_for_frame_geometric_jacobian_expressed_in_world(&context, c_frame, &Vector3::zeros())
        .unwrap();
    let accelerations = tree.calc_spatial_accelerations_from_vdot(&context, &vdot).unwrap();
    let expected: Vector6<f64> = jacobian * &vdot + bias;
    assert_relative_eq!(accelerations[c.0].to_vector6(), expected, epsilon = 1e-12);
}

#[test_log::test]
fn test_articulated_body_inertia_annihilates_hinge() {
    let (tree, _) = spatial_chain();
    let context = chain_context(&tree, &[0.4, 0.25, -0.8], &[0.0; 3]);
    let abic = tree.eval_articulated_body_inertia(&context).unwrap();
    let hc = tree.eval_hinge_matrices(&context).unwrap();
    for node in tree.body_nodes().unwrap().iter().skip(1) {
        let h = hc.block(node.topology());
        let residual = abic.p_plus_pb_w(node.index()).matrix() * h;
        assert!(residual.amax() < 1e-12, "node {}: {residual}", node.index());

        let p = abic.p_b_w(node.index()).matrix();
        assert_relative_eq!(p.clone(), p.transpose(), epsilon = 1e-12);
    }
}

#[test_log::test]
fn test_joint_damping() {
    let mut tree = MultibodyTree::<f64>::new();
    let a = tree.add_rigid_body("a", SpatialInertia::solid_sphere(1.0, 0.1)).unwrap();
    let fa = tree.body(a).unwrap().body_frame();
    tree.add_joint("ja", FrameIndex::WORLD, fa, RevoluteJoint::new(Vector3::x()).with_damping(0.3))
        .unwrap();
    tree.finalize().unwrap();
    let context = chain_context(&tree, &[0.0], &[2.0]);
    let pc = tree.eval_position_kinematics(&context).unwrap();
    let vc = tree.eval_velocity_kinematics(&context).unwrap();
    let mut forces = MultibodyForces::new(&tree).unwrap();
    forces.generalized_forces_mut()[0] = 10.0;
    tree.calc_force_elements_contribution(&context, pc, vc, &mut forces).unwrap();
    assert_abs_diff_eq!(forces.generalized_forces()[0], -0.6);
    assert_abs_diff_eq!(tree.calc_potential_energy(&context).unwrap(), 0.0);
}

#[test_log::test]
fn test_relative_transform() {
    let (tree, [a, _, c]) = spatial_chain();
    let context = chain_context(&tree, &[0.4, 0.25, -0.8], &[0.0; 3]);
    let (fa, fc) = (tree.body(a).unwrap().body_frame(), tree.body(c).unwrap().body_frame());
    let x_ac = tree.calc_relative_transform(&context, fa, fc).unwrap();
    let x_ca = tree.calc_relative_transform(&context, fc, fa).unwrap();
    assert_relative_eq!(x_ac * x_ca, Isometry3::identity(), epsilon = 1e-14);

    let x_wa = tree.calc_frame_pose_in_world(&context, fa).unwrap();
    let x_wc = tree.calc_frame_pose_in_world(&context, fc).unwrap();
    assert_relative_eq!(x_wa * x_ac, x_wc, epsilon = 1e-14);

    let c_in = tree.get_frame_by_name("c_in").unwrap().index();
    let x_wc_in = tree.calc_frame_pose_in_world(&context, c_in).unwrap();
    assert_relative_eq!(x_wc_in, x_wc * offset(0.0, -0.1, 0.0, Vector3::zeros()), epsilon = 1e-14);
}

#[test_log::test]
fn test_model_instances_partition_the_state() {
    let mut tree = MultibodyTree::<f64>::new();
    let left = tree.add_model_instance("left").unwrap();
    let right = tree.add_model_instance("right").unwrap();
    let mut joints = Vec::new();
    for (instance, name) in [(left, "left_arm"), (right, "right_arm")] {
        let body = tree
            .add_rigid_body_in_instance(name, instance, SpatialInertia::solid_sphere(1.0, 0.1))
            .unwrap();
        let frame = tree.body(body).unwrap().body_frame();
        let joint = tree.add_joint("shoulder", FrameIndex::WORLD, frame, RevoluteJoint::new(Vector3::z())).unwrap();
        tree.add_joint_actuator("motor", joint).unwrap();
        joints.push(joint);
    }
    let floating = tree.add_rigid_body("ball", SpatialInertia::solid_sphere(0.2, 0.05)).unwrap();
    tree.finalize().unwrap();
    assert_eq!(tree.joint(joints[1]).unwrap().model_instance(), right);

    let instance = tree.model_instance(right).unwrap();
    assert_eq!((instance.num_positions(), instance.num_velocities(), instance.num_actuated_dofs()), (1, 1, 1));
    let default = tree.model_instance(ModelInstanceIndex::DEFAULT).unwrap();
    assert_eq!((default.num_positions(), default.num_velocities()), (7, 6));
    assert!(tree.get_free_body_mobilizer(floating).is_ok());

    let nq = tree.num_positions().unwrap();
    let q = DVector::from_fn(nq, |i, _| i as f64);
    let right_q = tree.get_positions_from_array(right, &q).unwrap();
    let right_joint_q = tree.joint(joints[1]).unwrap().position_indices().next().unwrap();
    assert_eq!(right_q.as_slice(), &[right_joint_q as f64]);

    let mut q_out = DVector::zeros(nq);
    for index in 0..tree.num_model_instances() {
        let index = ModelInstanceIndex(index);
        let part = tree.get_positions_from_array(index, &q).unwrap();
        tree.set_positions_in_array(index, &part, &mut q_out).unwrap();
    }
    assert_eq!(q_out, q);

    let mut u = DVector::zeros(2);
    tree.set_actuation_vector(left, &DVector::from_vec(vec![4.0]), &mut u).unwrap();
    assert_eq!(u.as_slice(), &[4.0, 0.0]);
    assert_eq!(tree.get_actuation_from_array(right, &u).unwrap().as_slice(), &[0.0]);

    let selector = tree.make_actuator_selector_matrix_for_joints(&[joints[1], joints[0]]).unwrap();
    let u_selected = DVector::from_vec(vec![1.0, 2.0]);
    assert_eq!((selector * u_selected).as_slice(), &[2.0, 1.0]);
}
