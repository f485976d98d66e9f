//! Forward dynamics by an explicit solve of the mass matrix with the [faer crate](https://docs.rs/faer/latest/faer/index.html).

use faer::{linalg::solvers::Solve, ColRef, MatRef};
use faer_traits::RealField;
use nalgebra::DVector;
use num_traits::Float;

use crate::context::MultibodyTreeContext;
use crate::errors::{check_dimension, Result};
use crate::force_element::MultibodyForces;
use crate::tree::MultibodyTree;

/// Solves the square system `matrix x = rhs` by LU decomposition with partial pivoting. `matrix` is
/// column major.
pub fn solve_linear<F>(matrix: &[F], size: usize, rhs: &[F], solution: &mut [F]) -> Result<()>
where
    F: RealField + Float,
{
    check_dimension("matrix", size * size, matrix.len())?;
    check_dimension("right-hand side", size, rhs.len())?;
    check_dimension("solution", size, solution.len())?;

    let matrix = MatRef::from_column_major_slice(matrix, size, size);
    let rhs = ColRef::from_slice(rhs).to_owned();
    let lu = matrix.partial_piv_lu();
    let x = lu.solve(rhs);

    x.iter().zip(solution).for_each(|(a, b)| *b = *a);
    Ok(())
}

impl MultibodyTree<f64> {
    /// Generalized accelerations `vdot = M⁻¹ (tau_applied + Σ J_Bᵀ F_Bo - C)`.
    ///
    /// The right-hand side is minus the inverse dynamics at zero acceleration. Joint damping and force
    /// elements only enter through `forces`, see
    /// [`calc_force_elements_contribution`](MultibodyTree::calc_force_elements_contribution).
    pub fn calc_forward_dynamics_via_mass_matrix(
        &self,
        context: &MultibodyTreeContext<f64>,
        forces: &MultibodyForces<f64>,
    ) -> Result<DVector<f64>> {
        let mass_matrix = self.calc_mass_matrix_via_inverse_dynamics(context)?;
        let nv = mass_matrix.nrows();
        let rhs = -self.calc_inverse_dynamics(context, &DVector::zeros(nv), forces)?;
        let mut vdot = DVector::zeros(nv);
        solve_linear(mass_matrix.as_slice(), nv, rhs.as_slice(), vdot.as_mut_slice())?;
        Ok(vdot)
    }
}
