//! Conversion of results into [ndarray](https://github.com/rust-ndarray/ndarray) arrays.
use nalgebra::{DMatrix, DVector, Scalar};
use ndarray::prelude::*;

/// Copies a matrix, for instance a mass matrix or a Jacobian, into a row-major array.
pub fn to_array2<T: Scalar + Copy>(matrix: &DMatrix<T>) -> Array2<T> {
    Array2::from_shape_fn(matrix.shape(), |(i, j)| matrix[(i, j)])
}

pub fn to_array1<T: Scalar + Copy>(vector: &DVector<T>) -> Array1<T> {
    vector.iter().copied().collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_to_array2_keeps_layout() {
        let matrix = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let array = to_array2(&matrix);
        assert_abs_diff_eq!(array, array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        assert_eq!(array.dim(), (2, 3));
    }

    #[test]
    fn test_to_array1() {
        let vector = DVector::from_vec(vec![1, -2, 3]);
        assert_eq!(to_array1(&vector), array![1, -2, 3]);
    }
}
