use omsi_core::{Matrix, Vector};
use proptest::prelude::*;

fn square() -> impl Strategy<Value = (usize, Vec<f64>)> {
    (1usize..6).prop_flat_map(|n| (Just(n), prop::collection::vec(-100.0f64..100.0, n * n)))
}

proptest! {
    #[test]
    fn element_lives_at_row_plus_col_times_lda((n, values) in square()) {
        let m = Matrix::from_row_slice(n, n, &values).unwrap();
        for row in 0..n {
            for col in 0..n {
                prop_assert_eq!(m.as_slice()[row + col * m.lda()], values[row * n + col]);
                prop_assert_eq!(m.get(row, col).unwrap(), values[row * n + col]);
            }
        }
    }

    #[test]
    fn product_with_unit_vector_extracts_column((n, values) in square(), pick in 0usize..6) {
        let col = pick % n;
        let m = Matrix::from_row_slice(n, n, &values).unwrap();
        let mut e = Vector::zeros(n);
        e[col] = 1.0;
        let product = m.mul_vector(&e).unwrap();
        prop_assert_eq!(product, m.column(col).unwrap());
    }
}

#[test]
fn out_of_range_access_is_an_error() {
    let m = Matrix::zeros(2, 3);
    assert!(m.get(2, 0).is_err());
    assert!(m.get(0, 3).is_err());
    assert!(m.column(3).is_err());
}
