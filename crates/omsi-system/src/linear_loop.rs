//! Algebraic loops given explicitly as `A x = b`.
//!
//! Produces the same residual / directional-derivative function pair that
//! generated model code provides, so an explicit matrix runs through the
//! regular solve path.

use omsi_core::{Matrix, Vector};
use omsi_values::{BufferCounts, EquationInfo, IndexDescriptor};

use crate::coloring::SparsityPattern;
use crate::context::RuntimeContext;
use crate::error::{SystemError, SystemResult};
use crate::function::EvalContext;
use crate::setup::{AlgebraicSystemLayout, FunctionLayout, StorageLayout, instantiate_function};
use crate::system::JacobianSource;

/// Dense linear loop `A x = b` with residual `F(x) = A x - b`.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearLoop {
    a: Matrix,
    b: Vector,
}

impl LinearLoop {
    pub fn new(a: Matrix, b: Vector) -> SystemResult<Self> {
        if !a.is_square() || a.rows() != b.len() {
            return Err(SystemError::Layout {
                what: format!(
                    "linear loop needs a square matrix matching b, got {}x{} and {}",
                    a.rows(),
                    a.cols(),
                    b.len()
                ),
            });
        }
        Ok(Self { a, b })
    }

    pub fn dimension(&self) -> usize {
        self.b.len()
    }

    pub fn matrix(&self) -> &Matrix {
        &self.a
    }

    pub fn rhs(&self) -> &Vector {
        &self.b
    }

    /// Structural nonzeros of `A`.
    pub fn sparsity(&self) -> SystemResult<SparsityPattern> {
        let n = self.dimension();
        let mut nonzeros = Vec::new();
        for col in 0..n {
            for row in 0..n {
                if self.a[(row, col)] != 0.0 {
                    nonzeros.push((row, col));
                }
            }
        }
        SparsityPattern::new(n, n, &nonzeros)
    }

    /// Layout of an algebraic system solving this loop for `iteration_vars`.
    ///
    /// With `directional` the Jacobian comes from a derivative function
    /// computing `A s`; otherwise by finite differences.
    pub fn layout(
        &self,
        id: usize,
        iteration_vars: Vec<IndexDescriptor>,
        directional: bool,
        runtime: &RuntimeContext,
    ) -> SystemResult<AlgebraicSystemLayout> {
        let n = self.dimension();
        if iteration_vars.len() != n {
            return Err(SystemError::Layout {
                what: format!(
                    "linear loop of size {n} given {} iteration variables",
                    iteration_vars.len()
                ),
            });
        }

        let (a, b, vars) = (self.a.clone(), self.b.clone(), iteration_vars.clone());
        let residual = instantiate_function(
            FunctionLayout {
                name: format!("linear_loop_{id}_residual"),
                storage: StorageLayout::Owned(BufferCounts::reals(n)),
                input_vars: Vec::new(),
                output_vars: IndexDescriptor::real_range(0, n),
                n_inner_vars: 0,
                n_zerocrossings: 0,
            },
            Box::new(move |cx: &mut EvalContext<'_>| {
                let mut x = Vector::zeros(vars.len());
                for (j, desc) in vars.iter().enumerate() {
                    x[j] = cx.model_value(*desc)?;
                }
                let mut f = a.mul_vector(&x)?;
                f.sub_vector(&b)?;
                for (i, v) in f.as_slice().iter().enumerate() {
                    cx.set_output(i, *v)?;
                }
                Ok(())
            }),
            runtime,
        )?;

        let jacobian = if directional {
            let a = self.a.clone();
            JacobianSource::Directional(instantiate_function(
                FunctionLayout {
                    name: format!("linear_loop_{id}_jacobian"),
                    storage: StorageLayout::Owned(BufferCounts::reals(2 * n)),
                    input_vars: IndexDescriptor::real_range(0, n),
                    output_vars: IndexDescriptor::real_range(n, n),
                    n_inner_vars: 0,
                    n_zerocrossings: 0,
                },
                Box::new(move |cx: &mut EvalContext<'_>| {
                    let mut seed = Vector::zeros(cx.n_inputs());
                    for j in 0..cx.n_inputs() {
                        seed[j] = cx.input(j)?;
                    }
                    let column = a.mul_vector(&seed)?;
                    for (i, v) in column.as_slice().iter().enumerate() {
                        cx.set_output(i, *v)?;
                    }
                    Ok(())
                }),
                runtime,
            )?)
        } else {
            JacobianSource::FiniteDifference
        };

        Ok(AlgebraicSystemLayout {
            id,
            is_linear: true,
            iteration_vars,
            residual,
            jacobian,
            sparsity: Some(self.sparsity()?),
            equation: Some(EquationInfo {
                id,
                parent: None,
                defines: Vec::new(),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omsi_values::VariableBuffer;

    #[test]
    fn rejects_non_square() {
        let a = Matrix::zeros(2, 3);
        assert!(LinearLoop::new(a, Vector::zeros(2)).is_err());
    }

    #[test]
    fn residual_is_ax_minus_b() {
        let rt = RuntimeContext::default();
        let a = Matrix::from_row_slice(2, 2, &[2.0, 3.0, 3.0, 0.5]).unwrap();
        let lp = LinearLoop::new(a, Vector::from_slice(&[8.0, 4.0])).unwrap();
        let mut layout = lp
            .layout(7, IndexDescriptor::real_range(0, 2), true, &rt)
            .unwrap();
        let mut scope = VariableBuffer::from_reals(&[1.0, 2.0]);
        let mut f = [1.0; 2];
        layout
            .residual
            .evaluate(&rt, &mut scope, Some(&mut f[..]))
            .unwrap();
        assert_eq!(f, [0.0, 0.0]);
        assert_eq!(layout.sparsity.unwrap().nnz(), 4);
    }

    #[test]
    fn sparsity_skips_zeros() {
        let a = Matrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]).unwrap();
        let lp = LinearLoop::new(a, Vector::zeros(2)).unwrap();
        let pattern = lp.sparsity().unwrap();
        assert_eq!(pattern.nnz(), 2);
        assert!(!pattern.contains(0, 1));
    }
}
