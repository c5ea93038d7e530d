use faer::Mat;

const SINGULAR_PIVOT_EPSILON: f64 = 1.0e-300;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinearSolveError {
    #[error("linear solve requires a square matrix, got {rows}x{cols}")]
    NonSquareMatrix { rows: usize, cols: usize },
    #[error("linear solve requires a non-empty matrix")]
    EmptyMatrix,
    #[error("matrix is singular at pivot index {pivot_index}")]
    SingularMatrix { pivot_index: usize },
    #[error("right-hand side length mismatch: expected {expected}, got {actual}")]
    RhsLengthMismatch { expected: usize, actual: usize },
}

/// Solve `matrix * x = rhs` by LU factorisation with partial pivoting.
pub fn solve_dense(matrix: &Mat<f64>, rhs: &[f64]) -> Result<Vec<f64>, LinearSolveError> {
    let rows = matrix.nrows();
    let cols = matrix.ncols();
    if rows == 0 || cols == 0 {
        return Err(LinearSolveError::EmptyMatrix);
    }
    if rows != cols {
        return Err(LinearSolveError::NonSquareMatrix { rows, cols });
    }
    if rhs.len() != rows {
        return Err(LinearSolveError::RhsLengthMismatch {
            expected: rows,
            actual: rhs.len(),
        });
    }

    let dimension = rows;
    let mut lu = matrix.clone();
    let mut solution = rhs.to_vec();

    for pivot_col in 0..dimension {
        let mut pivot_row = pivot_col;
        let mut pivot_abs = lu[(pivot_col, pivot_col)].abs();
        for row in (pivot_col + 1)..dimension {
            let candidate = lu[(row, pivot_col)].abs();
            if candidate > pivot_abs {
                pivot_abs = candidate;
                pivot_row = row;
            }
        }

        if !pivot_abs.is_finite() || pivot_abs <= SINGULAR_PIVOT_EPSILON {
            return Err(LinearSolveError::SingularMatrix {
                pivot_index: pivot_col,
            });
        }

        if pivot_row != pivot_col {
            for col in 0..dimension {
                let upper = lu[(pivot_col, col)];
                lu[(pivot_col, col)] = lu[(pivot_row, col)];
                lu[(pivot_row, col)] = upper;
            }
            solution.swap(pivot_col, pivot_row);
        }

        let pivot = lu[(pivot_col, pivot_col)];
        for row in (pivot_col + 1)..dimension {
            let multiplier = lu[(row, pivot_col)] / pivot;
            lu[(row, pivot_col)] = multiplier;
            for col in (pivot_col + 1)..dimension {
                let updated = lu[(row, col)] - multiplier * lu[(pivot_col, col)];
                lu[(row, col)] = updated;
            }
            solution[row] -= multiplier * solution[pivot_col];
        }
    }

    for row in (0..dimension).rev() {
        let mut value = solution[row];
        for col in (row + 1)..dimension {
            value -= lu[(row, col)] * solution[col];
        }
        solution[row] = value / lu[(row, row)];
    }

    Ok(solution)
}
