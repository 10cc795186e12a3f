//! Mixed-radix indexing of joint assignments.
//!
//! Tables are stored row-major: the last dimension varies fastest.

/// Row-major strides for the given dimensions.
pub fn strides(dims: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; dims.len()];
    for i in (0..dims.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * dims[i + 1];
    }
    strides
}

/// Number of joint assignments (1 for a table with no dimensions), or
/// None when the count overflows `usize`.
pub fn table_size(dims: &[usize]) -> Option<usize> {
    dims.iter().try_fold(1usize, |size, dim| size.checked_mul(*dim))
}

/// Flat offset of `assignment`, or None when any coordinate is out of range.
pub fn flat_index(dims: &[usize], assignment: &[usize]) -> Option<usize> {
    if assignment.len() != dims.len() {
        return None;
    }
    let mut index = 0;
    for (value, dim) in assignment.iter().zip(dims) {
        if value >= dim {
            return None;
        }
        index = index * dim + value;
    }
    Some(index)
}

/// Iterator over every joint assignment in row-major order.
#[derive(Debug, Clone)]
pub struct Assignments {
    dims: Vec<usize>,
    next: Option<Vec<usize>>,
}

impl Assignments {
    pub fn new(dims: &[usize]) -> Self {
        let next = if dims.iter().any(|d| *d == 0) {
            None
        } else {
            Some(vec![0; dims.len()])
        };
        Self {
            dims: dims.to_vec(),
            next,
        }
    }
}

impl Iterator for Assignments {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        let current = self.next.take()?;
        let mut successor = current.clone();
        let mut carried = true;
        for i in (0..self.dims.len()).rev() {
            successor[i] += 1;
            if successor[i] < self.dims[i] {
                carried = false;
                break;
            }
            successor[i] = 0;
        }
        if !carried {
            self.next = Some(successor);
        }
        Some(current)
    }
}
