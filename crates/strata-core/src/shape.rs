use smallvec::SmallVec;
use std::fmt;

/// Per-axis strides, in elements. Signed so that reversed views are
/// representable.
pub type Strides = SmallVec<[isize; 4]>;

/// Tensor shape with stack-allocated storage for ≤4 dimensions.
///
/// Most tensors in a transformer forward pass are 1D-3D, so the common
/// case never touches the heap.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: SmallVec<[usize; 4]>,
}

impl Shape {
    /// Create a new shape from dimensions.
    pub fn new(dims: &[usize]) -> Self {
        Self {
            dims: SmallVec::from_slice(dims),
        }
    }

    /// Scalar shape (0 dimensions).
    pub fn scalar() -> Self {
        Self {
            dims: SmallVec::new(),
        }
    }

    /// Number of dimensions (rank).
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Total number of elements. A scalar holds one element.
    ///
    /// Saturates at `usize::MAX`; tensors never hold such a shape.
    pub fn numel(&self) -> usize {
        self.checked_numel().unwrap_or(usize::MAX)
    }

    /// [`numel`](Shape::numel), or `None` if the product overflows `usize`.
    /// Any zero extent makes the product zero.
    pub fn checked_numel(&self) -> Option<usize> {
        if self.dims.contains(&0) {
            return Some(0);
        }
        self.dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    /// Get dimension sizes as a slice.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Get size of a specific dimension.
    pub fn dim(&self, axis: usize) -> Option<usize> {
        self.dims.get(axis).copied()
    }

    /// Whether this is a scalar (0-dimensional).
    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }

    /// Row-major strides: last axis 1, each earlier axis the product of the
    /// extents after it.
    pub fn contiguous_strides(&self) -> Strides {
        let ndim = self.dims.len();
        let mut strides: Strides = SmallVec::from_elem(0, ndim);
        let mut running = 1isize;
        for i in (0..ndim).rev() {
            strides[i] = running;
            running = running.saturating_mul(extent(self.dims[i]));
        }
        strides
    }

    /// Whether `strides` describe a row-major layout of this shape.
    ///
    /// Rank 0 and any zero-extent axis are vacuously contiguous.
    pub fn is_contiguous(&self, strides: &[isize]) -> bool {
        if self.dims.len() != strides.len() {
            return false;
        }
        let mut expected = 1isize;
        for i in (0..self.dims.len()).rev() {
            if self.dims[i] == 0 {
                return true;
            }
            if strides[i] != expected {
                return false;
            }
            expected = expected.saturating_mul(extent(self.dims[i]));
        }
        true
    }

    /// Smallest and largest element offsets reachable through `strides`,
    /// relative to the view origin. `None` when the shape holds no elements.
    ///
    /// Saturates instead of overflowing, so an unrepresentable span always
    /// lands outside any real buffer.
    pub fn offset_span(&self, strides: &[isize]) -> Option<(isize, isize)> {
        if self.dims.iter().any(|&d| d == 0) {
            return None;
        }
        let mut lo = 0isize;
        let mut hi = 0isize;
        for (&d, &s) in self.dims.iter().zip(strides) {
            let reach = (extent(d) - 1).saturating_mul(s);
            if reach < 0 {
                lo = lo.saturating_add(reach);
            } else {
                hi = hi.saturating_add(reach);
            }
        }
        Some((lo, hi))
    }
}

fn extent(d: usize) -> isize {
    isize::try_from(d).unwrap_or(isize::MAX)
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shape({:?})", self.dims.as_slice())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, "]")
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::new(dims)
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape {
            dims: SmallVec::from_vec(dims),
        }
    }
}

macro_rules! impl_shape_from_array {
    ($($n:expr),*) => {
        $(
            impl From<[usize; $n]> for Shape {
                fn from(dims: [usize; $n]) -> Self {
                    Shape::new(&dims)
                }
            }
        )*
    };
}

impl_shape_from_array!(0, 1, 2, 3, 4, 5, 6);
