use std::cmp::Ordering;
use std::fmt;

/// Data types supported by tally tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// 32-bit IEEE 754 single-precision float
    F32,
    /// 64-bit IEEE 754 double-precision float
    F64,
    /// 32-bit signed integer
    I32,
    /// 64-bit signed integer (default for counts and indices)
    I64,
}

impl DType {
    /// Size in bytes of a single element.
    pub fn element_size(&self) -> usize {
        match self {
            DType::F32 | DType::I32 => 4,
            DType::F64 | DType::I64 => 8,
        }
    }

    /// Number of bytes needed to store `n` elements of this dtype.
    pub fn storage_bytes(&self, n: usize) -> usize {
        self.element_size() * n
    }

    /// Whether this dtype is a floating-point type.
    pub fn is_float(&self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }

    /// Whether this dtype is an integer type.
    pub fn is_integer(&self) -> bool {
        matches!(self, DType::I32 | DType::I64)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::F32 => write!(f, "f32"),
            DType::F64 => write!(f, "f64"),
            DType::I32 => write!(f, "i32"),
            DType::I64 => write!(f, "i64"),
        }
    }
}

/// A Rust scalar that can back a tensor.
///
/// Ties each primitive to its [`DType`] and supplies the few pieces of
/// per-type behavior the generic ops need: the identity for max-reduction,
/// a total order for sorting, and a widening to `f64` for tolerance checks.
pub trait Element:
    bytemuck::Pod + PartialOrd + Send + Sync + fmt::Debug + fmt::Display + 'static
{
    const DTYPE: DType;

    /// Identity element for max-reduction (`-inf` for floats, `MIN` for ints).
    const MAX_IDENTITY: Self;

    /// Larger of two values. Floats ignore NaN like `f32::max`.
    fn max_of(self, other: Self) -> Self;

    /// Total order used by sorting.
    fn total_cmp(&self, other: &Self) -> Ordering;

    /// Widen to `f64` (lossy for large `i64`).
    fn to_f64(self) -> f64;
}

macro_rules! impl_float_element {
    ($($t:ty => $dtype:expr),*) => {
        $(
            impl Element for $t {
                const DTYPE: DType = $dtype;
                const MAX_IDENTITY: Self = <$t>::NEG_INFINITY;

                fn max_of(self, other: Self) -> Self {
                    self.max(other)
                }

                fn total_cmp(&self, other: &Self) -> Ordering {
                    <$t>::total_cmp(self, other)
                }

                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

macro_rules! impl_int_element {
    ($($t:ty => $dtype:expr),*) => {
        $(
            impl Element for $t {
                const DTYPE: DType = $dtype;
                const MAX_IDENTITY: Self = <$t>::MIN;

                fn max_of(self, other: Self) -> Self {
                    Ord::max(self, other)
                }

                fn total_cmp(&self, other: &Self) -> Ordering {
                    Ord::cmp(self, other)
                }

                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

impl_float_element!(f32 => DType::F32, f64 => DType::F64);
impl_int_element!(i32 => DType::I32, i64 => DType::I64);

/// Run a generic body with `$t` bound to the Rust type behind `$dtype`.
///
/// ```ignore
/// with_dtype!(tensor.dtype(), T => tensor.max_typed::<T>())
/// ```
#[macro_export]
macro_rules! with_dtype {
    ($dtype:expr, $t:ident => $body:expr) => {
        match $dtype {
            $crate::DType::F32 => {
                type $t = f32;
                $body
            }
            $crate::DType::F64 => {
                type $t = f64;
                $body
            }
            $crate::DType::I32 => {
                type $t = i32;
                $body
            }
            $crate::DType::I64 => {
                type $t = i64;
                $body
            }
        }
    };
}
