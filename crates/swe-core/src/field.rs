//! Ghost-padded grid fields shared between host and device.
//!
//! A field stores `(nx + 2*ghost) * (ny + 2*ghost)` samples in row-major order.
//! The interior cell `(i, j)` lives at padded coordinate `(i + ghost, j + ghost)`:
//!
//! ```text
//! +----+------------------+----+
//! | GG |    ghost rows    | GG |   rows 0..ghost
//! +----+------------------+----+
//! |    |                  |    |
//! | G  |   nx x ny        |  G |   rows ghost..ghost+ny
//! |    |   interior       |    |
//! +----+------------------+----+
//! | GG |    ghost rows    | GG |   rows ghost+ny..ny+2*ghost
//! +----+------------------+----+
//! ```
//!
//! The buffer is an `Arc<Vec<f32>>`. The host writes it once while building
//! initial conditions; afterwards every holder (including the device-binding
//! layer) treats it as read-only.

use std::fmt;
use std::sync::Arc;

use crate::error::{ConfigError, Result};

/// Ghost-cell margin on every side of the interior grid.
pub const GHOST_CELLS: usize = 2;

/// Relative tolerance used when comparing cell sizes.
const CELL_SIZE_TOLERANCE: f32 = 1e-5;

/// Shared, reference-counted field storage.
pub type FieldPtr = Arc<Vec<f32>>;

/// Shape metadata of a grid field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridShape {
    nx: usize,
    ny: usize,
    dx: f32,
    dy: f32,
    ghost: usize,
}

impl GridShape {
    /// Create a shape with the default ghost margin.
    pub fn new(nx: usize, ny: usize, dx: f32, dy: f32) -> Self {
        Self::with_ghost(nx, ny, dx, dy, GHOST_CELLS)
    }

    /// Create a shape with an explicit ghost margin.
    pub fn with_ghost(nx: usize, ny: usize, dx: f32, dy: f32, ghost: usize) -> Self {
        Self {
            nx,
            ny,
            dx,
            dy,
            ghost,
        }
    }

    /// Create a shape from physical extents; cell sizes are `width / nx` and `height / ny`.
    pub fn from_extent(nx: usize, ny: usize, width: f32, height: f32) -> Self {
        Self::new(nx, ny, width / nx as f32, height / ny as f32)
    }

    /// Interior cells in x.
    pub fn nx(&self) -> usize {
        self.nx
    }

    /// Interior cells in y.
    pub fn ny(&self) -> usize {
        self.ny
    }

    /// Cell width in meters.
    pub fn dx(&self) -> f32 {
        self.dx
    }

    /// Cell height in meters.
    pub fn dy(&self) -> f32 {
        self.dy
    }

    /// Ghost-cell margin.
    pub fn ghost(&self) -> usize {
        self.ghost
    }

    /// Columns including ghost cells.
    pub fn padded_nx(&self) -> usize {
        self.nx + 2 * self.ghost
    }

    /// Rows including ghost cells.
    pub fn padded_ny(&self) -> usize {
        self.ny + 2 * self.ghost
    }

    /// Number of stored samples.
    pub fn len(&self) -> usize {
        self.padded_nx() * self.padded_ny()
    }

    /// Number of stored samples, or `None` if it overflows `usize`.
    pub fn checked_len(&self) -> Option<usize> {
        let pnx = self.nx.checked_add(2 * self.ghost)?;
        let pny = self.ny.checked_add(2 * self.ghost)?;
        pnx.checked_mul(pny)
    }

    /// Returns true if every padded cell has a 32-bit linear index.
    ///
    /// Kernels address fields as `y * padded_nx + x` in `u32`.
    pub fn is_addressable(&self) -> bool {
        self.checked_len()
            .is_some_and(|len| u32::try_from(len).is_ok())
    }

    /// Returns true if the interior is empty.
    pub fn is_empty(&self) -> bool {
        self.nx == 0 || self.ny == 0
    }

    /// Interior width in meters.
    pub fn width(&self) -> f32 {
        self.nx as f32 * self.dx
    }

    /// Interior height in meters.
    pub fn height(&self) -> f32 {
        self.ny as f32 * self.dy
    }

    /// Buffer index of interior cell `(i, j)`.
    #[inline(always)]
    pub fn index(&self, i: usize, j: usize) -> usize {
        (j + self.ghost) * self.padded_nx() + (i + self.ghost)
    }

    /// Check whether two fields can take part in the same simulation.
    ///
    /// Cell counts and ghost margins must be equal; cell sizes are compared
    /// with a small relative tolerance.
    pub fn matches(&self, other: &GridShape) -> bool {
        self.nx == other.nx
            && self.ny == other.ny
            && self.ghost == other.ghost
            && approx_eq(self.dx, other.dx)
            && approx_eq(self.dy, other.dy)
    }
}

impl fmt::Display for GridShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} (dx={}, dy={}, ghost={})",
            self.nx, self.ny, self.dx, self.dy, self.ghost
        )
    }
}

fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() <= CELL_SIZE_TOLERANCE * a.abs().max(b.abs())
}

/// One scalar field on the grid: shape metadata plus a shared buffer.
///
/// Cloning is cheap and shares the buffer.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    shape: GridShape,
    data: FieldPtr,
}

impl FieldInfo {
    /// Zero-filled field.
    pub fn zeroed(shape: GridShape) -> Self {
        Self::filled(shape, 0.0)
    }

    /// Field with every sample (ghosts included) set to `value`.
    pub fn filled(shape: GridShape, value: f32) -> Self {
        Self {
            shape,
            data: Arc::new(vec![value; shape.len()]),
        }
    }

    /// Evaluate `f(x, y)` at every interior cell centre, then fill the ghosts.
    pub fn from_fn<F>(shape: GridShape, f: F) -> Self
    where
        F: Fn(f32, f32) -> f32,
    {
        let mut data = vec![0.0; shape.len()];

        for j in 0..shape.ny {
            let y = (j as f32 + 0.5) * shape.dy;
            for i in 0..shape.nx {
                let x = (i as f32 + 0.5) * shape.dx;
                data[shape.index(i, j)] = f(x, y);
            }
        }

        extend_ghosts(&shape, &mut data);

        Self {
            shape,
            data: Arc::new(data),
        }
    }

    /// Share an externally supplied padded buffer.
    ///
    /// The buffer is not copied; its length must equal `shape.len()`.
    pub fn wrap(shape: GridShape, data: FieldPtr) -> Result<Self> {
        if data.len() != shape.len() {
            return Err(ConfigError::length_mismatch(
                "wrapped field",
                shape.len(),
                data.len(),
            ));
        }

        Ok(Self { shape, data })
    }

    /// Copy an `nx * ny` row-major interior array into a padded field.
    pub fn from_interior(shape: GridShape, values: &[f32]) -> Result<Self> {
        let interior = shape.nx * shape.ny;
        if values.len() != interior {
            return Err(ConfigError::length_mismatch(
                "interior data",
                interior,
                values.len(),
            ));
        }

        let mut data = vec![0.0; shape.len()];
        if shape.nx > 0 {
            for (j, row) in values.chunks_exact(shape.nx).enumerate() {
                let start = shape.index(0, j);
                data[start..start + shape.nx].copy_from_slice(row);
            }
        }
        extend_ghosts(&shape, &mut data);

        Ok(Self {
            shape,
            data: Arc::new(data),
        })
    }

    /// Shape metadata.
    pub fn shape(&self) -> GridShape {
        self.shape
    }

    /// Interior cells in x.
    pub fn nx(&self) -> usize {
        self.shape.nx
    }

    /// Interior cells in y.
    pub fn ny(&self) -> usize {
        self.shape.ny
    }

    /// Cell width in meters.
    pub fn dx(&self) -> f32 {
        self.shape.dx
    }

    /// Cell height in meters.
    pub fn dy(&self) -> f32 {
        self.shape.dy
    }

    /// Ghost-cell margin.
    pub fn ghost(&self) -> usize {
        self.shape.ghost
    }

    /// Number of stored samples, ghosts included.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value of interior cell `(i, j)`.
    pub fn get(&self, i: usize, j: usize) -> Option<f32> {
        if i >= self.shape.nx || j >= self.shape.ny {
            return None;
        }
        Some(self.data[self.shape.index(i, j)])
    }

    /// Interior values in row-major order.
    pub fn interior(&self) -> impl Iterator<Item = f32> + '_ {
        let shape = self.shape;
        (0..shape.ny).flat_map(move |j| {
            let start = shape.index(0, j);
            self.data[start..start + shape.nx].iter().copied()
        })
    }

    /// All samples, ghosts included.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Raw bytes for device upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.data.as_slice())
    }

    /// The shared buffer handle.
    pub fn data(&self) -> &FieldPtr {
        &self.data
    }

    /// Number of holders sharing the buffer.
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.data)
    }

    /// This field with its ghost cells set to the nearest interior value.
    ///
    /// The buffer is shared when the ghosts already hold those values and
    /// copied otherwise; `self` is never modified.
    pub fn with_edge_ghosts(&self) -> Self {
        let mut data = self.data.as_ref().clone();
        extend_ghosts(&self.shape, &mut data);
        if data == *self.data {
            return self.clone();
        }

        Self {
            shape: self.shape,
            data: Arc::new(data),
        }
    }

    /// Apply `f` to every sample.
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(f32) -> f32,
    {
        Self {
            shape: self.shape,
            data: Arc::new(self.data.iter().map(|&v| f(v)).collect()),
        }
    }

    /// Combine two fields of the same shape sample by sample.
    pub fn zip_with<F>(&self, other: &FieldInfo, f: F) -> Result<Self>
    where
        F: Fn(f32, f32) -> f32,
    {
        if !self.shape.matches(&other.shape) {
            return Err(ConfigError::shape_mismatch(
                "combined field",
                &self.shape,
                &other.shape,
            ));
        }

        Ok(Self {
            shape: self.shape,
            data: Arc::new(
                self.data
                    .iter()
                    .zip(other.data.iter())
                    .map(|(&a, &b)| f(a, b))
                    .collect(),
            ),
        })
    }
}

/// Fill ghost cells by extending the nearest interior value (zero gradient).
fn extend_ghosts(shape: &GridShape, data: &mut [f32]) {
    let g = shape.ghost;
    if g == 0 || shape.is_empty() {
        return;
    }

    let pnx = shape.padded_nx();

    // Left and right margins of every interior row.
    for pj in g..g + shape.ny {
        let row = pj * pnx;
        let left = data[row + g];
        let right = data[row + g + shape.nx - 1];
        for k in 0..g {
            data[row + k] = left;
            data[row + g + shape.nx + k] = right;
        }
    }

    // Top and bottom margins copy whole padded rows, corners included.
    let first = g * pnx;
    for pj in 0..g {
        data.copy_within(first..first + pnx, pj * pnx);
    }
    let last = (g + shape.ny - 1) * pnx;
    for pj in g + shape.ny..shape.padded_ny() {
        data.copy_within(last..last + pnx, pj * pnx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_length() {
        let shape = GridShape::new(100, 50, 1.0, 2.0);
        assert_eq!(shape.padded_nx(), 100 + 2 * GHOST_CELLS);
        assert_eq!(shape.padded_ny(), 50 + 2 * GHOST_CELLS);

        let field = FieldInfo::zeroed(shape);
        assert_eq!(
            field.len(),
            (100 + 2 * GHOST_CELLS) * (50 + 2 * GHOST_CELLS)
        );
        assert!(field.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_addressable_limit() {
        assert!(GridShape::new(1000, 1000, 1.0, 1.0).is_addressable());
        assert!(!GridShape::new(70_000, 70_000, 1.0, 1.0).is_addressable());

        let huge = GridShape::new(usize::MAX / 4, 8, 1.0, 1.0);
        assert_eq!(huge.checked_len(), None);
        assert!(!huge.is_addressable());
    }

    #[test]
    fn test_from_extent() {
        let shape = GridShape::from_extent(100, 40, 1000.0, 200.0);
        assert_eq!(shape.dx(), 10.0);
        assert_eq!(shape.dy(), 5.0);
        assert!((shape.width() - 1000.0).abs() < 1e-3);
    }

    #[test]
    fn test_matches() {
        let a = GridShape::new(10, 10, 0.1, 0.1);
        let b = GridShape::from_extent(10, 10, 1.0, 1.0);
        assert!(a.matches(&b));

        assert!(!a.matches(&GridShape::new(10, 11, 0.1, 0.1)));
        assert!(!a.matches(&GridShape::new(10, 10, 0.2, 0.1)));
        assert!(!a.matches(&GridShape::with_ghost(10, 10, 0.1, 0.1, 1)));
    }

    #[test]
    fn test_from_interior_extends_ghosts() {
        let shape = GridShape::with_ghost(3, 2, 1.0, 1.0, 1);
        let field = FieldInfo::from_interior(shape, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();

        assert_eq!(field.get(0, 0), Some(1.0));
        assert_eq!(field.get(2, 1), Some(6.0));

        #[rustfmt::skip]
        let expected = [
            1.0, 1.0, 2.0, 3.0, 3.0,
            1.0, 1.0, 2.0, 3.0, 3.0,
            4.0, 4.0, 5.0, 6.0, 6.0,
            4.0, 4.0, 5.0, 6.0, 6.0,
        ];
        assert_eq!(field.as_slice(), &expected);
    }

    #[test]
    fn test_from_interior_rejects_wrong_length() {
        let shape = GridShape::new(4, 4, 1.0, 1.0);
        let err = FieldInfo::from_interior(shape, &[0.0; 15]).unwrap_err();
        assert!(matches!(err, ConfigError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_wrap_shares_buffer() {
        let shape = GridShape::new(4, 4, 1.0, 1.0);
        let data: FieldPtr = Arc::new(vec![1.5; shape.len()]);

        let field = FieldInfo::wrap(shape, Arc::clone(&data)).unwrap();
        assert!(Arc::ptr_eq(field.data(), &data));
        assert_eq!(field.holders(), 2);

        let copy = field.clone();
        assert_eq!(copy.holders(), 3);
    }

    #[test]
    fn test_wrap_rejects_unpadded_buffer() {
        let shape = GridShape::new(4, 4, 1.0, 1.0);
        let err = FieldInfo::wrap(shape, Arc::new(vec![0.0; 16])).unwrap_err();
        assert!(matches!(err, ConfigError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_with_edge_ghosts() {
        let shape = GridShape::with_ghost(2, 2, 1.0, 1.0, 1);
        #[rustfmt::skip]
        let raw = vec![
            9.0, 9.0, 9.0, 9.0,
            9.0, 1.0, 2.0, 9.0,
            9.0, 3.0, 4.0, 9.0,
            9.0, 9.0, 9.0, 9.0,
        ];
        let field = FieldInfo::wrap(shape, Arc::new(raw)).unwrap();

        let fixed = field.with_edge_ghosts();
        #[rustfmt::skip]
        let expected = [
            1.0, 1.0, 2.0, 2.0,
            1.0, 1.0, 2.0, 2.0,
            3.0, 3.0, 4.0, 4.0,
            3.0, 3.0, 4.0, 4.0,
        ];
        assert_eq!(fixed.as_slice(), &expected);
        assert_eq!(field.as_slice()[0], 9.0);

        // Already consistent: no copy.
        let again = fixed.with_edge_ghosts();
        assert!(Arc::ptr_eq(again.data(), fixed.data()));
    }

    #[test]
    fn test_from_fn_uses_cell_centres() {
        let shape = GridShape::new(4, 2, 0.5, 2.0);
        let field = FieldInfo::from_fn(shape, |x, y| x + 10.0 * y);

        assert_eq!(field.get(0, 0), Some(0.25 + 10.0));
        assert_eq!(field.get(3, 1), Some(1.75 + 30.0));
        assert_eq!(field.interior().count(), 8);
    }

    #[test]
    fn test_zip_with_shape_check() {
        let a = FieldInfo::filled(GridShape::new(4, 4, 1.0, 1.0), 2.0);
        let b = FieldInfo::filled(GridShape::new(4, 4, 1.0, 1.0), 3.0);
        let sum = a.zip_with(&b, |x, y| x + y).unwrap();
        assert!(sum.as_slice().iter().all(|&v| v == 5.0));

        let c = FieldInfo::zeroed(GridShape::new(5, 4, 1.0, 1.0));
        assert!(a.zip_with(&c, |x, y| x + y).is_err());
    }

    #[test]
    fn test_as_bytes_length() {
        let field = FieldInfo::filled(GridShape::new(2, 2, 1.0, 1.0), 1.0);
        assert_eq!(field.as_bytes().len(), field.len() * 4);
    }
}
