//! External sources of initial fields.
//!
//! Field readers (NetCDF, raw dumps, ...) live outside this crate. They plug
//! into [`InitConditions`](crate::InitConditions) through [`FieldSource`],
//! answering "give me field number `index` of this kind".

use std::collections::HashMap;
use std::fmt;

use crate::field::FieldInfo;

/// Quantity an external field describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Seabed height relative to the reference datum.
    Bathymetry,
    /// Total water column height above the seabed.
    WaterElevation,
    /// Surface deviation from the equilibrium depth.
    Eta,
}

impl SourceKind {
    /// All kinds in a stable order.
    pub const ALL: [SourceKind; 3] = [
        SourceKind::Bathymetry,
        SourceKind::WaterElevation,
        SourceKind::Eta,
    ];

    /// Short lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Bathymetry => "bathymetry",
            SourceKind::WaterElevation => "water elevation",
            SourceKind::Eta => "eta",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supplier of externally defined initial fields.
pub trait FieldSource {
    /// Return field number `index` of the given kind, if available.
    ///
    /// The returned field is validated against the simulation grid by the
    /// caller; implementations should not resize or resample.
    fn field(&self, kind: SourceKind, index: usize) -> Option<FieldInfo>;
}

/// A source that never supplies anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSource;

impl FieldSource for NoSource {
    fn field(&self, _kind: SourceKind, _index: usize) -> Option<FieldInfo> {
        None
    }
}

/// In-memory field source keyed by kind and index.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    fields: HashMap<(SourceKind, usize), FieldInfo>,
}

impl MemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, returning the source for chaining.
    pub fn with(mut self, kind: SourceKind, index: usize, field: FieldInfo) -> Self {
        self.insert(kind, index, field);
        self
    }

    /// Add or replace a field.
    pub fn insert(&mut self, kind: SourceKind, index: usize, field: FieldInfo) {
        self.fields.insert((kind, index), field);
    }

    /// Number of stored fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if no fields are stored.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FieldSource for MemorySource {
    fn field(&self, kind: SourceKind, index: usize) -> Option<FieldInfo> {
        self.fields.get(&(kind, index)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::GridShape;

    #[test]
    fn test_memory_source_lookup() {
        let shape = GridShape::new(4, 4, 1.0, 1.0);
        let source = MemorySource::new()
            .with(SourceKind::Bathymetry, 0, FieldInfo::filled(shape, -5.0))
            .with(SourceKind::Eta, 2, FieldInfo::zeroed(shape));

        assert_eq!(source.len(), 2);
        assert!(source.field(SourceKind::Bathymetry, 0).is_some());
        assert!(source.field(SourceKind::Bathymetry, 1).is_none());
        assert!(source.field(SourceKind::WaterElevation, 0).is_none());
        assert!(source.field(SourceKind::Eta, 2).is_some());
    }

    #[test]
    fn test_memory_source_shares_buffers() {
        let field = FieldInfo::zeroed(GridShape::new(2, 2, 1.0, 1.0));
        let source = MemorySource::new().with(SourceKind::Eta, 0, field.clone());

        let fetched = source.field(SourceKind::Eta, 0).unwrap();
        assert!(std::sync::Arc::ptr_eq(fetched.data(), field.data()));
    }

    #[test]
    fn test_no_source() {
        assert!(NoSource.field(SourceKind::Bathymetry, 0).is_none());
    }
}
