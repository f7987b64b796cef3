//! Initial conditions: the six solver-ready fields of a run.
//!
//! | Field           | Meaning                                            |
//! |-----------------|----------------------------------------------------|
//! | bathymetry `B`  | seabed height relative to the datum (negative = below) |
//! | `H`             | equilibrium depth, `REFERENCE_LEVEL - B`           |
//! | `eta`           | free-surface deviation from equilibrium            |
//! | water elevation | total water column height, `H + eta`               |
//! | `U`, `V`        | depth-integrated momentum, zero at rest            |
//!
//! Each of bathymetry and the free surface is either read from a
//! [`FieldSource`] (when its selector is set) or synthesised from the
//! configured [`InitialProfile`]. The other free-surface field is derived.
//! External fields keep their interior values; their ghost cells are
//! re-filled by edge extension like every synthesised field.

use std::fmt;

use tracing::debug;

use crate::config::{InitialProfile, ProgramOptions};
use crate::error::{ConfigError, Result};
use crate::field::{FieldInfo, GridShape};
use crate::source::{FieldSource, SourceKind};

/// Height of the still-water datum.
pub const REFERENCE_LEVEL: f32 = 0.0;

/// Still-water depth of the synthesised profiles, in meters.
pub const DEFAULT_DEPTH: f32 = 10.0;

/// Peak surface deviation of [`InitialProfile::GaussianHump`], in meters.
pub const HUMP_AMPLITUDE: f32 = 1.0;

/// Hump standard deviation as a fraction of the shorter domain side.
pub const HUMP_WIDTH_FRACTION: f32 = 0.1;

/// One of the six initial fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Total water column height.
    WaterElevation,
    /// Seabed height.
    Bathymetry,
    /// Equilibrium depth.
    H,
    /// Free-surface deviation.
    Eta,
    /// Momentum in x.
    U,
    /// Momentum in y.
    V,
}

impl FieldKind {
    /// All fields in solver binding order.
    pub const ALL: [FieldKind; 6] = [
        FieldKind::WaterElevation,
        FieldKind::Bathymetry,
        FieldKind::H,
        FieldKind::Eta,
        FieldKind::U,
        FieldKind::V,
    ];

    /// Short name used in logs and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::WaterElevation => "water_elevation",
            FieldKind::Bathymetry => "bathymetry",
            FieldKind::H => "H",
            FieldKind::Eta => "eta",
            FieldKind::U => "U",
            FieldKind::V => "V",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a field's values came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Read from a [`FieldSource`] with the given selector.
    External(usize),
    /// Generated from the initial profile.
    Synthesized,
    /// Computed from other fields.
    Derived,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::External(index) => write!(f, "external #{}", index),
            Provenance::Synthesized => f.write_str("synthesized"),
            Provenance::Derived => f.write_str("derived"),
        }
    }
}

impl InitialProfile {
    /// Seabed for this profile.
    pub fn bathymetry(&self, shape: &GridShape) -> FieldInfo {
        FieldInfo::filled(*shape, REFERENCE_LEVEL - DEFAULT_DEPTH)
    }

    /// Free-surface deviation for this profile.
    pub fn eta(&self, shape: &GridShape) -> FieldInfo {
        match self {
            InitialProfile::Flat => FieldInfo::zeroed(*shape),
            InitialProfile::GaussianHump => {
                let cx = shape.width() / 2.0;
                let cy = shape.height() / 2.0;
                let sigma = HUMP_WIDTH_FRACTION * shape.width().min(shape.height());
                let denom = 2.0 * sigma * sigma;

                FieldInfo::from_fn(*shape, |x, y| {
                    let r2 = (x - cx).powi(2) + (y - cy).powi(2);
                    HUMP_AMPLITUDE * (-r2 / denom).exp()
                })
            }
        }
    }
}

/// The initial state handed to the solver.
///
/// Built in one step by [`InitConditions::init`]; a value of this type always
/// holds six fields of identical shape.
#[derive(Debug, Clone)]
pub struct InitConditions {
    shape: GridShape,
    water_elevation: FieldInfo,
    bathymetry: FieldInfo,
    h: FieldInfo,
    eta: FieldInfo,
    u: FieldInfo,
    v: FieldInfo,
    provenance: [Provenance; 6],
}

impl InitConditions {
    /// Build the initial fields for `options`, reading selected fields from `source`.
    pub fn init(options: &ProgramOptions, source: &dyn FieldSource) -> Result<Self> {
        let shape = options.grid_shape();
        let profile = options.profile();

        let (bathymetry, b_origin) = match options.bathymetry_no() {
            Some(index) => (
                fetch(source, SourceKind::Bathymetry, index, &shape)?,
                Provenance::External(index),
            ),
            None => (profile.bathymetry(&shape), Provenance::Synthesized),
        };

        let h = bathymetry.map(|b| REFERENCE_LEVEL - b);

        let (water_elevation, eta, elevation_origin, eta_origin) =
            match (options.water_elevation_no(), options.eta_no()) {
                (Some(index), _) => {
                    let elevation = fetch(source, SourceKind::WaterElevation, index, &shape)?;
                    let eta = elevation.zip_with(&h, |w, depth| w - depth)?;
                    (elevation, eta, Provenance::External(index), Provenance::Derived)
                }
                (None, Some(index)) => {
                    let eta = fetch(source, SourceKind::Eta, index, &shape)?;
                    let elevation = h.zip_with(&eta, |depth, e| depth + e)?;
                    (elevation, eta, Provenance::Derived, Provenance::External(index))
                }
                (None, None) => {
                    let eta = profile.eta(&shape);
                    let elevation = h.zip_with(&eta, |depth, e| depth + e)?;
                    (elevation, eta, Provenance::Derived, Provenance::Synthesized)
                }
            };

        debug!(
            "Initial conditions on {}: bathymetry {}, water elevation {}, eta {}",
            shape, b_origin, elevation_origin, eta_origin
        );

        Ok(Self {
            shape,
            water_elevation,
            bathymetry,
            h,
            eta,
            u: FieldInfo::zeroed(shape),
            v: FieldInfo::zeroed(shape),
            provenance: [
                elevation_origin,
                b_origin,
                Provenance::Derived,
                eta_origin,
                Provenance::Synthesized,
                Provenance::Synthesized,
            ],
        })
    }

    /// Interior cells in x.
    pub fn nx(&self) -> usize {
        self.shape.nx()
    }

    /// Interior cells in y.
    pub fn ny(&self) -> usize {
        self.shape.ny()
    }

    /// Domain width in meters.
    pub fn width(&self) -> f32 {
        self.shape.width()
    }

    /// Domain height in meters.
    pub fn height(&self) -> f32 {
        self.shape.height()
    }

    /// Cell width in meters.
    pub fn dx(&self) -> f32 {
        self.shape.dx()
    }

    /// Cell height in meters.
    pub fn dy(&self) -> f32 {
        self.shape.dy()
    }

    /// Shape shared by all six fields.
    pub fn shape(&self) -> GridShape {
        self.shape
    }

    /// Total water column height.
    pub fn water_elevation_field(&self) -> &FieldInfo {
        &self.water_elevation
    }

    /// Seabed height.
    pub fn bathymetry_field(&self) -> &FieldInfo {
        &self.bathymetry
    }

    /// Equilibrium depth.
    pub fn h(&self) -> &FieldInfo {
        &self.h
    }

    /// Free-surface deviation.
    pub fn eta(&self) -> &FieldInfo {
        &self.eta
    }

    /// Momentum in x.
    pub fn u(&self) -> &FieldInfo {
        &self.u
    }

    /// Momentum in y.
    pub fn v(&self) -> &FieldInfo {
        &self.v
    }

    /// Look up a field by kind.
    pub fn field(&self, kind: FieldKind) -> &FieldInfo {
        match kind {
            FieldKind::WaterElevation => &self.water_elevation,
            FieldKind::Bathymetry => &self.bathymetry,
            FieldKind::H => &self.h,
            FieldKind::Eta => &self.eta,
            FieldKind::U => &self.u,
            FieldKind::V => &self.v,
        }
    }

    /// All six fields in [`FieldKind::ALL`] order.
    pub fn fields(&self) -> impl Iterator<Item = (FieldKind, &FieldInfo)> + '_ {
        FieldKind::ALL.into_iter().map(move |kind| (kind, self.field(kind)))
    }

    /// Where a field's values came from.
    pub fn provenance(&self, kind: FieldKind) -> Provenance {
        self.provenance[kind as usize]
    }
}

fn fetch(
    source: &dyn FieldSource,
    kind: SourceKind,
    index: usize,
    shape: &GridShape,
) -> Result<FieldInfo> {
    let field = source
        .field(kind, index)
        .ok_or(ConfigError::MissingSource { kind, index })?;

    if !field.shape().matches(shape) {
        return Err(ConfigError::shape_mismatch(kind.as_str(), shape, &field.shape()));
    }

    Ok(field.with_edge_ghosts())
}
