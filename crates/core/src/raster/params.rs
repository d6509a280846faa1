//! High-level grid definitions resolved into a [`GeoTransform`] and dimensions

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::raster::GeoTransform;
use crate::vector::BoundingBox;

/// Which point of a cell a reference coordinate refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellAnchor {
    /// Upper-left corner of the cell
    #[default]
    Corner,
    /// Center of the cell
    Center,
}

/// A fully resolved raster grid: transform plus dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    pub transform: GeoTransform,
    pub width: usize,
    pub height: usize,
}

impl GridSpec {
    pub fn new(transform: GeoTransform, width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions { width, height });
        }
        Ok(Self {
            transform,
            width,
            height,
        })
    }

    /// Geographic extent of the grid
    pub fn bbox(&self) -> BoundingBox {
        let (min_x, min_y, max_x, max_y) = self.transform.bounds(self.width, self.height);
        BoundingBox::new(min_x, min_y, max_x, max_y)
    }
}

/// Parameters describing a raster grid.
///
/// Accepted combinations, checked in this order:
/// 1. `affine` (six raw coefficients)
/// 2. `xscale` + `yscale` + `xoffset` + `yoffset` (skews default to 0)
/// 3. `bbox` + `width` + `height`
/// 4. `bbox` + `cell_width` + `cell_height`
/// 5. `xy_cell` + `xy_geo` + `cell_width` + `cell_height`, with `anchor`
///    telling whether `xy_geo` is the corner or center of `xy_cell`
///
/// Grids derived from a bbox or a cell size are north-up. When `width` and
/// `height` are absent for 1, 2 and 5, they are derived from `bbox`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridParams {
    pub affine: Option<[f64; 6]>,
    pub xscale: Option<f64>,
    pub yscale: Option<f64>,
    pub xoffset: Option<f64>,
    pub yoffset: Option<f64>,
    pub xskew: Option<f64>,
    pub yskew: Option<f64>,
    pub width: Option<usize>,
    pub height: Option<usize>,
    /// `[xmin, ymin, xmax, ymax]`
    pub bbox: Option<[f64; 4]>,
    pub cell_width: Option<f64>,
    pub cell_height: Option<f64>,
    pub xy_cell: Option<[f64; 2]>,
    pub xy_geo: Option<[f64; 2]>,
    pub anchor: CellAnchor,
}

impl GridParams {
    /// Grid covering `bbox` with square cells of `cell_size`
    pub fn from_bbox_cell_size(bbox: BoundingBox, cell_size: f64) -> Self {
        Self {
            bbox: Some(bbox.to_array()),
            cell_width: Some(cell_size),
            cell_height: Some(cell_size),
            ..Self::default()
        }
    }

    /// Grid covering `bbox` with the given dimensions
    pub fn from_bbox_dims(bbox: BoundingBox, width: usize, height: usize) -> Self {
        Self {
            bbox: Some(bbox.to_array()),
            width: Some(width),
            height: Some(height),
            ..Self::default()
        }
    }

    /// Resolve into a transform and dimensions.
    ///
    /// The cell anchor is applied here exactly once; the returned transform
    /// is always corner-anchored.
    pub fn resolve(&self) -> Result<GridSpec> {
        let bbox = self.bbox.map(|b| BoundingBox::new(b[0], b[1], b[2], b[3]));

        if let Some(affine) = self.affine {
            let transform = GeoTransform::from_affine(affine)?;
            return self.with_dims(transform, bbox);
        }

        if let (Some(xscale), Some(yscale), Some(xoffset), Some(yoffset)) =
            (self.xscale, self.yscale, self.xoffset, self.yoffset)
        {
            let transform = GeoTransform::from_affine([
                xscale,
                self.xskew.unwrap_or(0.0),
                xoffset,
                self.yskew.unwrap_or(0.0),
                yscale,
                yoffset,
            ])?;
            return self.with_dims(transform, bbox);
        }

        if let Some(bbox) = bbox {
            if bbox.width() <= 0.0 || bbox.height() <= 0.0 {
                return Err(Error::InvalidParameter {
                    name: "bbox",
                    value: format!("{:?}", bbox.to_array()),
                    reason: "grid extent must have positive width and height".into(),
                });
            }

            if let (Some(width), Some(height)) = (self.width, self.height) {
                if width == 0 || height == 0 {
                    return Err(Error::InvalidDimensions { width, height });
                }
                let transform = GeoTransform::new(
                    bbox.min_x,
                    bbox.max_y,
                    bbox.width() / width as f64,
                    -bbox.height() / height as f64,
                )?;
                return GridSpec::new(transform, width, height);
            }

            if let (Some(cw), Some(ch)) = (self.cell_width, self.cell_height) {
                let (cw, ch) = positive_cell_size(cw, ch)?;
                let width = cells_spanned(bbox.width(), cw);
                let height = cells_spanned(bbox.height(), ch);
                let transform = GeoTransform::new(bbox.min_x, bbox.max_y, cw, -ch)?;
                return GridSpec::new(transform, width, height);
            }
        }

        if let (Some(cell), Some(geo), Some(cw), Some(ch)) =
            (self.xy_cell, self.xy_geo, self.cell_width, self.cell_height)
        {
            let (cw, ch) = positive_cell_size(cw, ch)?;
            let shift = match self.anchor {
                CellAnchor::Corner => 0.0,
                CellAnchor::Center => 0.5,
            };
            let xoffset = geo[0] - (cell[0] + shift) * cw;
            let yoffset = geo[1] + (cell[1] + shift) * ch;
            let transform = GeoTransform::new(xoffset, yoffset, cw, -ch)?;
            return self.with_dims(transform, bbox);
        }

        Err(Error::MissingParameter {
            name: "grid",
            reason: "need affine, xscale/yscale/xoffset/yoffset, bbox with width/height or \
                     cell size, or xy_cell/xy_geo with cell size"
                .into(),
        })
    }

    fn with_dims(&self, transform: GeoTransform, bbox: Option<BoundingBox>) -> Result<GridSpec> {
        if let (Some(width), Some(height)) = (self.width, self.height) {
            return GridSpec::new(transform, width, height);
        }
        let Some(bbox) = bbox else {
            return Err(Error::MissingParameter {
                name: "width/height",
                reason: "grid dimensions need width and height or a bbox to derive them from".into(),
            });
        };
        let corners = [
            (bbox.min_x, bbox.min_y),
            (bbox.min_x, bbox.max_y),
            (bbox.max_x, bbox.min_y),
            (bbox.max_x, bbox.max_y),
        ];
        let mut max_col = f64::MIN;
        let mut max_row = f64::MIN;
        for (x, y) in corners {
            let (col, row) = transform.geo_to_cell_fraction(x, y);
            max_col = max_col.max(col);
            max_row = max_row.max(row);
        }
        let width = (max_col - 1e-9).ceil().max(1.0) as usize;
        let height = (max_row - 1e-9).ceil().max(1.0) as usize;
        GridSpec::new(transform, width, height)
    }
}

fn positive_cell_size(cw: f64, ch: f64) -> Result<(f64, f64)> {
    for (name, v) in [("cell_width", cw), ("cell_height", ch)] {
        if !(v.is_finite() && v > 0.0) {
            return Err(Error::InvalidParameter {
                name,
                value: v.to_string(),
                reason: "cell size must be positive".into(),
            });
        }
    }
    Ok((cw, ch))
}

fn cells_spanned(span: f64, cell: f64) -> usize {
    ((span / cell) - 1e-9).ceil().max(1.0) as usize
}
