//! Zonal statistics
//!
//! Two flavours:
//!
//! - [`zonal_statistics`]: zones are polygon features. The value raster is
//!   clipped to each zone and the chosen [`Aggregate`] is attached to the
//!   zone as a new attribute.
//! - [`zonal_statistics_by_raster`]: zones are the integer values of a zone
//!   raster aligned with the value raster.

use std::collections::HashMap;

use ndarray::Array2;
use stratagis_core::raster::{Band, Raster, RasterElement};
use stratagis_core::vector::{is_empty_geometry, AttributeValue, FeatureCollection};
use stratagis_core::{Error, Result};
use tracing::debug;

use super::Aggregate;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::raster::clip_masked;
use crate::vector::JoinOutput;

/// Parameters for [`zonal_statistics`]
#[derive(Debug, Clone)]
pub struct ZonalOptions {
    /// Band of the value raster
    pub band: usize,
    pub aggregate: Aggregate,
    /// Output field name; defaults to the statistic name
    pub field: Option<String>,
}

impl Default for ZonalOptions {
    fn default() -> Self {
        Self {
            band: 0,
            aggregate: Aggregate::Mean,
            field: None,
        }
    }
}

impl ZonalOptions {
    pub fn new(aggregate: Aggregate) -> Self {
        Self {
            aggregate,
            ..Default::default()
        }
    }

    pub fn output_name(&self) -> String {
        self.field
            .clone()
            .unwrap_or_else(|| self.aggregate.name().to_string())
    }
}

fn statistic_value(aggregate: &Aggregate, value: Option<f64>) -> AttributeValue {
    match (aggregate, value) {
        (Aggregate::Count | Aggregate::Variety, Some(v)) => AttributeValue::Int(v as i64),
        (_, Some(v)) => AttributeValue::from_f64(v),
        (_, None) => AttributeValue::Null,
    }
}

/// Summarise the cells of `raster` under each zone feature.
///
/// Every zone is kept in the output, in order, with one extra attribute.
/// Zones that miss the raster or cover no valid cell get the statistic of an
/// empty set (null, or 0 for counts); zones without geometry get null and a
/// diagnostic.
pub fn zonal_statistics<T: RasterElement>(
    zones: &FeatureCollection,
    raster: &Raster<T>,
    options: &ZonalOptions,
) -> Result<JoinOutput> {
    if !options.aggregate.is_numeric() {
        return Err(Error::InvalidParameter {
            name: "aggregate",
            value: options.aggregate.name().to_string(),
            reason: "raster cells need a numeric statistic".into(),
        });
    }
    let name = options.output_name();
    if zones.field_index(&name).is_some() {
        return Err(Error::InvalidParameter {
            name: "field",
            value: name,
            reason: "zone collection already has this field".into(),
        });
    }

    let values = Raster::single(raster.band(options.band)?.clone(), *raster.transform());
    let extent = values.bbox();
    let nodata = values.band(0)?.nodata();
    let mut fields = zones.fields().to_vec();
    fields.push(name);
    let mut out = FeatureCollection::with_config(fields, *zones.index_config());
    let mut diagnostics = Vec::new();
    let mut missed = 0usize;

    for zone in zones {
        let geometry = zone.geometry().filter(|g| !is_empty_geometry(g));
        let cells: Option<Vec<f64>> = match geometry.zip(zone.bbox()) {
            None => {
                diagnostics.push(Diagnostic::feature(
                    zone.id(),
                    DiagnosticKind::EmptyGeometry,
                    "zone has no geometry",
                ));
                None
            }
            Some((_, bbox)) if !bbox.intersects(&extent) => {
                missed += 1;
                Some(Vec::new())
            }
            Some((geom, _)) => match clip_masked(&values, geom) {
                // Select by coverage, then by the source nodata; the clip
                // sentinel can equal real cells.
                Ok((clipped, inside)) => Some(
                    clipped
                        .band(0)?
                        .data()
                        .iter()
                        .zip(inside.iter())
                        .filter(|&(v, &keep)| keep && !v.is_nodata(nodata))
                        .filter_map(|(v, _)| v.to_f64())
                        .collect(),
                ),
                Err(Error::EmptyResult(_)) => {
                    missed += 1;
                    Some(Vec::new())
                }
                Err(e) => return Err(e),
            },
        };

        let value = match cells {
            Some(cells) => statistic_value(&options.aggregate, options.aggregate.apply_f64(&cells)),
            None => AttributeValue::Null,
        };
        let mut row = zone.row().to_vec();
        row.push(value);
        out.add_feature(row, zone.geometry().cloned())?;
    }

    debug!(
        zones = zones.len(),
        missed,
        statistic = options.aggregate.name(),
        "zonal statistics"
    );
    Ok(JoinOutput {
        collection: out,
        diagnostics,
    })
}

/// Result of zonal statistics for one zone
#[derive(Debug, Clone)]
pub struct ZonalResult {
    pub zone_id: i32,
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    pub median: f64,
}

impl ZonalResult {
    fn from_values(zone_id: i32, mut vals: Vec<f64>) -> Self {
        let count = vals.len();
        let sum: f64 = vals.iter().sum();
        let mean = sum / count as f64;
        let var = vals.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / count as f64;

        vals.sort_by(f64::total_cmp);
        let min = vals[0];
        let max = vals[count - 1];
        let median = if count % 2 == 0 {
            (vals[count / 2 - 1] + vals[count / 2]) / 2.0
        } else {
            vals[count / 2]
        };

        Self {
            zone_id,
            count,
            sum,
            mean,
            std_dev: var.sqrt(),
            min,
            max,
            range: max - min,
            median,
        }
    }
}

/// Values of band 0 grouped by the zone id of band 0 of `zones`.
///
/// Zone 0, zone nodata and value nodata cells are skipped.
fn group_by_zone<T: RasterElement>(values: &Raster<T>, zones: &Raster<i32>) -> Result<HashMap<i32, Vec<f64>>> {
    let (rows_v, cols_v) = values.shape();
    let (rows_z, cols_z) = zones.shape();
    if rows_v != rows_z || cols_v != cols_z {
        return Err(Error::SizeMismatch {
            er: rows_v,
            ec: cols_v,
            ar: rows_z,
            ac: cols_z,
        });
    }

    let values = values.band(0)?;
    let zones = zones.band(0)?;
    let zone_mask = zones.mask();
    let zone_data = zones.data();

    let mut grouped: HashMap<i32, Vec<f64>> = HashMap::new();
    for (row, col, value) in values.valid_cells() {
        let zone = zone_data[(row, col)];
        if zone == 0 || zone_mask[(row, col)] {
            continue;
        }
        if let Some(v) = value.to_f64().filter(|v| !v.is_nan()) {
            grouped.entry(zone).or_default().push(v);
        }
    }
    Ok(grouped)
}

/// Compute zonal statistics for an integer zone raster
///
/// # Arguments
/// * `values` - Value raster (band 0 is read)
/// * `zones` - Zone raster of the same shape (integer identifiers)
///
/// # Returns
/// HashMap mapping zone_id → ZonalResult
pub fn zonal_statistics_by_raster<T: RasterElement>(
    values: &Raster<T>,
    zones: &Raster<i32>,
) -> Result<HashMap<i32, ZonalResult>> {
    let grouped = group_by_zone(values, zones)?;
    Ok(grouped
        .into_iter()
        .map(|(zone, vals)| (zone, ZonalResult::from_values(zone, vals)))
        .collect())
}

/// Raster where each cell holds its zone's statistic.
///
/// Cells outside every zone are NaN (the nodata value of the output).
pub fn zonal_statistics_raster<T: RasterElement>(
    values: &Raster<T>,
    zones: &Raster<i32>,
    aggregate: &Aggregate,
) -> Result<Raster<f64>> {
    let stats: HashMap<i32, f64> = group_by_zone(values, zones)?
        .into_iter()
        .filter_map(|(zone, vals)| aggregate.apply_f64(&vals).map(|v| (zone, v)))
        .collect();

    let zone_band = zones.band(0)?;
    let zone_mask = zone_band.mask();
    let mut data = Array2::from_elem(zone_band.shape(), f64::NAN);
    for ((row, col), zone) in zone_band.data().indexed_iter() {
        if zone_mask[(row, col)] {
            continue;
        }
        if let Some(&v) = stats.get(zone) {
            data[(row, col)] = v;
        }
    }
    let mut out = Raster::single(Band::from_array(data).with_nodata(Some(f64::NAN)), *values.transform());
    out.set_crs(values.crs().cloned());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{polygon, Geometry};
    use stratagis_core::GeoTransform;

    fn transform(size: f64) -> GeoTransform {
        GeoTransform::new(0.0, size, 1.0, -1.0).unwrap()
    }

    /// 4x4 grid over [0,4]x[0,4], values 0..16 row-major from the top
    fn values() -> Raster<f64> {
        let data: Vec<f64> = (0..16).map(f64::from).collect();
        Raster::single(Band::from_vec(data, 4, 4).unwrap(), transform(4.0))
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: x0, y: y0),
            (x: x1, y: y0),
            (x: x1, y: y1),
            (x: x0, y: y1),
        ])
    }

    fn zones() -> FeatureCollection {
        let mut fc = FeatureCollection::new(["name"]);
        fc.add_feature(vec!["west".into()], Some(rect(0.0, 0.0, 2.0, 4.0))).unwrap();
        fc.add_feature(vec!["north_east".into()], Some(rect(2.0, 2.0, 4.0, 4.0))).unwrap();
        fc.add_feature(vec!["away".into()], Some(rect(10.0, 10.0, 12.0, 12.0))).unwrap();
        fc.add_feature(vec!["none".into()], None).unwrap();
        fc
    }

    #[test]
    fn test_vector_zones_mean() {
        let out = zonal_statistics(&zones(), &values(), &ZonalOptions::default()).unwrap();
        let fc = &out.collection;
        assert_eq!(fc.fields(), ["name", "mean"]);
        assert_eq!(fc.len(), 4);
        let means: Vec<_> = fc.iter().map(|f| f.value_at(1).as_f64()).collect();
        // West: 0,1,4,5,8,9,12,13. North-east: 2,3,6,7.
        assert_eq!(means, vec![Some(6.5), Some(4.5), None, None]);
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].kind, DiagnosticKind::EmptyGeometry);
        assert_eq!(out.diagnostics[0].left, Some(4));
    }

    #[test]
    fn test_vector_zones_count_and_named_field() {
        let opts = ZonalOptions {
            field: Some("cells".into()),
            ..ZonalOptions::new(Aggregate::Count)
        };
        let out = zonal_statistics(&zones(), &values(), &opts).unwrap();
        let counts: Vec<_> = out.collection.iter().map(|f| f.value_at(1).clone()).collect();
        assert_eq!(
            counts,
            vec![
                AttributeValue::Int(8),
                AttributeValue::Int(4),
                AttributeValue::Int(0),
                AttributeValue::Null,
            ]
        );
    }

    #[test]
    fn test_vector_zones_skip_nodata_cells() {
        let mut data: Vec<f64> = vec![1.0; 16];
        data[0] = -1.0;
        let band = Band::from_vec(data, 4, 4).unwrap().with_nodata(Some(-1.0));
        let raster = Raster::single(band, transform(4.0));
        let out = zonal_statistics(&zones(), &raster, &ZonalOptions::new(Aggregate::Sum)).unwrap();
        let west = out.collection.iter().next().unwrap();
        assert_eq!(west.value_at(1).as_f64(), Some(7.0));
    }

    #[test]
    fn test_vector_zones_keep_zero_cells_of_unsigned_raster() {
        let band = Band::from_vec(vec![0u8, 1, 0, 1], 2, 2).unwrap();
        let raster = Raster::single(band, transform(2.0));
        let mut fc = FeatureCollection::new(["name"]);
        fc.add_feature(vec!["all".into()], Some(rect(0.0, 0.0, 2.0, 2.0))).unwrap();

        let count = zonal_statistics(&fc, &raster, &ZonalOptions::new(Aggregate::Count)).unwrap();
        let zone = count.collection.iter().next().unwrap();
        assert_eq!(zone.value_at(1), &AttributeValue::Int(4));

        let mean = zonal_statistics(&fc, &raster, &ZonalOptions::new(Aggregate::Mean)).unwrap();
        let zone = mean.collection.iter().next().unwrap();
        assert_eq!(zone.value_at(1).as_f64(), Some(0.5));

        // An explicit nodata of 0 still drops the zeros.
        let band = Band::from_vec(vec![0u8, 1, 0, 1], 2, 2).unwrap().with_nodata(Some(0));
        let raster = Raster::single(band, transform(2.0));
        let count = zonal_statistics(&fc, &raster, &ZonalOptions::new(Aggregate::Count)).unwrap();
        let zone = count.collection.iter().next().unwrap();
        assert_eq!(zone.value_at(1), &AttributeValue::Int(2));
    }

    #[test]
    fn test_vector_zones_reject_text_statistic() {
        let opts = ZonalOptions::new(Aggregate::Concat(",".into()));
        assert!(matches!(
            zonal_statistics(&zones(), &values(), &opts),
            Err(Error::InvalidParameter { name: "aggregate", .. })
        ));
        let clash = ZonalOptions {
            field: Some("name".into()),
            ..Default::default()
        };
        assert!(zonal_statistics(&zones(), &values(), &clash).is_err());
    }

    fn zone_raster(f: impl Fn(usize, usize) -> i32) -> Raster<i32> {
        let data: Vec<i32> = (0..16).map(|i| f(i / 4, i % 4)).collect();
        Raster::single(Band::from_vec(data, 4, 4).unwrap(), transform(4.0))
    }

    #[test]
    fn test_zonal_by_raster() {
        let zones = zone_raster(|_, col| if col < 2 { 1 } else { 2 });
        let results = zonal_statistics_by_raster(&values(), &zones).unwrap();
        assert_eq!(results.len(), 2);

        let z1 = &results[&1];
        assert_eq!(z1.count, 8);
        assert_relative_eq!(z1.mean, 6.5);
        assert_relative_eq!(z1.min, 0.0);
        assert_relative_eq!(z1.max, 13.0);
        assert_relative_eq!(z1.median, 6.5);
        assert_eq!(results[&2].count, 8);
    }

    #[test]
    fn test_zonal_by_raster_skips_zero_and_nan() {
        let zones = zone_raster(|row, _| if row == 0 { 0 } else { 1 });
        let mut data = vec![5.0; 16];
        data[5] = f64::NAN;
        let values = Raster::single(Band::from_vec(data, 4, 4).unwrap(), transform(4.0));
        let results = zonal_statistics_by_raster(&values, &zones).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[&1].count, 11);
        assert_relative_eq!(results[&1].std_dev, 0.0);
    }

    #[test]
    fn test_zonal_dimension_mismatch() {
        let zones = Raster::single(Band::<i32>::filled(3, 3, 1), transform(3.0));
        assert!(matches!(
            zonal_statistics_by_raster(&values(), &zones),
            Err(Error::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_zonal_raster_output() {
        let zones = zone_raster(|row, _| if row < 2 { 1 } else { 0 });
        let out = zonal_statistics_raster(&values(), &zones, &Aggregate::Max).unwrap();
        let band = out.band(0).unwrap();
        assert_relative_eq!(band.get(0, 0).unwrap(), 7.0);
        assert_relative_eq!(band.get(1, 3).unwrap(), 7.0);
        assert!(band.get(3, 3).unwrap().is_nan());
    }
}
