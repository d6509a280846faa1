//! Spatial join of two feature collections
//!
//! For every left feature the right collection's spatial index prunes the
//! candidates, an optional attribute condition gates them, and the exact
//! predicate decides. Matches are emitted one row per pair or collapsed into
//! one row per left feature with the aggregation vocabulary. The output
//! geometry is the left geometry, or the intersection, union or difference
//! of the pair when a clip operation is requested.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use geo::Geometry;
use stratagis_core::index::SpatialIndex;
use stratagis_core::vector::{is_empty_geometry, AttributeValue, BoundingBox, Feature, FeatureCollection, FeatureId};
use stratagis_core::{Algorithm, Error, Result};
use tracing::{debug, warn};

use super::boolean::{check_operand, checks_operands, overlay_unchecked, union_unchecked, ClipOp, OverlayError};
use super::measurements::distance;
use super::predicates::SpatialPredicate;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::statistics::Aggregate;

/// Extra gate on a `(left, right)` pair, checked before the geometry test
pub type ConditionFn = Arc<dyn Fn(&Feature, &Feature) -> bool + Send + Sync>;

/// One aggregated output column
#[derive(Debug, Clone)]
pub struct FieldAggregation {
    /// Right-side field to read
    pub field: String,
    pub aggregate: Aggregate,
    /// Output field name; defaults to `<field>_<statistic>`
    pub output: Option<String>,
}

impl FieldAggregation {
    pub fn new(field: impl Into<String>, aggregate: Aggregate) -> Self {
        Self {
            field: field.into(),
            aggregate,
            output: None,
        }
    }

    pub fn named(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn output_name(&self) -> String {
        self.output
            .clone()
            .unwrap_or_else(|| format!("{}_{}", self.field, self.aggregate.name()))
    }
}

/// How one-to-many matches are written out
#[derive(Debug, Clone, Default)]
pub enum JoinMode {
    /// One row per matched pair: left fields then right fields
    #[default]
    Pairwise,
    /// One row per left feature: left fields then one column per aggregation
    Aggregate(Vec<FieldAggregation>),
}

/// Parameters for [`spatial_join`]
#[derive(Clone, Default)]
pub struct JoinOptions {
    pub predicate: SpatialPredicate,
    pub condition: Option<ConditionFn>,
    /// Emit left features without matches, with null right-side values
    pub keep_all: bool,
    pub mode: JoinMode,
    pub clip: Option<ClipOp>,
}

impl fmt::Debug for JoinOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinOptions")
            .field("predicate", &self.predicate)
            .field("condition", &self.condition.is_some())
            .field("keep_all", &self.keep_all)
            .field("mode", &self.mode)
            .field("clip", &self.clip)
            .finish()
    }
}

impl JoinOptions {
    pub fn new(predicate: SpatialPredicate) -> Self {
        Self {
            predicate,
            ..Default::default()
        }
    }

    pub fn with_condition(mut self, condition: impl Fn(&Feature, &Feature) -> bool + Send + Sync + 'static) -> Self {
        self.condition = Some(Arc::new(condition));
        self
    }

    pub fn keep_all(mut self, keep_all: bool) -> Self {
        self.keep_all = keep_all;
        self
    }

    pub fn aggregate(mut self, aggregations: Vec<FieldAggregation>) -> Self {
        self.mode = JoinMode::Aggregate(aggregations);
        self
    }

    pub fn clip(mut self, op: ClipOp) -> Self {
        self.clip = Some(op);
        self
    }
}

/// Joined collection plus the per-pair problems met on the way
#[derive(Debug, Clone)]
pub struct JoinOutput {
    pub collection: FeatureCollection,
    pub diagnostics: Vec<Diagnostic>,
}

struct Match<'a> {
    feature: &'a Feature,
    geometry: &'a Geometry<f64>,
}

struct Matcher<'a> {
    right: &'a FeatureCollection,
    index: &'a SpatialIndex,
    options: &'a JoinOptions,
}

impl<'a> Matcher<'a> {
    fn resolve(&self, id: FeatureId) -> Option<(&'a Feature, &'a Geometry<f64>)> {
        let feature = self.right.get(id)?;
        let geometry = feature.geometry()?;
        (!is_empty_geometry(geometry)).then_some((feature, geometry))
    }

    fn gate(&self, left: &Feature, right: &Feature) -> bool {
        self.options.condition.as_ref().map_or(true, |c| c(left, right))
    }

    fn test(&self, left: &Feature, geom: &Geometry<f64>, id: FeatureId) -> Option<Match<'a>> {
        let (feature, geometry) = self.resolve(id)?;
        if !self.gate(left, feature) || !self.options.predicate.evaluate(geom, geometry) {
            return None;
        }
        Some(Match { feature, geometry })
    }

    fn find(&self, left: &Feature, geom: &Geometry<f64>, bbox: BoundingBox) -> Vec<Match<'a>> {
        match self.options.predicate {
            SpatialPredicate::Disjoint => {
                // Disjoint bboxes need no exact test; overlapping ones do.
                let mut ids: Vec<(FeatureId, bool)> = self
                    .index
                    .disjoint(bbox)
                    .into_iter()
                    .map(|id| (id, false))
                    .chain(self.index.intersects(bbox).into_iter().map(|id| (id, true)))
                    .collect();
                ids.sort_unstable_by_key(|(id, _)| *id);
                ids.into_iter()
                    .filter_map(|(id, exact)| {
                        if exact {
                            return self.test(left, geom, id);
                        }
                        let (feature, geometry) = self.resolve(id)?;
                        self.gate(left, feature).then_some(Match { feature, geometry })
                    })
                    .collect()
            }
            SpatialPredicate::Distance { radius, k } => self.nearby(left, geom, bbox, radius, k),
            _ => self
                .index
                .intersects(bbox)
                .into_iter()
                .filter_map(|id| self.test(left, geom, id))
                .collect(),
        }
    }

    /// Candidates within `limit` of `geom`, closest first, ties by insertion
    fn scored(&self, left: &Feature, geom: &Geometry<f64>, bbox: BoundingBox, limit: f64) -> Vec<(f64, Match<'a>)> {
        let mut scored: Vec<(f64, Match<'a>)> = self
            .index
            .intersects(bbox.expand(limit))
            .into_iter()
            .filter_map(|id| self.resolve(id))
            .filter(|(feature, _)| self.gate(left, feature))
            .map(|(feature, geometry)| (distance(geom, geometry), Match { feature, geometry }))
            .filter(|(d, _)| *d <= limit)
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.feature.id().cmp(&b.1.feature.id())));
        scored
    }

    fn nearby(
        &self,
        left: &Feature,
        geom: &Geometry<f64>,
        bbox: BoundingBox,
        radius: Option<f64>,
        k: Option<usize>,
    ) -> Vec<Match<'a>> {
        fn take<'m>(scored: Vec<(f64, Match<'m>)>, k: usize) -> Vec<Match<'m>> {
            scored.into_iter().take(k).map(|(_, m)| m).collect()
        }
        match (radius, k) {
            (Some(r), None) => self.scored(left, geom, bbox, r).into_iter().map(|(_, m)| m).collect(),
            (Some(r), Some(k)) => take(self.scored(left, geom, bbox, r), k),
            (None, None) => self
                .right
                .iter()
                .filter_map(|f| self.resolve(f.id()))
                .filter(|(feature, _)| self.gate(left, feature))
                .map(|(feature, geometry)| Match { feature, geometry })
                .collect(),
            (None, Some(0)) => Vec::new(),
            (None, Some(k)) => {
                // The k bbox-nearest seed a search radius; everything within
                // the farthest seed's exact distance is then ranked exactly.
                let mut probe = k;
                loop {
                    let seeds = self.index.nearest(bbox, probe);
                    let reach = seeds
                        .iter()
                        .filter_map(|&id| self.resolve(id))
                        .map(|(_, g)| distance(geom, g))
                        .fold(0.0_f64, f64::max);
                    let scored = self.scored(left, geom, bbox, reach);
                    if scored.len() >= k || probe >= self.index.len() {
                        return take(scored, k);
                    }
                    probe = (probe * 2).min(self.index.len());
                }
            }
        }
    }
}

/// Output column names: left fields, then `extra` renamed away from clashes
fn output_fields(left: &FeatureCollection, extra: Vec<String>) -> Vec<String> {
    let mut fields: Vec<String> = left.fields().to_vec();
    for name in extra {
        let mut candidate = name.clone();
        while fields.contains(&candidate) {
            candidate.push_str("_right");
        }
        fields.push(candidate);
    }
    fields
}

type Checked = std::result::Result<(), OverlayError>;
type ClipTarget = std::result::Result<Option<Geometry<f64>>, OverlayError>;

/// Overlay operand checks, run once per geometry for the whole join
#[derive(Default)]
struct OperandChecks {
    right: HashMap<FeatureId, Checked>,
}

impl OperandChecks {
    fn right(&mut self, m: &Match<'_>) -> Checked {
        self.right
            .entry(m.feature.id())
            .or_insert_with(|| check_operand(m.geometry))
            .clone()
    }

    /// Clip target for a single match
    fn single(&mut self, left: &Checked, geom: &Geometry<f64>, m: &Match<'_>) -> ClipTarget {
        left.clone()?;
        if checks_operands(geom) {
            self.right(m)?;
        }
        Ok(Some(m.geometry.clone()))
    }

    /// Clip target for several matches: their union
    fn union(&mut self, left: &Checked, matches: &[Match<'_>]) -> ClipTarget {
        left.clone()?;
        for m in matches {
            self.right(m)?;
        }
        union_unchecked(matches.iter().map(|m| m.geometry))
    }
}

/// Overlay `geom` with a target whose operands are already checked
fn clipped(
    left: &Feature,
    geom: &Geometry<f64>,
    right: Option<FeatureId>,
    target: ClipTarget,
    op: ClipOp,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<Geometry<f64>> {
    let outcome = target.and_then(|target| match target {
        Some(target) => overlay_unchecked(geom, &target, op),
        None => Err(OverlayError::Unsupported("no polygonal geometry to clip with".into())),
    });
    match outcome {
        Ok(result) => result,
        Err(err) => {
            warn!(left = left.id(), right = ?right, %err, "clip failed, geometry set to null");
            diagnostics.push(Diagnostic {
                left: Some(left.id()),
                right,
                kind: err.kind(),
                message: err.to_string(),
            });
            None
        }
    }
}

/// Join `left` with `right` under `options`.
///
/// Uses the right collection's spatial index when it has one and builds a
/// temporary index otherwise. Fails only on configuration problems; per-pair
/// geometric failures become diagnostics and null geometries.
pub fn spatial_join(left: &FeatureCollection, right: &FeatureCollection, options: &JoinOptions) -> Result<JoinOutput> {
    if let SpatialPredicate::Distance { radius: Some(r), .. } = options.predicate {
        if !(r >= 0.0) {
            return Err(Error::InvalidParameter {
                name: "radius",
                value: r.to_string(),
                reason: "distance radius must be a non-negative number".into(),
            });
        }
    }

    let (fields, columns) = match &options.mode {
        JoinMode::Pairwise => (output_fields(left, right.fields().to_vec()), Vec::new()),
        JoinMode::Aggregate(aggs) => {
            let columns = aggs
                .iter()
                .map(|agg| {
                    right
                        .field_index(&agg.field)
                        .ok_or_else(|| Error::UnknownField(agg.field.clone()))
                })
                .collect::<Result<Vec<usize>>>()?;
            (output_fields(left, aggs.iter().map(FieldAggregation::output_name).collect()), columns)
        }
    };

    let index = right.index_or_build();
    let matcher = Matcher {
        right,
        index: &index,
        options,
    };
    let mut out = FeatureCollection::with_config(fields, *left.index_config());
    let mut diagnostics = Vec::new();
    let mut pairs = 0usize;
    let null_right = vec![AttributeValue::Null; right.fields().len()];
    let mut checks = OperandChecks::default();

    for feature in left {
        let usable = feature
            .geometry()
            .filter(|g| !is_empty_geometry(g))
            .zip(feature.bbox());
        let matches = match usable {
            Some((geom, bbox)) => matcher.find(feature, geom, bbox),
            None => {
                diagnostics.push(Diagnostic::feature(
                    feature.id(),
                    DiagnosticKind::EmptyGeometry,
                    "left feature has no geometry to compare",
                ));
                Vec::new()
            }
        };
        pairs += matches.len();

        if matches.is_empty() {
            if options.keep_all {
                let mut row = feature.row().to_vec();
                match &options.mode {
                    JoinMode::Pairwise => row.extend(null_right.iter().cloned()),
                    JoinMode::Aggregate(aggs) => row.extend(aggs.iter().map(|_| AttributeValue::Null)),
                }
                out.add_feature(row, feature.geometry().cloned())?;
            }
            continue;
        }
        let Some(geom) = feature.geometry() else {
            continue;
        };
        let left_check = match options.clip {
            Some(_) if checks_operands(geom) => check_operand(geom),
            _ => Ok(()),
        };

        match &options.mode {
            JoinMode::Pairwise => {
                for m in &matches {
                    let mut row = feature.row().to_vec();
                    row.extend(m.feature.row().iter().cloned());
                    let geometry = match options.clip {
                        Some(op) => clipped(
                            feature,
                            geom,
                            Some(m.feature.id()),
                            checks.single(&left_check, geom, m),
                            op,
                            &mut diagnostics,
                        ),
                        None => Some(geom.clone()),
                    };
                    out.add_feature(row, geometry)?;
                }
            }
            JoinMode::Aggregate(aggs) => {
                let mut row = feature.row().to_vec();
                for (agg, &column) in aggs.iter().zip(&columns) {
                    let values: Vec<AttributeValue> =
                        matches.iter().map(|m| m.feature.value_at(column).clone()).collect();
                    row.push(agg.aggregate.apply(&values));
                }
                let geometry = match options.clip {
                    Some(op) => {
                        let target = match matches.as_slice() {
                            [only] => checks.single(&left_check, geom, only),
                            many => checks.union(&left_check, many),
                        };
                        let right_id = (matches.len() == 1).then(|| matches[0].feature.id());
                        clipped(feature, geom, right_id, target, op, &mut diagnostics)
                    }
                    None => Some(geom.clone()),
                };
                out.add_feature(row, geometry)?;
            }
        }
    }

    debug!(
        left = left.len(),
        right = right.len(),
        pairs,
        rows = out.len(),
        diagnostics = diagnostics.len(),
        "spatial join"
    );
    Ok(JoinOutput {
        collection: out,
        diagnostics,
    })
}

/// Spatial join as an [`Algorithm`]; the input is `(left, right)`
#[derive(Debug, Clone, Default)]
pub struct SpatialJoin;

impl Algorithm for SpatialJoin {
    type Input = (FeatureCollection, FeatureCollection);
    type Output = JoinOutput;
    type Params = JoinOptions;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Spatial Join"
    }

    fn description(&self) -> &'static str {
        "Match features of two collections under a spatial predicate"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (left, right) = input;
        spatial_join(&left, &right, &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::area;
    use approx::assert_relative_eq;
    use geo::{point, polygon};

    fn square(x: f64, y: f64, size: f64) -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
        ])
    }

    fn pt(x: f64, y: f64) -> Geometry<f64> {
        Geometry::Point(point!(x: x, y: y))
    }

    fn zones() -> FeatureCollection {
        let mut fc = FeatureCollection::new(["zone"]);
        fc.add_feature(vec!["a".into()], Some(square(0.0, 0.0, 10.0))).unwrap();
        fc.add_feature(vec!["b".into()], Some(square(20.0, 0.0, 10.0))).unwrap();
        fc.add_feature(vec!["c".into()], Some(square(40.0, 0.0, 10.0))).unwrap();
        fc
    }

    fn points() -> FeatureCollection {
        let mut fc = FeatureCollection::new(["kind", "pop"]);
        fc.add_feature(vec!["x".into(), AttributeValue::Int(1)], Some(pt(1.0, 1.0))).unwrap();
        fc.add_feature(vec!["y".into(), AttributeValue::Int(2)], Some(pt(2.0, 2.0))).unwrap();
        fc.add_feature(vec!["x".into(), AttributeValue::Int(3)], Some(pt(3.0, 3.0))).unwrap();
        fc.add_feature(vec!["y".into(), AttributeValue::Int(4)], Some(pt(4.0, 4.0))).unwrap();
        fc.add_feature(vec!["x".into(), AttributeValue::Int(7)], Some(pt(21.0, 1.0))).unwrap();
        fc
    }

    #[test]
    fn test_pairwise_contains() {
        let out = spatial_join(&zones(), &points(), &JoinOptions::new(SpatialPredicate::Contains)).unwrap();
        let fc = out.collection;
        assert_eq!(fc.fields(), ["zone", "kind", "pop"]);
        assert_eq!(fc.len(), 5);
        let zones: Vec<_> = fc.iter().map(|f| f.value_at(0).to_string()).collect();
        assert_eq!(zones, ["a", "a", "a", "a", "b"]);
    }

    #[test]
    fn test_aggregate_statistics() {
        let aggs = vec![
            FieldAggregation::new("pop", Aggregate::Sum),
            FieldAggregation::new("pop", Aggregate::Mean),
            FieldAggregation::new("pop", Aggregate::Count),
            FieldAggregation::new("pop", Aggregate::Max),
            FieldAggregation::new("pop", Aggregate::Min),
            FieldAggregation::new("kind", Aggregate::Concat("+".into())).named("kinds"),
        ];
        let opts = JoinOptions::new(SpatialPredicate::Intersects).aggregate(aggs);
        let out = spatial_join(&zones(), &points(), &opts).unwrap();
        let fc = out.collection;
        assert_eq!(
            fc.fields(),
            ["zone", "pop_sum", "pop_mean", "pop_count", "pop_max", "pop_min", "kinds"]
        );
        assert_eq!(fc.len(), 2);
        let a = fc.iter().next().unwrap();
        assert_eq!(fc.value(a, "pop_sum").unwrap().as_f64(), Some(10.0));
        assert_eq!(fc.value(a, "pop_mean").unwrap().as_f64(), Some(2.5));
        assert_eq!(fc.value(a, "pop_count").unwrap().as_f64(), Some(4.0));
        assert_eq!(fc.value(a, "pop_max").unwrap().as_f64(), Some(4.0));
        assert_eq!(fc.value(a, "pop_min").unwrap().as_f64(), Some(1.0));
        assert_eq!(fc.value(a, "kinds").unwrap(), &AttributeValue::from("x+y+x+y"));
    }

    #[test]
    fn test_keep_all_cardinality() {
        let opts = JoinOptions::new(SpatialPredicate::Intersects)
            .aggregate(vec![FieldAggregation::new("pop", Aggregate::Sum)])
            .keep_all(true);
        let out = spatial_join(&zones(), &points(), &opts).unwrap();
        assert_eq!(out.collection.len(), 3);
        let c = out.collection.iter().last().unwrap();
        assert_eq!(c.value_at(0), &AttributeValue::from("c"));
        assert!(c.value_at(1).is_null());

        let pairwise = JoinOptions::new(SpatialPredicate::Within).keep_all(true);
        let out = spatial_join(&zones(), &points(), &pairwise).unwrap();
        assert_eq!(out.collection.len(), 3);
        assert!(out.collection.iter().all(|f| f.value_at(1).is_null()));
    }

    #[test]
    fn test_condition_gates_pairs() {
        let opts = JoinOptions::new(SpatialPredicate::Contains)
            .with_condition(|_, right| right.value_at(0) == &AttributeValue::from("x"));
        let out = spatial_join(&zones(), &points(), &opts).unwrap();
        assert_eq!(out.collection.len(), 3);
    }

    #[test]
    fn test_disjoint() {
        let out = spatial_join(&zones(), &points(), &JoinOptions::new(SpatialPredicate::Disjoint)).unwrap();
        // a: 1 point outside, b: 4 outside, c: all 5
        assert_eq!(out.collection.len(), 1 + 4 + 5);
    }

    #[test]
    fn test_distance_radius_and_nearest() {
        let mut probe = FeatureCollection::new(["name"]);
        probe.add_feature(vec!["p".into()], Some(pt(0.0, 0.0))).unwrap();

        let radius = JoinOptions::new(SpatialPredicate::within_distance(3.0));
        let out = spatial_join(&probe, &points(), &radius).unwrap();
        // (1,1) and (2,2) lie within 3; (3,3) is 4.24 away.
        assert_eq!(out.collection.len(), 2);

        let nearest = JoinOptions::new(SpatialPredicate::nearest(3));
        let out = spatial_join(&probe, &points(), &nearest).unwrap();
        let pops: Vec<_> = out.collection.iter().map(|f| f.value_at(2).clone()).collect();
        assert_eq!(pops, vec![AttributeValue::Int(1), AttributeValue::Int(2), AttributeValue::Int(3)]);

        let with_condition = JoinOptions::new(SpatialPredicate::nearest(2))
            .with_condition(|_, right| right.value_at(0) == &AttributeValue::from("y"));
        let out = spatial_join(&probe, &points(), &with_condition).unwrap();
        let pops: Vec<_> = out.collection.iter().map(|f| f.value_at(2).clone()).collect();
        assert_eq!(pops, vec![AttributeValue::Int(2), AttributeValue::Int(4)]);
    }

    #[test]
    fn test_negative_radius_rejected() {
        let opts = JoinOptions::new(SpatialPredicate::within_distance(-1.0));
        assert!(matches!(
            spatial_join(&zones(), &points(), &opts),
            Err(Error::InvalidParameter { name: "radius", .. })
        ));
    }

    #[test]
    fn test_unknown_aggregate_field() {
        let opts = JoinOptions::new(SpatialPredicate::Intersects)
            .aggregate(vec![FieldAggregation::new("missing", Aggregate::Sum)]);
        assert!(matches!(
            spatial_join(&zones(), &points(), &opts),
            Err(Error::UnknownField(_))
        ));
    }

    #[test]
    fn test_clip_intersection_and_invalid_target() {
        let mut left = FeatureCollection::new(["id"]);
        left.add_feature(vec![AttributeValue::Int(1)], Some(square(0.0, 0.0, 2.0))).unwrap();

        let mut right = FeatureCollection::new(["id"]);
        right.add_feature(vec![AttributeValue::Int(10)], Some(square(1.0, 1.0, 2.0))).unwrap();
        let bowtie = Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 3.0, y: 3.0),
            (x: 3.0, y: 0.0),
            (x: 0.0, y: 1.0),
        ]);
        right.add_feature(vec![AttributeValue::Int(11)], Some(bowtie)).unwrap();

        let opts = JoinOptions::new(SpatialPredicate::Intersects).clip(ClipOp::Intersection);
        let out = spatial_join(&left, &right, &opts).unwrap();
        let fc = out.collection;
        assert_eq!(fc.fields(), ["id", "id_right"]);
        assert_eq!(fc.len(), 2);
        let rows: Vec<_> = fc.iter().collect();
        assert_relative_eq!(area(rows[0].geometry().unwrap()), 1.0, epsilon = 1e-9);
        assert!(rows[1].geometry().is_none());
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].kind, DiagnosticKind::InvalidClipTarget);
        assert_eq!(out.diagnostics[0].right, Some(2));
    }

    #[test]
    fn test_clip_checks_each_operand_once() {
        let bowtie = Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 3.0, y: 3.0),
            (x: 3.0, y: 0.0),
            (x: 0.0, y: 1.0),
        ]);
        // Invalid left: every pair fails, each with its right id.
        let mut left = FeatureCollection::new(["id"]);
        left.add_feature(vec![AttributeValue::Int(1)], Some(bowtie.clone())).unwrap();
        let mut right = FeatureCollection::new(["id"]);
        right.add_feature(vec![AttributeValue::Int(10)], Some(square(0.0, 0.0, 1.0))).unwrap();
        right.add_feature(vec![AttributeValue::Int(11)], Some(square(2.0, 0.0, 1.0))).unwrap();
        let opts = JoinOptions::new(SpatialPredicate::Intersects).clip(ClipOp::Intersection);
        let out = spatial_join(&left, &right, &opts).unwrap();
        assert_eq!(out.collection.len(), 2);
        assert!(out.collection.iter().all(|f| f.geometry().is_none()));
        let mut rights: Vec<_> = out.diagnostics.iter().map(|d| d.right).collect();
        rights.sort_unstable();
        assert_eq!(rights, vec![Some(1), Some(2)]);

        // One invalid right shared by two left features is checked once.
        let mut left = FeatureCollection::new(["id"]);
        left.add_feature(vec![AttributeValue::Int(1)], Some(square(0.0, 0.0, 1.0))).unwrap();
        left.add_feature(vec![AttributeValue::Int(2)], Some(square(2.0, 0.0, 1.0))).unwrap();
        let mut right = FeatureCollection::new(["id"]);
        right.add_feature(vec![AttributeValue::Int(10)], Some(bowtie)).unwrap();
        let mut checks = OperandChecks::default();
        for feature in &left {
            let geom = feature.geometry().unwrap();
            let m = Match {
                feature: right.get(1).unwrap(),
                geometry: right.get(1).unwrap().geometry().unwrap(),
            };
            assert!(checks.single(&check_operand(geom), geom, &m).is_err());
        }
        assert_eq!(checks.right.len(), 1);
        let out = spatial_join(&left, &right, &opts).unwrap();
        assert_eq!(out.diagnostics.len(), 2);
        assert!(out.diagnostics.iter().all(|d| d.kind == DiagnosticKind::InvalidClipTarget));
    }

    #[test]
    fn test_aggregate_clip_uses_union_of_matches() {
        let mut left = FeatureCollection::new(["id"]);
        left.add_feature(vec![AttributeValue::Int(1)], Some(square(0.0, 0.0, 4.0))).unwrap();
        let mut right = FeatureCollection::new(["v"]);
        right.add_feature(vec![AttributeValue::Int(1)], Some(square(-1.0, -1.0, 2.0))).unwrap();
        right.add_feature(vec![AttributeValue::Int(1)], Some(square(3.0, 3.0, 2.0))).unwrap();

        let opts = JoinOptions::new(SpatialPredicate::Intersects)
            .aggregate(vec![FieldAggregation::new("v", Aggregate::Count)])
            .clip(ClipOp::Difference);
        let out = spatial_join(&left, &right, &opts).unwrap();
        let f = out.collection.iter().next().unwrap();
        assert_relative_eq!(area(f.geometry().unwrap()), 14.0, epsilon = 1e-9);
    }

    #[test]
    fn test_empty_left_geometry_is_reported() {
        let mut left = FeatureCollection::new(["id"]);
        left.add_feature(vec![AttributeValue::Int(1)], None).unwrap();
        let out = spatial_join(&left, &points(), &JoinOptions::default().keep_all(true)).unwrap();
        assert_eq!(out.collection.len(), 1);
        assert_eq!(out.diagnostics[0].kind, DiagnosticKind::EmptyGeometry);
    }
}
