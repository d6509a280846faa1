//! Aggregation vocabulary shared by the join engine, the rasterizer and
//! zonal statistics
//!
//! Every statistic reduces a list of values to one. Values that should be
//! numbers but cannot be read as numbers are left out of numeric statistics
//! instead of failing the whole reduction.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use stratagis_core::{AttributeValue, Error, Result};

/// User supplied reduction over the matched values
pub type CustomFn = Arc<dyn Fn(&[AttributeValue]) -> AttributeValue + Send + Sync>;

/// A statistic combining several values into one
#[derive(Clone)]
pub enum Aggregate {
    /// Number of non-null values
    Count,
    Sum,
    Max,
    Min,
    Mean,
    /// First non-null value in match order
    First,
    /// Last non-null value in match order
    Last,
    /// Most frequent value; ties go to the smallest value
    Majority,
    /// Least frequent value; ties go to the smallest value
    Minority,
    Median,
    /// Population standard deviation
    StdDev,
    /// `max - min`
    Range,
    /// Number of distinct non-null values
    Variety,
    /// Display form of the non-null values joined by a delimiter
    Concat(String),
    Custom(CustomFn),
}

impl fmt::Debug for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregate::Concat(delim) => f.debug_tuple("Concat").field(delim).finish(),
            Aggregate::Custom(_) => f.write_str("Custom(..)"),
            other => f.write_str(other.name()),
        }
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregate::Concat(delim) => write!(f, "{delim}concat"),
            other => f.write_str(other.name()),
        }
    }
}

impl FromStr for Aggregate {
    type Err = Error;

    /// Parse a statistic name. `"<delim>concat"` selects concatenation with
    /// the given delimiter, e.g. `", concat"`.
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        let agg = match lower.trim() {
            "count" => Aggregate::Count,
            "sum" => Aggregate::Sum,
            "max" => Aggregate::Max,
            "min" => Aggregate::Min,
            "mean" | "avg" => Aggregate::Mean,
            "first" => Aggregate::First,
            "last" => Aggregate::Last,
            "majority" => Aggregate::Majority,
            "minority" => Aggregate::Minority,
            "median" => Aggregate::Median,
            "std" | "stddev" | "std_dev" => Aggregate::StdDev,
            "range" => Aggregate::Range,
            "variety" => Aggregate::Variety,
            _ if lower.ends_with("concat") => {
                Aggregate::Concat(s[..s.len() - "concat".len()].to_string())
            }
            _ => {
                return Err(Error::InvalidParameter {
                    name: "aggregate",
                    value: s.to_string(),
                    reason: "unknown statistic".into(),
                })
            }
        };
        Ok(agg)
    }
}

/// Sort key putting numbers before text
#[derive(Debug, Clone, PartialEq)]
enum Key {
    Num(f64),
    Text(String),
}

impl Key {
    fn of(value: &AttributeValue) -> Option<Key> {
        match value {
            AttributeValue::Null => None,
            AttributeValue::Bool(b) => Some(Key::Text(b.to_string())),
            AttributeValue::String(s) => Some(match value.as_f64() {
                Some(v) => Key::Num(v),
                None => Key::Text(s.clone()),
            }),
            other => other.as_f64().map(Key::Num),
        }
    }

    fn cmp(&self, other: &Key) -> Ordering {
        match (self, other) {
            (Key::Num(a), Key::Num(b)) => a.total_cmp(b),
            (Key::Num(_), Key::Text(_)) => Ordering::Less,
            (Key::Text(_), Key::Num(_)) => Ordering::Greater,
            (Key::Text(a), Key::Text(b)) => a.cmp(b),
        }
    }
}

/// Runs of equal values after sorting, as `(index of representative, count)`
fn frequency_runs<K>(sorted: &[K], eq: impl Fn(&K, &K) -> bool) -> Vec<(usize, usize)> {
    let mut runs: Vec<(usize, usize)> = Vec::new();
    for (i, k) in sorted.iter().enumerate() {
        match runs.last_mut() {
            Some((start, count)) if eq(&sorted[*start], k) => *count += 1,
            _ => runs.push((i, 1)),
        }
    }
    runs
}

fn pick_run(runs: &[(usize, usize)], majority: bool) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for &(idx, count) in runs {
        let better = match best {
            None => true,
            Some((_, c)) if majority => count > c,
            Some((_, c)) => count < c,
        };
        if better {
            best = Some((idx, count));
        }
    }
    best.map(|(idx, _)| idx)
}

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

impl Aggregate {
    /// Wrap a closure as a custom statistic
    pub fn custom(f: impl Fn(&[AttributeValue]) -> AttributeValue + Send + Sync + 'static) -> Self {
        Aggregate::Custom(Arc::new(f))
    }

    /// Short lowercase name, used to derive output field names
    pub fn name(&self) -> &'static str {
        match self {
            Aggregate::Count => "count",
            Aggregate::Sum => "sum",
            Aggregate::Max => "max",
            Aggregate::Min => "min",
            Aggregate::Mean => "mean",
            Aggregate::First => "first",
            Aggregate::Last => "last",
            Aggregate::Majority => "majority",
            Aggregate::Minority => "minority",
            Aggregate::Median => "median",
            Aggregate::StdDev => "stddev",
            Aggregate::Range => "range",
            Aggregate::Variety => "variety",
            Aggregate::Concat(_) => "concat",
            Aggregate::Custom(_) => "custom",
        }
    }

    /// Whether the statistic can produce a number from numbers
    pub fn is_numeric(&self) -> bool {
        !matches!(self, Aggregate::Concat(_))
    }

    /// Reduce attribute values.
    ///
    /// Nulls are ignored. An empty input gives `Int(0)` for `Count` and
    /// `Variety` and `Null` for everything else.
    pub fn apply(&self, values: &[AttributeValue]) -> AttributeValue {
        let present = || values.iter().filter(|v| !v.is_null());
        match self {
            Aggregate::Count => AttributeValue::Int(present().count() as i64),
            Aggregate::First => present().next().cloned().unwrap_or_default(),
            Aggregate::Last => present().last().cloned().unwrap_or_default(),
            Aggregate::Concat(delim) => {
                let parts: Vec<String> = present().map(ToString::to_string).collect();
                if parts.is_empty() {
                    AttributeValue::Null
                } else {
                    AttributeValue::String(parts.join(delim))
                }
            }
            Aggregate::Custom(f) => f(values),
            Aggregate::Max | Aggregate::Min => {
                // Numbers win over text; text is only compared when nothing parses.
                let keyed: Vec<(Key, &AttributeValue)> =
                    present().filter_map(|v| Key::of(v).map(|k| (k, v))).collect();
                let numeric = keyed.iter().any(|(k, _)| matches!(k, Key::Num(_)));
                let candidates = keyed
                    .into_iter()
                    .filter(|(k, _)| !numeric || matches!(k, Key::Num(_)));
                let chosen = if matches!(self, Aggregate::Max) {
                    candidates.max_by(|a, b| a.0.cmp(&b.0))
                } else {
                    candidates.min_by(|a, b| a.0.cmp(&b.0))
                };
                chosen.map(|(_, v)| v.clone()).unwrap_or_default()
            }
            Aggregate::Majority | Aggregate::Minority | Aggregate::Variety => {
                let mut keyed: Vec<(Key, &AttributeValue)> =
                    present().filter_map(|v| Key::of(v).map(|k| (k, v))).collect();
                keyed.sort_by(|a, b| a.0.cmp(&b.0));
                let runs = frequency_runs(&keyed, |a, b| a.0.cmp(&b.0) == Ordering::Equal);
                if matches!(self, Aggregate::Variety) {
                    return AttributeValue::Int(runs.len() as i64);
                }
                pick_run(&runs, matches!(self, Aggregate::Majority))
                    .map(|idx| keyed[idx].1.clone())
                    .unwrap_or_default()
            }
            Aggregate::Sum
            | Aggregate::Mean
            | Aggregate::Median
            | Aggregate::StdDev
            | Aggregate::Range => {
                let numbers: Vec<f64> = present().filter_map(AttributeValue::as_f64).collect();
                self.apply_f64(&numbers)
                    .map(AttributeValue::from_f64)
                    .unwrap_or_default()
            }
        }
    }

    /// Reduce plain numbers, as used for raster cells.
    ///
    /// NaN inputs are ignored. Returns `None` for an empty input (except
    /// `Count` and `Variety`, which give 0) and for `Concat`.
    pub fn apply_f64(&self, values: &[f64]) -> Option<f64> {
        let mut numbers: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        match self {
            Aggregate::Count => return Some(numbers.len() as f64),
            Aggregate::Concat(_) => return None,
            Aggregate::Custom(f) => {
                let attrs: Vec<AttributeValue> =
                    numbers.into_iter().map(AttributeValue::Float).collect();
                return f(&attrs).as_f64();
            }
            _ => {}
        }
        if numbers.is_empty() {
            return matches!(self, Aggregate::Variety).then_some(0.0);
        }

        let n = numbers.len() as f64;
        let sum: f64 = numbers.iter().sum();
        let value = match self {
            Aggregate::Sum => sum,
            Aggregate::Mean => sum / n,
            Aggregate::First => numbers[0],
            Aggregate::Last => numbers[numbers.len() - 1],
            Aggregate::StdDev => {
                let mean = sum / n;
                (numbers.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n).sqrt()
            }
            Aggregate::Max => numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Aggregate::Min => numbers.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregate::Range => {
                let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
                max - min
            }
            Aggregate::Median => {
                numbers.sort_by(f64::total_cmp);
                median(&numbers)
            }
            Aggregate::Majority | Aggregate::Minority | Aggregate::Variety => {
                numbers.sort_by(f64::total_cmp);
                let runs = frequency_runs(&numbers, |a, b| a == b);
                if matches!(self, Aggregate::Variety) {
                    return Some(runs.len() as f64);
                }
                let idx = pick_run(&runs, matches!(self, Aggregate::Majority))?;
                numbers[idx]
            }
            Aggregate::Count | Aggregate::Concat(_) | Aggregate::Custom(_) => return None,
        };
        Some(value)
    }
}
