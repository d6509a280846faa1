//! Raster element trait for generic cell values

use num_traits::{NumCast, One, Zero};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Storage type of a raster band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Binary cells stored one per byte (values 0 or 1)
    Bit1,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
}

impl DataType {
    pub fn is_float(self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }
}

/// Trait for types that can be stored in a raster cell.
///
/// This trait bounds the types that can be used as raster values,
/// ensuring they support necessary numeric operations.
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + One + Send + Sync + 'static
{
    /// Natural storage type for this element
    const DATA_TYPE: DataType;

    /// Default no-data value for this type
    fn default_nodata() -> Self;

    /// Check if this value represents no-data
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }

    /// Convert from f64, `None` if the value does not fit
    fn from_f64(value: f64) -> Option<Self> {
        NumCast::from(value)
    }
}

macro_rules! impl_raster_element_int {
    ($t:ty, $dt:expr) => {
        impl RasterElement for $t {
            const DATA_TYPE: DataType = $dt;

            fn default_nodata() -> Self {
                <$t>::MIN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                match nodata {
                    Some(nd) => *self == nd,
                    None => false,
                }
            }
        }
    };
}

macro_rules! impl_raster_element_float {
    ($t:ty, $dt:expr) => {
        impl RasterElement for $t {
            const DATA_TYPE: DataType = $dt;

            fn default_nodata() -> Self {
                <$t>::NAN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                if self.is_nan() {
                    return true;
                }
                match nodata {
                    Some(nd) => (self - nd).abs() < <$t>::EPSILON * 100.0,
                    None => false,
                }
            }
        }
    };
}

impl_raster_element_int!(u8, DataType::UInt8);
impl_raster_element_int!(i16, DataType::Int16);
impl_raster_element_int!(u16, DataType::UInt16);
impl_raster_element_int!(i32, DataType::Int32);
impl_raster_element_int!(u32, DataType::UInt32);
impl_raster_element_float!(f32, DataType::Float32);
impl_raster_element_float!(f64, DataType::Float64);
