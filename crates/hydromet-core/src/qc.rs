//! Quality-control range filter.
//!
//! Every raw reading passes through [`filter`] before it reaches the
//! observation assembler. A reading that is NaN or outside the physical
//! bounds for its quantity is replaced by the quantity's sentinel error
//! value; everything else passes through unchanged. There are no
//! sensor-specific exceptions.

/// Physical quantity a reading measures, with its QC bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    /// Air/water temperature, °C
    Temperature,
    /// Barometric pressure, hPa
    Pressure,
    /// Relative humidity, %
    Humidity,
}

impl Quantity {
    /// Inclusive (min, max) physical bounds.
    pub const fn bounds(self) -> (f32, f32) {
        match self {
            Quantity::Temperature => (-40.0, 60.0),
            Quantity::Pressure => (300.0, 1100.0),
            Quantity::Humidity => (0.0, 100.0),
        }
    }

    /// Sentinel substituted for readings that fail QC.
    pub const fn error_value(self) -> f32 {
        match self {
            Quantity::Temperature => -999.9,
            Quantity::Pressure => -999.9,
            Quantity::Humidity => -999.9,
        }
    }
}

/// Clamp a raw reading to sane physical bounds.
///
/// Returns `raw` exactly when it is finite and within bounds, the quantity's
/// sentinel otherwise.
pub fn filter(quantity: Quantity, raw: f32) -> f32 {
    let (min, max) = quantity.bounds();
    if raw.is_nan() || raw < min || raw > max {
        quantity.error_value()
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_range_passes_through_exactly() {
        assert_eq!(filter(Quantity::Temperature, 25.0625), 25.0625);
        assert_eq!(filter(Quantity::Pressure, 1013.25), 1013.25);
        assert_eq!(filter(Quantity::Humidity, 0.0), 0.0);
        assert_eq!(filter(Quantity::Humidity, 100.0), 100.0);
    }

    #[test]
    fn bounds_are_inclusive() {
        assert_eq!(filter(Quantity::Temperature, -40.0), -40.0);
        assert_eq!(filter(Quantity::Temperature, 60.0), 60.0);
    }

    #[test]
    fn out_of_range_becomes_sentinel() {
        assert_eq!(
            filter(Quantity::Temperature, 85.0),
            Quantity::Temperature.error_value()
        );
        assert_eq!(
            filter(Quantity::Temperature, -55.0),
            Quantity::Temperature.error_value()
        );
        assert_eq!(
            filter(Quantity::Pressure, 120.0),
            Quantity::Pressure.error_value()
        );
        assert_eq!(
            filter(Quantity::Humidity, 101.3),
            Quantity::Humidity.error_value()
        );
    }

    #[test]
    fn nan_becomes_sentinel() {
        assert_eq!(
            filter(Quantity::Pressure, f32::NAN),
            Quantity::Pressure.error_value()
        );
    }
}
