use crate::models::{Classification, SeverityBand};

/// Wear value at which the tool is considered fully consumed.
pub const FULL_WEAR: f64 = 300.0;

pub fn classify(wear_value: f64) -> Classification {
    Classification {
        band: severity_band(wear_value),
        capacity_percent: capacity_percent(wear_value),
    }
}

/// Upper bounds are inclusive: 50.0 is still `Lowest`.
pub fn severity_band(wear_value: f64) -> SeverityBand {
    if wear_value <= 50.0 {
        SeverityBand::Lowest
    } else if wear_value <= 100.0 {
        SeverityBand::Low
    } else if wear_value <= 150.0 {
        SeverityBand::Moderate
    } else if wear_value <= 200.0 {
        SeverityBand::Elevated
    } else if wear_value <= 250.0 {
        SeverityBand::High
    } else {
        SeverityBand::Critical
    }
}

/// Remaining tool life in percent; higher wear means lower capacity.
pub fn capacity_percent(wear_value: f64) -> u8 {
    if wear_value <= 0.0 {
        return 100;
    }
    if wear_value >= FULL_WEAR {
        return 0;
    }
    let used = (100.0 * wear_value / FULL_WEAR).round();
    (100.0 - used).clamp(0.0, 100.0) as u8
}
