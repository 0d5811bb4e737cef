//! Per-condition totals

use crate::condition::ConditionId;
use crate::measurement::{Measurement, MeasurementType};
use serde::Serialize;
use std::collections::BTreeMap;

/// Sum of all measurements sharing a condition and unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionTotal {
    pub condition_id: ConditionId,
    pub measurement_type: MeasurementType,
    pub unit: String,
    pub count: usize,
    pub total: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perimeter_total: Option<f64>,
    /// How many of the summed measurements were taken without a calibration
    pub uncalibrated: usize,
}

/// Groups measurements by (condition, unit) and sums them, ordered by condition id.
///
/// Values in different units are never added together; a condition measured before
/// and after a unit change yields two rows.
pub fn summarize<'a, I>(measurements: I) -> Vec<ConditionTotal>
where
    I: IntoIterator<Item = &'a Measurement>,
{
    let mut totals: BTreeMap<(ConditionId, String), ConditionTotal> = BTreeMap::new();

    for m in measurements {
        let entry = totals
            .entry((m.condition_id.clone(), m.unit.clone()))
            .or_insert_with(|| ConditionTotal {
                condition_id: m.condition_id.clone(),
                measurement_type: m.measurement_type,
                unit: m.unit.clone(),
                count: 0,
                total: 0.0,
                perimeter_total: None,
                uncalibrated: 0,
            });

        entry.count += 1;
        entry.total += m.calculated_value;
        if let Some(perimeter) = m.perimeter_value {
            *entry.perimeter_total.get_or_insert(0.0) += perimeter;
        }
        if m.uncalibrated {
            entry.uncalibrated += 1;
        }
    }

    totals.into_values().collect()
}
