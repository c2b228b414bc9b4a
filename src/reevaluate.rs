//! Retroactive alert re-evaluation after a threshold change.

use crate::error::Result;
use crate::store::DynStore;

// ---

#[derive(Clone)]
pub struct ThresholdReevaluator {
    store: DynStore,
}

impl ThresholdReevaluator {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    /// Recompute `is_alert = value > new_threshold` for every reading of
    /// `sensor_id`, regardless of age.
    ///
    /// Only flags that actually change are written, in one batch. Returns the
    /// number of readings evaluated. Readings of other sensors are untouched.
    pub async fn reevaluate(&self, sensor_id: &str, new_threshold: f64) -> Result<usize> {
        // ---
        let readings = self.store.readings_for_sensor(sensor_id).await?;

        let changes: Vec<(i64, bool)> = readings
            .iter()
            .filter_map(|r| {
                let is_alert = r.value > new_threshold;
                (is_alert != r.is_alert).then_some((r.id, is_alert))
            })
            .collect();

        let flipped = self.store.update_alert_flags(&changes).await?;

        tracing::debug!(
            sensor_id,
            evaluated = readings.len(),
            flipped,
            "Re-evaluated alert flags"
        );

        Ok(readings.len())
    }
}
