use core_types::DatasetRow;

use crate::config::TrainingConfig;

/// A temporal train/validation/test partition. Rows are assumed to already
/// be in non-decreasing `t0` order (the dataset builder walks storage in
/// timestamp order); splitting by contiguous slices rather than shuffling
/// keeps validation and test strictly later in time than train, which is
/// what prevents leakage here.
pub struct Split {
    pub train: Vec<DatasetRow>,
    pub validation: Vec<DatasetRow>,
    pub test: Vec<DatasetRow>,
}

pub fn temporal_split(mut rows: Vec<DatasetRow>, config: &TrainingConfig) -> Split {
    rows.sort_by_key(|r| r.t0);

    let n = rows.len();
    let train_end = ((n as f64) * config.train_ratio).round() as usize;
    let validation_end = train_end + ((n as f64) * config.validation_ratio).round() as usize;
    let train_end = train_end.min(n);
    let validation_end = validation_end.min(n);

    let test = rows.split_off(validation_end.min(rows.len()));
    let validation = rows.split_off(train_end.min(rows.len()));
    let train = rows;

    Split { train, validation, test }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use core_types::{DataMode, Direction, Horizon, Symbol};

    fn row(minute: i64) -> DatasetRow {
        DatasetRow {
            symbol: Symbol::new("BTCUSDT"),
            horizon: Horizon::H1,
            t0: Utc.timestamp_opt(1_700_000_000 + minute * 60, 0).unwrap(),
            features: vec![("rsi_14".to_string(), 50.0)],
            label: Direction::Neutral,
            return_pct: 0.0,
            data_mode: DataMode::Live,
        }
    }

    #[test]
    fn split_preserves_temporal_order_across_partitions() {
        let rows: Vec<DatasetRow> = (0..100).map(row).collect();
        let config = TrainingConfig::default();
        let split = temporal_split(rows, &config);

        assert_eq!(split.train.len() + split.validation.len() + split.test.len(), 100);
        assert!(split.train.last().unwrap().t0 <= split.validation.first().unwrap().t0);
        assert!(split.validation.last().unwrap().t0 <= split.test.first().unwrap().t0);
    }
}
