use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use super::utility::expanding_mean;
use crate::record::AlertRecord;

/// What a daily bucket aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Measure {
    /// Sum of `amount`.
    Amount,
    /// Sum of `variation_max`, over records that have one.
    Variation,
    /// Number of records.
    Count,
}

impl Measure {
    pub fn column(&self) -> &'static str {
        match self {
            Measure::Amount => "amount",
            Measure::Variation => "probable_variation_max",
            Measure::Count => "count",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPoint {
    pub time: NaiveDate,
    pub value: f64,
    pub moving_average: f64,
}

/// One row per day from the first to the last populated day; days in
/// between with no records carry a value of 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRollup {
    pub measure: Measure,
    pub points: Vec<DailyPoint>,
}

impl DailyRollup {
    pub fn empty(measure: Measure) -> Self {
        Self {
            measure,
            points: Vec::new(),
        }
    }

    /// Column names, present even when there are no rows.
    pub fn columns(&self) -> [&'static str; 3] {
        ["time", self.measure.column(), "moving average"]
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn moving_averages(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.moving_average).collect()
    }
}

/// Buckets `records` by calendar day of `time` and aggregates by `measure`.
///
/// Recomputed from scratch on every call; the moving average is the
/// expanding mean over the returned days.
pub fn daily_rollup<'a, I>(records: I, measure: Measure) -> DailyRollup
where
    I: IntoIterator<Item = &'a AlertRecord>,
{
    let mut buckets: BTreeMap<NaiveDate, f64> = BTreeMap::new();

    for record in records {
        let contribution = match measure {
            Measure::Amount => record.amount.unwrap_or(0.0),
            Measure::Variation => match record.variation_max {
                Some(v) => v,
                None => continue,
            },
            Measure::Count => 1.0,
        };
        *buckets.entry(record.time.date()).or_insert(0.0) += contribution;
    }

    let (Some(&first), Some(&last)) = (buckets.keys().next(), buckets.keys().next_back()) else {
        return DailyRollup::empty(measure);
    };

    let days: Vec<NaiveDate> = first.iter_days().take_while(|d| *d <= last).collect();
    let values: Vec<f64> = days
        .iter()
        .map(|d| buckets.get(d).copied().unwrap_or(0.0))
        .collect();
    let averages = expanding_mean(&values);

    DailyRollup {
        measure,
        points: days
            .into_iter()
            .zip(values)
            .zip(averages)
            .map(|((time, value), moving_average)| DailyPoint {
                time,
                value,
                moving_average,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DAY_MS;

    fn at_day(day: i64, amount: Option<f64>) -> AlertRecord {
        let mut r = AlertRecord::at(day * DAY_MS + 3_600_000).unwrap();
        r.amount = amount;
        r
    }

    #[test]
    fn test_empty_input_keeps_columns() {
        let rollup = daily_rollup(&[], Measure::Amount);
        assert!(rollup.is_empty());
        assert_eq!(rollup.columns(), ["time", "amount", "moving average"]);

        let counts = daily_rollup(&[], Measure::Count);
        assert_eq!(counts.columns(), ["time", "count", "moving average"]);
    }

    #[test]
    fn test_expanding_average_with_gap_day() {
        let records = vec![at_day(100, Some(4.0)), at_day(100, Some(6.0)), at_day(102, Some(20.0))];
        let rollup = daily_rollup(&records, Measure::Amount);

        assert_eq!(rollup.values(), vec![10.0, 0.0, 20.0]);
        assert_eq!(rollup.moving_averages(), vec![10.0, 5.0, 10.0]);
        assert_eq!(rollup.points[1].time.to_string(), "1970-04-12");
    }

    #[test]
    fn test_count_measure() {
        let records = vec![at_day(1, None), at_day(1, None), at_day(2, None)];
        let rollup = daily_rollup(&records, Measure::Count);
        assert_eq!(rollup.values(), vec![2.0, 1.0]);
        assert_eq!(rollup.moving_averages(), vec![2.0, 1.5]);
    }

    #[test]
    fn test_variation_skips_records_without_variation() {
        let mut a = at_day(1, Some(50.0));
        a.variation_max = Some(2.5);
        let b = at_day(2, Some(50.0));
        let rollup = daily_rollup(&[a, b], Measure::Variation);

        assert_eq!(rollup.len(), 1);
        assert_eq!(rollup.values(), vec![2.5]);
        assert_eq!(rollup.columns()[1], "probable_variation_max");
    }

    #[test]
    fn test_variation_all_missing_is_empty() {
        let rollup = daily_rollup(&[at_day(1, Some(1.0))], Measure::Variation);
        assert!(rollup.is_empty());
    }

    #[test]
    fn test_missing_amounts_count_as_zero() {
        let rollup = daily_rollup(&[at_day(1, None), at_day(1, Some(3.0))], Measure::Amount);
        assert_eq!(rollup.values(), vec![3.0]);
    }

    #[test]
    fn test_filtered_iterator_input() {
        let records = vec![at_day(1, Some(1.0)), at_day(1, Some(2.0))];
        let rollup = daily_rollup(
            records.iter().filter(|r| r.amount > Some(1.5)),
            Measure::Amount,
        );
        assert_eq!(rollup.values(), vec![2.0]);
    }
}
