//! Row grouping

use crate::prediction::UnifiedPrediction;
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Top Y of a row. Finite by construction, since every `BBox` is.
#[derive(Debug, Clone, Copy)]
struct RowKey(f64);

impl RowKey {
    fn new(y: f64) -> Self {
        // -0.0 and 0.0 are the same row
        Self(y + 0.0)
    }
}

impl PartialEq for RowKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RowKey {}

impl PartialOrd for RowKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RowKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Predictions bucketed by top Y, rows ascending, each row sorted by left X
///
/// Serializes as a JSON object keyed by the row's Y value, e.g. `"200"` or
/// `"200.5"`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedPredictions {
    rows: BTreeMap<RowKey, Vec<UnifiedPrediction>>,
}

impl GroupedPredictions {
    /// Predictions on the row starting at `y`
    #[must_use]
    pub fn row(&self, y: f64) -> Option<&[UnifiedPrediction]> {
        self.rows.get(&RowKey::new(y)).map(Vec::as_slice)
    }

    /// Rows in top-to-bottom order
    pub fn rows(&self) -> impl Iterator<Item = (f64, &[UnifiedPrediction])> + '_ {
        self.rows.iter().map(|(y, row)| (y.0, row.as_slice()))
    }

    /// Every prediction in reading order
    pub fn predictions(&self) -> impl Iterator<Item = &UnifiedPrediction> + '_ {
        self.rows.values().flatten()
    }

    /// Number of rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Total number of predictions across all rows
    #[must_use]
    pub fn prediction_count(&self) -> usize {
        self.rows.values().map(Vec::len).sum()
    }
}

impl Serialize for GroupedPredictions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.rows.len()))?;
        for (y, row) in &self.rows {
            map.serialize_entry(&y.0.to_string(), row)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for GroupedPredictions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, Vec<UnifiedPrediction>>::deserialize(deserializer)?;
        let mut rows = BTreeMap::new();
        for (key, row) in raw {
            let y: f64 = key
                .parse()
                .map_err(|_| D::Error::custom(format!("invalid row key {key:?}")))?;
            if !y.is_finite() {
                return Err(D::Error::custom(format!("invalid row key {key:?}")));
            }
            rows.insert(RowKey::new(y), row);
        }
        Ok(Self { rows })
    }
}

/// Group predictions into rows keyed by their top Y.
///
/// The key is the exact `y0`, so only predictions sharing a top edge share a
/// row; grid rounding beforehand is what makes nearby tops collide. Within a
/// row, predictions are sorted by `x0`; equal `x0` keep their input order.
#[must_use]
pub fn group_by_rows(predictions: &[UnifiedPrediction]) -> GroupedPredictions {
    let mut rows: BTreeMap<RowKey, Vec<UnifiedPrediction>> = BTreeMap::new();
    for prediction in predictions {
        rows.entry(RowKey::new(prediction.bbox.y0()))
            .or_default()
            .push(prediction.clone());
    }
    for row in rows.values_mut() {
        row.sort_by(|a, b| a.bbox.x0().total_cmp(&b.bbox.x0()));
    }
    GroupedPredictions { rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prediction::PredictionKind;
    use sketchform_common::BBox;

    fn object(id: usize, class: &str, c: [f64; 4]) -> UnifiedPrediction {
        UnifiedPrediction {
            id,
            kind: PredictionKind::Object {
                class: class.to_string(),
            },
            bbox: BBox::try_from(c).unwrap(),
        }
    }

    #[test]
    fn test_rows_sorted_by_left_edge() {
        let input = vec![
            object(0, "button", [300.0, 400.0, 380.0, 440.0]),
            object(1, "input", [20.0, 400.0, 280.0, 440.0]),
            object(2, "image", [20.0, 100.0, 380.0, 300.0]),
        ];
        let grouped = group_by_rows(&input);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped.prediction_count(), 3);
        let row: Vec<usize> = grouped.row(400.0).unwrap().iter().map(|p| p.id).collect();
        assert_eq!(row, vec![1, 0]);
        assert!(grouped.row(300.0).is_none());

        let reading: Vec<usize> = grouped.predictions().map(|p| p.id).collect();
        assert_eq!(reading, vec![2, 1, 0]);
    }

    #[test]
    fn test_equal_left_edge_keeps_input_order() {
        let input = vec![
            object(0, "a", [50.0, 10.0, 60.0, 20.0]),
            object(1, "b", [50.0, 10.0, 70.0, 30.0]),
            object(2, "c", [10.0, 10.0, 20.0, 20.0]),
        ];
        let grouped = group_by_rows(&input);
        let row: Vec<usize> = grouped.row(10.0).unwrap().iter().map(|p| p.id).collect();
        assert_eq!(row, vec![2, 0, 1]);
    }

    #[test]
    fn test_every_prediction_appears_once_under_its_top() {
        let input = vec![
            object(0, "a", [0.0, 0.0, 10.0, 10.0]),
            object(1, "b", [0.0, 20.0, 10.0, 30.0]),
            object(2, "c", [30.0, 0.0, 40.0, 10.0]),
            object(3, "d", [0.0, 90.0, 10.0, 100.0]),
        ];
        let grouped = group_by_rows(&input);

        assert_eq!(grouped.prediction_count(), input.len());
        for (y, row) in grouped.rows() {
            for prediction in row {
                assert_eq!(prediction.bbox.y0(), y);
            }
        }
    }

    #[test]
    fn test_serializes_as_object_keyed_by_row() {
        let grouped = group_by_rows(&[object(0, "checkbox", [100.0, 200.0, 130.0, 230.0])]);
        let value = serde_json::to_value(&grouped).unwrap();
        assert_eq!(value["200"][0]["class"], "checkbox");
        assert_eq!(value["200"][0]["box"][3], 230.0);

        let back: GroupedPredictions = serde_json::from_value(value).unwrap();
        assert_eq!(back, grouped);
    }

    #[test]
    fn test_unrounded_tops_get_their_own_rows() {
        let input = vec![
            object(0, "a", [0.0, 200.2, 10.0, 210.0]),
            object(1, "b", [0.0, 200.7, 10.0, 210.0]),
            object(2, "c", [20.0, 200.2, 30.0, 210.0]),
        ];
        let grouped = group_by_rows(&input);

        assert_eq!(grouped.len(), 2);
        assert!(grouped.row(200.0).is_none());
        let row: Vec<usize> = grouped.row(200.2).unwrap().iter().map(|p| p.id).collect();
        assert_eq!(row, vec![0, 2]);
        assert_eq!(grouped.row(200.7).unwrap()[0].id, 1);
        for (y, row) in grouped.rows() {
            assert!(row.iter().all(|p| p.bbox.y0() == y));
        }

        let value = serde_json::to_value(&grouped).unwrap();
        assert_eq!(value["200.7"][0]["class"], "b");
        let back: GroupedPredictions = serde_json::from_value(value).unwrap();
        assert_eq!(back, grouped);
    }

    #[test]
    fn test_rejects_non_numeric_row_key() {
        let result = serde_json::from_str::<GroupedPredictions>(r#"{"top": []}"#);
        assert!(result.is_err());
    }
}
