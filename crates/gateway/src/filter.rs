use schema::{BoundingBox, Detection, RawDetection, RawDetections};

/// Applies the confidence threshold and converts raw rows into response detections.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetectionFilter;

impl DetectionFilter {
    /// Keeps rows with `confidence > threshold`, in emission order.
    ///
    /// Malformed rows are dropped one by one; unreadable output yields nothing.
    pub fn filter(&self, raw: RawDetections, threshold: f64) -> Vec<Detection> {
        let rows = match raw {
            RawDetections::Rows(rows) => rows,
            RawDetections::Unreadable { reason } => {
                tracing::warn!(%reason, "Discarding unreadable model output");
                return Vec::new();
            }
        };

        let total = rows.len();
        let kept: Vec<Detection> = rows
            .into_iter()
            .enumerate()
            .filter_map(|(index, row)| match convert(row) {
                Ok(detection) if detection.confidence > threshold => Some(detection),
                Ok(_) => None,
                Err(reason) => {
                    tracing::debug!(index, %reason, "Dropping malformed detection");
                    None
                }
            })
            .collect();

        tracing::debug!(total, kept = kept.len(), threshold, "Filtered detections");
        kept
    }
}

fn convert(row: RawDetection) -> Result<Detection, String> {
    let class_name = row
        .class_name
        .ok_or_else(|| format!("unknown class id {}", row.class_id))?;

    if !row.confidence.is_finite() || !(0.0..=1.0).contains(&row.confidence) {
        return Err(format!("confidence {} outside [0, 1]", row.confidence));
    }

    let coords = [row.x_min, row.y_min, row.x_max, row.y_max];
    if let Some(bad) = coords.iter().find(|c| !c.is_finite() || **c < 0.0) {
        return Err(format!("invalid coordinate {}", bad));
    }
    if row.x_min > row.x_max || row.y_min > row.y_max {
        return Err(format!(
            "inverted box ({}, {}, {}, {})",
            row.x_min, row.y_min, row.x_max, row.y_max
        ));
    }

    Ok(Detection {
        class_name,
        confidence: widen(row.confidence),
        // `as` truncates toward zero
        bounding_box: BoundingBox {
            x_min: row.x_min as u32,
            y_min: row.y_min as u32,
            x_max: row.x_max as u32,
            y_max: row.y_max as u32,
        },
    })
}

/// Widens through the shortest decimal form of the score, so `0.85f32` is reported
/// as `0.85` rather than `0.8500000238418579`.
fn widen(value: f32) -> f64 {
    value.to_string().parse().unwrap_or(f64::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(class: Option<&str>, confidence: f32, coords: [f32; 4]) -> RawDetection {
        RawDetection {
            class_id: 0,
            class_name: class.map(str::to_string),
            confidence,
            x_min: coords[0],
            y_min: coords[1],
            x_max: coords[2],
            y_max: coords[3],
        }
    }

    #[test]
    fn threshold_is_strict() {
        let raw = RawDetections::Rows(vec![
            row(Some("short"), 0.5, [0.0, 0.0, 1.0, 1.0]),
            row(Some("spur"), 0.500_001, [0.0, 0.0, 1.0, 1.0]),
        ]);

        let kept = DetectionFilter.filter(raw, 0.5);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].class_name, "spur");
    }

    #[test]
    fn truncates_coordinates() {
        let raw = RawDetections::Rows(vec![row(Some("short"), 0.9, [10.9, 20.5, 30.99, 40.01])]);

        let kept = DetectionFilter.filter(raw, 0.5);
        assert_eq!(
            kept[0].bounding_box,
            BoundingBox {
                x_min: 10,
                y_min: 20,
                x_max: 30,
                y_max: 40
            }
        );
    }

    #[test]
    fn preserves_emission_order() {
        let raw = RawDetections::Rows(vec![
            row(Some("spur"), 0.6, [0.0, 0.0, 1.0, 1.0]),
            row(Some("short"), 0.99, [0.0, 0.0, 1.0, 1.0]),
            row(Some("open_circuit"), 0.7, [0.0, 0.0, 1.0, 1.0]),
        ]);

        let names: Vec<_> = DetectionFilter
            .filter(raw, 0.5)
            .into_iter()
            .map(|d| d.class_name)
            .collect();
        assert_eq!(names, ["spur", "short", "open_circuit"]);
    }

    #[test]
    fn malformed_rows_are_dropped_individually() {
        let raw = RawDetections::Rows(vec![
            row(None, 0.9, [0.0, 0.0, 1.0, 1.0]),
            row(Some("a"), f32::NAN, [0.0, 0.0, 1.0, 1.0]),
            row(Some("b"), 1.2, [0.0, 0.0, 1.0, 1.0]),
            row(Some("c"), 0.9, [f32::INFINITY, 0.0, 1.0, 1.0]),
            row(Some("d"), 0.9, [-1.0, 0.0, 1.0, 1.0]),
            row(Some("e"), 0.9, [5.0, 0.0, 1.0, 1.0]),
            row(Some("kept"), 0.9, [1.0, 2.0, 3.0, 4.0]),
        ]);

        let kept = DetectionFilter.filter(raw, 0.5);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].class_name, "kept");
    }

    #[test]
    fn reported_confidence_keeps_the_decimal_score() {
        let raw = RawDetections::Rows(vec![
            row(Some("short"), 0.85, [0.0, 0.0, 1.0, 1.0]),
            row(Some("spur"), 0.3, [0.0, 0.0, 1.0, 1.0]),
        ]);

        let kept = DetectionFilter.filter(raw, 0.1);
        assert_eq!(kept[0].confidence, 0.85);
        assert_eq!(kept[1].confidence, 0.3);
    }

    #[test]
    fn unreadable_output_yields_nothing() {
        let raw = RawDetections::Unreadable {
            reason: "boxes shape [1, 3]".into(),
        };
        assert!(DetectionFilter.filter(raw, 0.0).is_empty());
    }
}
