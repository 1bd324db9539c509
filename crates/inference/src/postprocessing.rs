use crate::backend::InferenceOutput;
use preprocess::TransformParams;
use schema::{RawDetection, RawDetections};

/// Maps detector tensors to raw rows in original-image pixel space.
///
/// No thresholding happens here. Rows keep the detector's emission order.
/// Tensors with inconsistent shapes yield [`RawDetections::Unreadable`].
#[tracing::instrument(skip_all, fields(rows = tracing::field::Empty))]
pub fn decode_detections(
    output: &InferenceOutput,
    transform: &TransformParams,
    class_names: &[String],
) -> RawDetections {
    let n = match check_shapes(output) {
        Ok(n) => n,
        Err(reason) => {
            tracing::warn!(%reason, "Model output has an unexpected shape");
            return RawDetections::Unreadable { reason };
        }
    };
    tracing::Span::current().record("rows", n);

    let rows = (0..n)
        .map(|i| {
            let class_id = output.labels[[0, i]];
            let (x_min, y_min) = map_point(
                transform,
                output.boxes[[0, i, 0]],
                output.boxes[[0, i, 1]],
            );
            let (x_max, y_max) = map_point(
                transform,
                output.boxes[[0, i, 2]],
                output.boxes[[0, i, 3]],
            );

            RawDetection {
                class_id,
                class_name: usize::try_from(class_id)
                    .ok()
                    .and_then(|idx| class_names.get(idx))
                    .cloned(),
                confidence: output.scores[[0, i]],
                x_min,
                y_min,
                x_max,
                y_max,
            }
        })
        .collect();

    RawDetections::Rows(rows)
}

fn check_shapes(output: &InferenceOutput) -> Result<usize, String> {
    let labels = output.labels.shape();
    if labels.len() != 2 || labels[0] != 1 {
        return Err(format!("labels shape {:?}, expected [1, N]", labels));
    }
    let n = labels[1];

    if output.scores.shape() != [1, n] {
        return Err(format!(
            "scores shape {:?}, expected [1, {}]",
            output.scores.shape(),
            n
        ));
    }
    if output.boxes.shape() != [1, n, 4] {
        return Err(format!(
            "boxes shape {:?}, expected [1, {}, 4]",
            output.boxes.shape(),
            n
        ));
    }

    Ok(n)
}

/// Non-finite coordinates are passed through as NaN so the row is rejected later.
fn map_point(transform: &TransformParams, x: f32, y: f32) -> (f32, f32) {
    if x.is_finite() && y.is_finite() {
        transform.to_original(x, y)
    } else {
        (f32::NAN, f32::NAN)
    }
}
