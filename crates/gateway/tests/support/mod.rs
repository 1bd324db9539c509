#![allow(dead_code)]

use common::{Environment, LogLevel};
use gateway::config::{Config, LimitSettings, ModelSettings, ServerSettings};
use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use inference::{DEFAULT_CLASS_NAMES, Device, InferenceBackend, InferenceOutput, ModelClient};
use ndarray::{Array, IxDyn};
use preprocess::Normalization;
use std::io::Cursor;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

pub const BOUNDARY: &str = "pcb-test-boundary";

/// Detector stand-in that answers every call with the same rows
/// (`(class_id, score, [x1, y1, x2, y2])` in model-input pixels).
pub struct ScriptedBackend {
    rows: Vec<(i64, f32, [f32; 4])>,
    calls: Arc<AtomicUsize>,
}

impl InferenceBackend for ScriptedBackend {
    fn load_model(_path: &str, _device: Device) -> anyhow::Result<Self> {
        anyhow::bail!("scripted backend is installed directly")
    }

    fn infer(
        &mut self,
        _images: &Array<f32, IxDyn>,
        _target_sizes: &Array<i64, IxDyn>,
    ) -> anyhow::Result<InferenceOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        InferenceOutput::from_rows(&self.rows)
    }
}

pub struct Fixture {
    pub config: Config,
    pub model: Arc<ModelClient>,
    pub calls: Arc<AtomicUsize>,
}

impl Fixture {
    /// Model input is 100x100, so boxes on a 100x100 image map back unchanged.
    pub fn new(rows: Vec<(i64, f32, [f32; 4])>) -> Self {
        Self::with_config(test_config(), rows, true)
    }

    pub fn unloaded() -> Self {
        Self::with_config(test_config(), Vec::new(), false)
    }

    pub fn with_config(config: Config, rows: Vec<(i64, f32, [f32; 4])>, loaded: bool) -> Self {
        let model = Arc::new(ModelClient::new(config.model_config()));
        let calls = Arc::new(AtomicUsize::new(0));
        if loaded {
            model.install(Box::new(ScriptedBackend {
                rows,
                calls: Arc::clone(&calls),
            }));
        }
        Self {
            config,
            model,
            calls,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn test_config() -> Config {
    Config {
        log_level: LogLevel::Debug,
        environment: Environment::Development,
        otel_endpoint: None,
        server: ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        model: ModelSettings {
            name: "rtdetr-pcb".to_string(),
            path: "unused.onnx".to_string(),
            confidence_threshold: 0.5,
            input_width: 100,
            input_height: 100,
            enable_gpu: false,
            inference_timeout_ms: 30_000,
            class_names: DEFAULT_CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
            load_retries: 0,
            normalization: Normalization::Unit,
        },
        limits: LimitSettings {
            max_batch_size: 10,
            max_file_size_mb: 1,
        },
    }
}

pub fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, format).unwrap();
    out.into_inner()
}

pub fn solid_jpeg(width: u32, height: u32) -> Vec<u8> {
    encode(
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([0, 120, 60]))),
        ImageFormat::Jpeg,
    )
}

pub fn gray_png(width: u32, height: u32) -> Vec<u8> {
    encode(
        DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([200]))),
        ImageFormat::Png,
    )
}

/// BMP whose header parses but whose pixel array is cut short.
pub fn truncated_bmp() -> Vec<u8> {
    let mut bytes = encode(
        DynamicImage::ImageRgb8(RgbImage::new(32, 32)),
        ImageFormat::Bmp,
    );
    bytes.truncate(80);
    bytes
}

/// Builds a `multipart/form-data` body; returns the content type and the bytes.
pub fn multipart(field: &str, files: &[(&str, &str, &[u8])]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for (filename, content_type, bytes) in files {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}
