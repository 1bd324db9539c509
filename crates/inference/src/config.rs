use crate::backend::Device;
use preprocess::{DEFAULT_INPUT_SIZE, Normalization};

/// Labels of the PCB defect dataset, indexed by class id.
pub const DEFAULT_CLASS_NAMES: [&str; 6] = [
    "missing_hole",
    "mouse_bite",
    "open_circuit",
    "short",
    "spur",
    "spurious_copper",
];

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub name: String,
    pub model_path: String,
    pub device: Device,
    pub input_size: (u32, u32),
    pub normalization: Normalization,
    pub class_names: Vec<String>,
    pub load_retries: u32,
    pub load_retry_delay_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "rtdetr-pcb".to_string(),
            model_path: "models/model.onnx".to_string(),
            device: Device::Cpu,
            input_size: DEFAULT_INPUT_SIZE,
            normalization: Normalization::Unit,
            class_names: DEFAULT_CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
            load_retries: 3,
            load_retry_delay_ms: 500,
        }
    }
}
