//! # 模型任务（tasks）
//!
//! 在预处理与推理契约之上组装的两个单步任务：
//!
//! - `classify`：分类 → 排序后的 `{label, confidence}`
//! - `super_res`：亮度超分辨率 → 与放大色度重新组合的 RGB 图

mod classify;
mod super_res;

pub use classify::{
    CLASSIFIER_INPUT, Classification, Classifier, DEFAULT_TOP_K, Prediction, rank, softmax,
};
pub use super_res::{
    SUPER_RES_INPUT, SUPER_RES_INPUT_SIZE, SUPER_RES_OUTPUT_SIZE, SuperResOutput, SuperResolution,
    luma_tensor,
};
