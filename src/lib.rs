//! # 视觉预处理流水线：库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │              调用方（UI / 模型加载 / 推理后端）            │
//! │                                                          │
//! │  ImageSource ── preprocessor_config.json ── 点击/框选    │
//! └───────┼──────────────────────┼──────────────────┼───────┘
//!         ↓                      ↓                  ↓
//! ┌───────┼──────────────────────┼──────────────────┼───────┐
//! │       ↓            核心 (Rust)                  ↓       │
//! │                                                          │
//! │  ┌─ error ─────── PipelineError（统一错误类型）           │
//! │  │                                                       │
//! │  ├─ raster ────── 加载·解码·缩放·裁剪·填充·YCbCr          │
//! │  ├─ tensor ────── 平面化编解码 + 张量组装/批处理          │
//! │  ├─ preprocess ── 描述文件校验 + 几何/取值策略            │
//! │  ├─ inference ─── InferenceEngine 契约（不透明后端）      │
//! │  ├─ segment ───── 会话状态机·嵌入缓存·提示映射·掩码       │
//! │  └─ tasks ─────── 分类 / 亮度超分辨率                     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `PipelineError` 与稳定错误码 |
//! | [`raster`] | `Raster` 像素缓冲、异步加载、双三次缩放、颜色空间 |
//! | [`tensor`] | `Tensor`、CHW 平面编解码、通道抽取/替换 |
//! | [`preprocess`] | `PreprocessConfig` 与 `Preprocessor` |
//! | [`inference`] | 推理引擎 trait 与输入输出约定 |
//! | [`segment`] | 两段式交互分割 |
//! | [`tasks`] | 基于同一套预处理的分类与超分辨率 |

pub mod error;
pub mod inference;
pub mod preprocess;
pub mod raster;
pub mod segment;
pub mod tasks;
pub mod tensor;

pub use error::{EngineError, PipelineError};
pub use inference::{Feeds, InferenceEngine};
pub use preprocess::{PreprocessConfig, PreprocessOutput, Preprocessor};
pub use raster::{ImageLoader, ImageSource, Raster};
pub use segment::{Mask, Point, SegmentSession, SegmentationPrompt};
pub use tensor::Tensor;
