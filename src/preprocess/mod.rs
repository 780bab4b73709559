//! # 预处理模块（preprocess）
//!
//! ## 设计思路
//!
//! 把“任意尺寸 RGBA 图片 → 模型输入张量”的过程拆成三部分：
//!
//! - `config`：描述文件解析与校验，产出不可变的 `PreprocessConfig`
//! - `normalize`：字节到数值的取值策略
//! - `policy`：缩放 → 裁剪 → 填充 → 平面化的固定顺序编排
//!
//! ```text
//! preprocessor_config.json
//!    ↓
//! PreprocessDescriptor ──校验──▶ PreprocessConfig
//!    ↓
//! Preprocessor::process(Raster) ──▶ PreprocessOutput { tensor, new_width, new_height }
//! ```

mod config;
mod normalize;
mod policy;

pub use config::{
    IMAGENET_MEAN, IMAGENET_STD, PadPolicy, PreprocessConfig, PreprocessDescriptor, ResizeMode,
    ResizePolicy,
};
pub use normalize::ValuePolicy;
pub use policy::{PreprocessOutput, Preprocessor};
