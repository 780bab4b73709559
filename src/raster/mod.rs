//! # 光栅图模块（raster）
//!
//! ## 设计思路
//!
//! 负责一切“字节级像素”工作：加载解码、缩放、裁剪、填充、混合与颜色空间转换。
//! 张量相关的工作交给 `tensor`，这里只产出和消费 `Raster`。
//!
//! - `buffer`：`Raster` 本体与几何操作
//! - `resize`：双三次缩放（`fast_image_resize` + `image` 回退）
//! - `color`：RGB ↔ YCbCr
//! - `loader`：异步加载 → 解码 → 就绪，以及 Data URL 导出
//! - `config/source`：加载上限配置与来源模型
//!
//! ## 调用链
//!
//! ```text
//! ImageSource
//!    ↓
//! loader.rs（读取 + 签名/体积校验 + spawn_blocking 解码）
//!    ↓
//! Raster ── resize / crop_center / pad / color
//!    ↓
//! tensor::planar（平面化）
//! ```

mod buffer;
mod color;
mod config;
mod loader;
mod resize;
mod source;

pub use buffer::{PAD_BACKGROUND, Raster, pad_offset};
pub use color::{rgb_to_ycbcr, ycbcr_to_rgb};
pub use config::LoadConfig;
pub use loader::{DataUrlFormat, ImageLoader, encode_data_url};
pub use resize::{
    DEFAULT_FILTER, longer_side_dimensions, resize, resize_longer, shorter_side_dimensions,
};
pub use source::{ImageSource, ImageSourceKind};

pub use image::imageops::FilterType;
