//! # 张量模块（tensor）
//!
//! - `tensor`：带形状标签的 float32 张量与批处理
//! - `planar`：RGBA 交错字节 ↔ CHW 平面的转置编解码

mod planar;
mod tensor;

pub use planar::{
    CanvasLayout, ChannelOrder, deplanarize, extract_channel, planarize, planarize_with,
    replace_channel, unit_to_bytes,
};
pub use tensor::{ElementType, Tensor};
