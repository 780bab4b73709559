//! # 通道平面编解码
//!
//! ## 设计思路
//!
//! 交错的 RGBA 字节与模型需要的 CHW 平面布局之间的“转置”集中在这里，
//! 所有张量都经过同一个入口，保证扫描顺序一致：平面内 y 在外、x 在内，
//! 与 `Raster` 的原生行优先顺序逐元素对应。
//!
//! ## 实现思路
//!
//! - `planarize_with` 是通用形式，直接写入 `Array4::zeros((1, 3, H, W))`；
//!   画布可以比光栅图大（填充），越界位置保持 `0.0`，不经过取值函数。
//! - `planarize` / `deplanarize` 是原始字节值（0~255）的一对精确互逆。
//! - 超分辨率路径需要单通道的提取与替换，也放在这里。

use ndarray::{Array4, ArrayView3};

use crate::PipelineError;
use crate::raster::Raster;

/// 平面拼接顺序。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

impl ChannelOrder {
    /// 第 `plane` 个输出平面对应的源通道下标（0=R, 1=G, 2=B）。
    #[inline]
    pub fn source_channel(self, plane: usize) -> usize {
        match self {
            Self::Rgb => plane,
            Self::Bgr => 2 - plane,
        }
    }
}

/// 张量画布：尺寸以及光栅图左上角在画布中的偏移。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasLayout {
    pub width: u32,
    pub height: u32,
    pub offset_x: u32,
    pub offset_y: u32,
}

impl CanvasLayout {
    /// 画布与光栅图完全重合。
    pub fn fit(raster: &Raster) -> Self {
        Self {
            width: raster.width(),
            height: raster.height(),
            offset_x: 0,
            offset_y: 0,
        }
    }
}

/// 平面化为原始字节值：`[1, 3, H, W]`，平面顺序 `[R][G][B]`（或 `[B][G][R]`），丢弃 alpha。
pub fn planarize(raster: &Raster, order: ChannelOrder) -> Array4<f32> {
    planarize_with(raster, CanvasLayout::fit(raster), order, |raw, _| raw as f32)
}

/// 通用平面化，输出 `[1, 3, layout.height, layout.width]`。
///
/// `value(raw, channel)` 中的 `channel` 是源通道下标（0=R, 1=G, 2=B），
/// 与输出平面顺序无关；画布上落在光栅图之外的位置恒为 `0.0`。
pub fn planarize_with<F>(raster: &Raster, layout: CanvasLayout, order: ChannelOrder, value: F) -> Array4<f32>
where
    F: Fn(u8, usize) -> f32,
{
    let mut out = Array4::<f32>::zeros((1, 3, layout.height as usize, layout.width as usize));
    let bytes = raster.as_bytes();

    for y in 0..layout.height {
        let Some(src_y) = y.checked_sub(layout.offset_y).filter(|&sy| sy < raster.height()) else {
            continue;
        };
        for x in 0..layout.width {
            let Some(src_x) = x.checked_sub(layout.offset_x).filter(|&sx| sx < raster.width()) else {
                continue;
            };

            let src = raster.offset(src_x, src_y);
            for plane in 0..3 {
                let channel = order.source_channel(plane);
                out[[0, plane, y as usize, x as usize]] = value(bytes[src + channel], channel);
            }
        }
    }

    out
}

/// `planarize` 的逆：`[3, H, W]` 平面（0~255 值域）还原为 RGBA，alpha 固定为 255。
pub fn deplanarize(planes: ArrayView3<'_, f32>, order: ChannelOrder) -> Result<Raster, PipelineError> {
    let (channels, height, width) = planes.dim();
    if channels != 3 {
        return Err(PipelineError::ShapeMismatch(format!(
            "平面数据形状 {:?} 不是 [3, H, W]",
            planes.shape()
        )));
    }
    let (Ok(w), Ok(h)) = (u32::try_from(width), u32::try_from(height)) else {
        return Err(PipelineError::ResourceLimit(format!(
            "平面尺寸 {}x{} 超出范围",
            width, height
        )));
    };

    let mut data = vec![255u8; width * height * 4];
    for ((plane, y, x), &v) in planes.indexed_iter() {
        let channel = order.source_channel(plane);
        data[(y * width + x) * 4 + channel] = to_byte(v);
    }

    Raster::new(w, h, data)
}

/// 取出单个通道的字节平面。
pub fn extract_channel(raster: &Raster, channel: usize) -> Result<Vec<u8>, PipelineError> {
    check_channel(channel)?;
    Ok(raster
        .as_bytes()
        .chunks_exact(4)
        .map(|px| px[channel])
        .collect())
}

/// 用 `values` 替换单个通道，其余通道与 alpha 保持不变。
pub fn replace_channel(raster: &Raster, channel: usize, values: &[u8]) -> Result<Raster, PipelineError> {
    check_channel(channel)?;
    let pixels = raster.width() as usize * raster.height() as usize;
    if values.len() != pixels {
        return Err(PipelineError::ShapeMismatch(format!(
            "通道数据长度 {} 与图片像素数 {} 不一致",
            values.len(),
            pixels
        )));
    }

    let mut data = raster.as_bytes().to_vec();
    for (px, &v) in data.chunks_exact_mut(4).zip(values) {
        px[channel] = v;
    }
    Raster::new(raster.width(), raster.height(), data)
}

/// 把 `[0, 1]` 值域的模型输出换算回字节：`round(v * 255)` 并钳制。
pub fn unit_to_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().map(|&v| to_byte(v * 255.0)).collect()
}

fn check_channel(channel: usize) -> Result<(), PipelineError> {
    if channel > 3 {
        return Err(PipelineError::InvalidGeometry(format!(
            "通道下标 {} 超出 RGBA 范围",
            channel
        )));
    }
    Ok(())
}

#[inline]
fn to_byte(value: f32) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 255.0) as u8
}
