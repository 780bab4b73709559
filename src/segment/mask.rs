//! # 掩码后处理
//!
//! 把解码器输出的 logits 转成二值掩码，并顺带统计前景包围盒。
//! `logit > 0` 即前景，前景像素写入调用方指定的 mask id（非零，0 固定表示背景）。

use std::num::NonZeroU8;

use ndarray::{ArrayView2, Axis, Ix2};

use crate::PipelineError;
use crate::raster::Raster;
use crate::tensor::Tensor;

use super::prompt::BoundingBox;

/// 默认叠加色（RGBA）。
pub const DEFAULT_MASK_COLOR: [u8; 4] = [230, 100, 100, 255];
/// 默认叠加不透明度。
pub const DEFAULT_OVERLAY_OPACITY: f32 = 0.5;

/// 原图分辨率的二值掩码，行优先，`0` 为背景。
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    width: u32,
    height: u32,
    data: Vec<u8>,
    bbox: BoundingBox,
}

impl Mask {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 前景包围盒（原图坐标，含端点）。没有前景时为退化包围盒。
    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn is_empty(&self) -> bool {
        self.bbox.is_empty()
    }

    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// 前景涂 `color`，背景全透明。
    pub fn to_overlay(&self, color: [u8; 4]) -> Raster {
        let mut bytes = vec![0u8; self.data.len() * 4];
        for (pixel, &value) in bytes.chunks_exact_mut(4).zip(self.data.iter()) {
            if value != 0 {
                pixel.copy_from_slice(&color);
            }
        }
        Raster::from_raw_parts(self.width, self.height, bytes)
    }

    /// 把掩码以 `opacity` 叠加到原图上，尺寸必须一致。
    pub fn overlay_on(
        &self,
        base: &Raster,
        color: [u8; 4],
        opacity: f32,
    ) -> Result<Raster, PipelineError> {
        if base.dimensions() != (self.width, self.height) {
            return Err(PipelineError::ShapeMismatch(format!(
                "掩码 {}x{} 与底图 {}x{} 尺寸不一致",
                self.width,
                self.height,
                base.width(),
                base.height()
            )));
        }
        Ok(base.composite_alpha(&self.to_overlay(color), 0, 0, opacity))
    }
}

/// 解码平铺的 logits（行优先，`width * height` 个）。
pub fn decode_mask(
    logits: &[f32],
    width: u32,
    height: u32,
    mask_id: NonZeroU8,
) -> Result<Mask, PipelineError> {
    let len = width as usize * height as usize;
    if width == 0 || height == 0 {
        return Err(PipelineError::InvalidGeometry(format!(
            "掩码尺寸非法：{}x{}",
            width, height
        )));
    }
    if logits.len() < len {
        return Err(PipelineError::ShapeMismatch(format!(
            "logits 长度 {} 小于 {}x{}",
            logits.len(),
            width,
            height
        )));
    }

    let view = ArrayView2::from_shape((height as usize, width as usize), &logits[..len])
        .map_err(|e| PipelineError::ShapeMismatch(format!("logits 无法视为 {}x{}：{}", width, height, e)))?;
    decode_view(view, mask_id)
}

/// 解码 `[.., H, W]` 形状的 logits 张量，只取第一张掩码。
pub fn decode_mask_tensor(tensor: &Tensor, mask_id: NonZeroU8) -> Result<Mask, PipelineError> {
    let shape = tensor.shape();
    if shape.len() < 2 || shape[..shape.len() - 2].contains(&0) {
        return Err(PipelineError::ShapeMismatch(format!(
            "掩码张量需要非空的 [.., H, W]，实际形状 {:?}",
            shape
        )));
    }

    let mut first = tensor.view();
    while first.ndim() > 2 {
        first = first.index_axis_move(Axis(0), 0);
    }
    let first = first
        .into_dimensionality::<Ix2>()
        .map_err(|e| PipelineError::ShapeMismatch(format!("掩码张量降维失败：{}", e)))?;
    decode_view(first, mask_id)
}

fn decode_view(logits: ArrayView2<'_, f32>, mask_id: NonZeroU8) -> Result<Mask, PipelineError> {
    let (rows, cols) = logits.dim();
    let (Ok(width), Ok(height)) = (u32::try_from(cols), u32::try_from(rows)) else {
        return Err(PipelineError::ShapeMismatch(format!(
            "掩码尺寸溢出：{}x{}",
            cols, rows
        )));
    };
    if width == 0 || height == 0 {
        return Err(PipelineError::InvalidGeometry(format!(
            "掩码尺寸非法：{}x{}",
            width, height
        )));
    }

    let mut data = vec![0u8; rows * cols];
    let mut bbox = BoundingBox::empty();
    for ((y, x), &logit) in logits.indexed_iter() {
        if logit > 0.0 {
            data[y * cols + x] = mask_id.get();
            bbox.include(x as f64, y as f64);
        }
    }

    Ok(Mask {
        width,
        height,
        data,
        bbox,
    })
}
