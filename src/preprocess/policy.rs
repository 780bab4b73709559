//! # 几何预处理策略
//!
//! ## 设计思路
//!
//! 按固定顺序执行：缩放 → 居中裁剪 → 填充，然后平面化并套用取值策略，
//! 每个阶段都只在对应开关打开时执行。缩放后的尺寸（裁剪之前）会随结果返回，
//! 超分辨率等调用方需要用它把输出还原到正确大小。
//!
//! ## 实现思路
//!
//! 填充不生成新的光栅图，而是把张量画布放大到 `pad_size`：
//! 画布上光栅图之外的位置恒为 `0.0`，不做归一化。

use std::time::Instant;

use super::{PreprocessConfig, ResizeMode};
use crate::PipelineError;
use crate::raster::{self, Raster, pad_offset};
use crate::tensor::{CanvasLayout, Tensor, planarize_with};

/// 单张图片的预处理结果。
#[derive(Debug, Clone)]
pub struct PreprocessOutput {
    /// `[1, 3, H, W]` 输入张量。
    pub tensor: Tensor,
    /// 缩放后、裁剪前的宽度。
    pub new_width: u32,
    /// 缩放后、裁剪前的高度。
    pub new_height: u32,
}

/// 按配置执行预处理的无状态处理器。
#[derive(Debug, Clone)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// 处理单张图片。
    pub fn process(&self, image: &Raster) -> Result<PreprocessOutput, PipelineError> {
        let start = Instant::now();

        let resized = self.apply_resize(image)?;
        let (new_width, new_height) = resized.dimensions();

        let cropped = match self.config.center_crop() {
            Some(crop) => resized.crop_center(crop, crop)?,
            None => resized,
        };

        let layout = self.canvas_layout(&cropped)?;
        let values = self.config.values();
        let planes = planarize_with(&cropped, layout, self.config.channel_order(), |raw, channel| {
            values.apply(raw, channel)
        });
        let tensor = Tensor::from_array(planes);

        log::debug!(
            "预处理完成 {}x{} -> {:?}（resize 后 {}x{}）{}ms",
            image.width(),
            image.height(),
            tensor.shape(),
            new_width,
            new_height,
            start.elapsed().as_millis()
        );

        Ok(PreprocessOutput {
            tensor,
            new_width,
            new_height,
        })
    }

    /// 批量处理：逐张预处理后沿批维拼接为 `[N, 3, H, W]`。
    pub fn prepare_batch(&self, images: &[Raster]) -> Result<Tensor, PipelineError> {
        if images.is_empty() {
            return Err(PipelineError::ShapeMismatch("批处理至少需要一张图片".to_string()));
        }

        let tensors = images
            .iter()
            .map(|image| self.process(image).map(|out| out.tensor))
            .collect::<Result<Vec<_>, _>>()?;
        Tensor::batch(&tensors)
    }

    fn apply_resize(&self, image: &Raster) -> Result<Raster, PipelineError> {
        let Some(policy) = self.config.resize() else {
            return Ok(image.clone());
        };

        let (width, height) = match policy.mode {
            ResizeMode::Square => (policy.size, policy.size),
            ResizeMode::Longer => {
                raster::longer_side_dimensions(image.width(), image.height(), policy.size)
            }
            ResizeMode::Shorter => {
                raster::shorter_side_dimensions(image.width(), image.height(), policy.size)
            }
        };

        raster::resize(image, width, height, self.config.filter())
    }

    fn canvas_layout(&self, image: &Raster) -> Result<CanvasLayout, PipelineError> {
        let Some(pad) = self.config.pad() else {
            return Ok(CanvasLayout::fit(image));
        };

        if image.width() > pad.size || image.height() > pad.size {
            return Err(PipelineError::InvalidGeometry(format!(
                "pad_size {} 小于预处理后的图片 {}x{}",
                pad.size,
                image.width(),
                image.height()
            )));
        }

        let (offset_x, offset_y) = if pad.centered {
            pad_offset(image.width(), image.height(), pad.size, pad.size)
        } else {
            (0, 0)
        };

        Ok(CanvasLayout {
            width: pad.size,
            height: pad.size,
            offset_x,
            offset_y,
        })
    }
}
