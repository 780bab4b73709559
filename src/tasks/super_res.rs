//! # 亮度超分辨率
//!
//! ## 实现思路
//!
//! ```text
//! RGB ──rgb_to_ycbcr──▶ YCbCr ──resize 224²──▶ Y/255 ──▶ [1,1,224,224]
//!                                                   ↓ engine
//! YCbCr ──resize 672²──▶ 替换 Y ◀── unit_to_bytes ◀── [1,1,672,672]
//!    ↓
//! resize 回原图尺寸 ──ycbcr_to_rgb──▶ RGB
//! ```
//!
//! 模型只处理亮度，色度平面直接双三次放大后与模型输出的亮度重新组合。

use std::time::{Duration, Instant};

use ndarray::Array4;

use crate::PipelineError;
use crate::inference::{self, Feeds, InferenceEngine};
use crate::raster::{self, DEFAULT_FILTER, FilterType, Raster};
use crate::tensor::{Tensor, extract_channel, replace_channel, unit_to_bytes};

pub const SUPER_RES_INPUT: &str = "input";
pub const SUPER_RES_INPUT_SIZE: u32 = 224;
pub const SUPER_RES_OUTPUT_SIZE: u32 = 672;

const LUMA: usize = 0;

#[derive(Debug, Clone)]
pub struct SuperResOutput {
    pub image: Raster,
    /// 仅推理耗时。
    pub elapsed: Duration,
}

pub struct SuperResolution<E> {
    engine: E,
    input_name: String,
    filter: FilterType,
}

impl<E: InferenceEngine> SuperResolution<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            input_name: SUPER_RES_INPUT.to_string(),
            filter: DEFAULT_FILTER,
        }
    }

    pub fn with_input_name(mut self, name: impl Into<String>) -> Self {
        self.input_name = name.into();
        self
    }

    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    pub async fn upscale(&self, image: &Raster) -> Result<SuperResOutput, PipelineError> {
        let (width, height) = image.dimensions();
        let ycc = raster::rgb_to_ycbcr(image);
        let input = luma_tensor(&ycc, self.filter)?;

        let mut feeds = Feeds::new();
        feeds.insert(self.input_name.clone(), input);

        let start = Instant::now();
        let mut outputs = inference::run_engine(&self.engine, feeds, "超分辨率").await?;
        let elapsed = start.elapsed();
        let output = inference::take_first_output(&self.engine, &mut outputs)?;

        let expected = [1, 1, SUPER_RES_OUTPUT_SIZE as usize, SUPER_RES_OUTPUT_SIZE as usize];
        if output.shape() != expected {
            return Err(PipelineError::ShapeMismatch(format!(
                "超分辨率输出形状 {:?}，期望 {:?}",
                output.shape(),
                expected
            )));
        }

        let luma = unit_to_bytes(output.data());
        let upsampled = raster::resize(
            &ycc,
            SUPER_RES_OUTPUT_SIZE,
            SUPER_RES_OUTPUT_SIZE,
            self.filter,
        )?;
        let recombined = replace_channel(&upsampled, LUMA, &luma)?;
        let restored = raster::resize(&recombined, width, height, self.filter)?;

        log::info!(
            "✅ 超分辨率完成 {}x{}，耗时 {}ms",
            width,
            height,
            elapsed.as_millis()
        );

        Ok(SuperResOutput {
            image: raster::ycbcr_to_rgb(&restored),
            elapsed,
        })
    }
}

/// YCbCr 图 → `[1, 1, 224, 224]` 亮度张量，取值 `[0, 1]`。
pub fn luma_tensor(ycc: &Raster, filter: FilterType) -> Result<Tensor, PipelineError> {
    let resized = raster::resize(ycc, SUPER_RES_INPUT_SIZE, SUPER_RES_INPUT_SIZE, filter)?;
    let luma = extract_channel(&resized, LUMA)?;
    let side = SUPER_RES_INPUT_SIZE as usize;
    let planes = Array4::from_shape_fn((1, 1, side, side), |(_, _, y, x)| {
        luma[y * side + x] as f32 / 255.0
    });
    Ok(Tensor::from_array(planes))
}
