//! # 像素缓冲模块
//!
//! ## 设计思路
//!
//! `Raster` 是整条流水线的最小数据单元：宽、高加一段行优先、RGBA 交错排列的字节。
//! 构造时校验 `data.len() == width * height * 4`，之后所有变换（裁剪、填充、混合）
//! 都返回新的 `Raster`，调用方手里的原图保持不变。
//!
//! ## 实现思路
//!
//! - 像素寻址统一走 `offset()`，扫描顺序为 y 在外、x 在内。
//! - 与 `image` crate 的互转只在加载、缩放等边界处发生。

use image::{ImageBuffer, Rgba, RgbaImage};

use crate::PipelineError;

/// 填充画布使用的背景色（不透明白色）。
pub const PAD_BACKGROUND: [u8; 4] = [255, 255, 255, 255];

/// 内存中的 RGBA 光栅图。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Raster {
    /// 用已有字节构造光栅图，长度不符时返回错误。
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, PipelineError> {
        let expected = Self::byte_len(width, height)?;
        if data.len() != expected {
            return Err(PipelineError::InvalidGeometry(format!(
                "像素数据长度异常：期望 {} 字节（{}x{}x4），实际 {} 字节",
                expected,
                width,
                height,
                data.len()
            )));
        }

        Ok(Self { width, height, data })
    }

    /// 创建一张纯色图。
    pub fn filled(width: u32, height: u32, color: [u8; 4]) -> Self {
        let pixels = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixels * 4);
        for _ in 0..pixels {
            data.extend_from_slice(&color);
        }

        Self { width, height, data }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// 原始 RGBA 字节（行优先）。
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = self.offset(x, y);
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, pixel: [u8; 4]) -> Result<(), PipelineError> {
        if x >= self.width || y >= self.height {
            return Err(PipelineError::InvalidGeometry(format!(
                "像素坐标越界：({}, {}) 不在 {}x{} 内",
                x, y, self.width, self.height
            )));
        }
        let i = self.offset(x, y);
        self.data[i..i + 4].copy_from_slice(&pixel);
        Ok(())
    }

    /// 裁剪出 `(x, y, width, height)` 矩形区域。
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Result<Raster, PipelineError> {
        let fits_x = x.checked_add(width).is_some_and(|right| right <= self.width);
        let fits_y = y.checked_add(height).is_some_and(|bottom| bottom <= self.height);
        if !fits_x || !fits_y {
            return Err(PipelineError::InvalidGeometry(format!(
                "裁剪区域 ({}, {}, {}x{}) 超出源图 {}x{}",
                x, y, width, height, self.width, self.height
            )));
        }

        let row_bytes = width as usize * 4;
        let mut data = Vec::with_capacity(row_bytes * height as usize);
        for row in y..y + height {
            let start = self.offset(x, row);
            data.extend_from_slice(&self.data[start..start + row_bytes]);
        }

        Ok(Raster { width, height, data })
    }

    /// 居中裁剪：取 `((W-w)/2, (H-h)/2, w, h)`。
    ///
    /// 目标尺寸大于源图时直接失败，不做隐式填充。
    pub fn crop_center(&self, width: u32, height: u32) -> Result<Raster, PipelineError> {
        if width > self.width || height > self.height {
            return Err(PipelineError::InvalidGeometry(format!(
                "居中裁剪尺寸 {}x{} 超出源图 {}x{}",
                width, height, self.width, self.height
            )));
        }

        let x = (self.width - width) / 2;
        let y = (self.height - height) / 2;
        self.crop(x, y, width, height)
    }

    /// 填充到 `size x size` 的白色画布。
    ///
    /// `centered = false` 时贴在左上角，否则贴在 [`pad_offset`] 给出的位置。
    /// 源像素按原值拷贝（包括 alpha），因此左上角取回的区域与原图逐字节一致。
    pub fn pad(&self, size: u32, centered: bool) -> Result<Raster, PipelineError> {
        if self.width > size || self.height > size {
            return Err(PipelineError::InvalidGeometry(format!(
                "填充尺寸 {} 小于源图 {}x{}",
                size, self.width, self.height
            )));
        }

        let (offset_x, offset_y) = if centered {
            pad_offset(self.width, self.height, size, size)
        } else {
            (0, 0)
        };

        let mut canvas = Raster::filled(size, size, PAD_BACKGROUND);
        let row_bytes = self.width as usize * 4;
        for row in 0..self.height {
            let src = self.offset(0, row);
            let dst = canvas.offset(offset_x, offset_y + row);
            canvas.data[dst..dst + row_bytes].copy_from_slice(&self.data[src..src + row_bytes]);
        }

        Ok(canvas)
    }

    /// 将 `overlay` 以整数偏移 `(x, y)` 线性 alpha 混合到当前图上。
    ///
    /// 混合系数为 `overlay_alpha / 255 * opacity`，超出底图的部分被裁掉。
    pub fn composite_alpha(&self, overlay: &Raster, x: i64, y: i64, opacity: f32) -> Raster {
        let opacity = opacity.clamp(0.0, 1.0);
        let mut out = self.clone();

        for oy in 0..overlay.height {
            let by = y + oy as i64;
            if by < 0 || by >= self.height as i64 {
                continue;
            }
            for ox in 0..overlay.width {
                let bx = x + ox as i64;
                if bx < 0 || bx >= self.width as i64 {
                    continue;
                }

                let src = overlay.offset(ox, oy);
                let dst = out.offset(bx as u32, by as u32);
                let alpha = overlay.data[src + 3] as f32 / 255.0 * opacity;
                if alpha <= 0.0 {
                    continue;
                }

                for c in 0..3 {
                    let base = out.data[dst + c] as f32;
                    let top = overlay.data[src + c] as f32;
                    out.data[dst + c] = blend_channel(base, top, alpha);
                }
                let base_alpha = out.data[dst + 3] as f32 / 255.0;
                let combined = alpha + base_alpha * (1.0 - alpha);
                out.data[dst + 3] = (combined * 255.0).round().clamp(0.0, 255.0) as u8;
            }
        }

        out
    }

    /// 内部构造：调用方保证长度正确。
    pub(crate) fn from_raw_parts(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize * 4);
        Self { width, height, data }
    }

    pub(crate) fn from_rgba_image(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            data: image.into_raw(),
        }
    }

    pub(crate) fn to_rgba_image(&self) -> Result<RgbaImage, PipelineError> {
        ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| PipelineError::Decode("RGBA 缓冲长度异常".to_string()))
    }

    #[inline]
    pub(crate) fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    fn byte_len(width: u32, height: u32) -> Result<usize, PipelineError> {
        (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(4))
            .ok_or_else(|| PipelineError::ResourceLimit("图片尺寸导致内存溢出风险".to_string()))
    }
}

/// 居中放置时的左上角偏移。
///
/// 取整方式为向下取整；填充与张量提取两处都使用这里的结果，保证偏移一致。
pub fn pad_offset(width: u32, height: u32, target_width: u32, target_height: u32) -> (u32, u32) {
    (
        target_width.saturating_sub(width) / 2,
        target_height.saturating_sub(height) / 2,
    )
}

fn blend_channel(base: f32, top: f32, alpha: f32) -> u8 {
    (base * (1.0 - alpha) + top * alpha).round().clamp(0.0, 255.0) as u8
}
