//! # 缩放模块
//!
//! ## 设计思路
//!
//! 默认使用双三次（`CatmullRom`）插值。优先走 `fast_image_resize` 的卷积实现，
//! 失败时回退到 `image::imageops::resize`，两条路径使用同一种滤镜。
//!
//! ## 实现思路
//!
//! 1. 校验目标尺寸非零
//! 2. 目标尺寸与源图一致时直接返回副本
//! 3. `fast_image_resize` 缩放，失败则记录告警并回退

use fast_image_resize as fr;
use image::imageops::FilterType;

use super::Raster;
use crate::PipelineError;

/// 默认滤镜：双三次插值。
pub const DEFAULT_FILTER: FilterType = FilterType::CatmullRom;

/// 将光栅图缩放到 `width x height`。
pub fn resize(
    raster: &Raster,
    width: u32,
    height: u32,
    filter: FilterType,
) -> Result<Raster, PipelineError> {
    if width == 0 || height == 0 {
        return Err(PipelineError::InvalidGeometry(format!(
            "缩放目标尺寸不能为 0：{}x{}",
            width, height
        )));
    }
    if raster.width() == 0 || raster.height() == 0 {
        return Err(PipelineError::InvalidGeometry("不能缩放空图片".to_string()));
    }
    if raster.dimensions() == (width, height) {
        return Ok(raster.clone());
    }

    log::debug!(
        "🧩 缩放：{}x{} -> {}x{}（filter={:?}）",
        raster.width(),
        raster.height(),
        width,
        height,
        filter
    );

    match resize_with_fast_image_resize(raster, width, height, filter) {
        Ok(resized) => Ok(resized),
        Err(err) => {
            log::warn!("⚠️ fast_image_resize 缩放失败，回退 image::imageops::resize：{}", err);
            let source = raster.to_rgba_image()?;
            let resized = image::imageops::resize(&source, width, height, filter);
            Ok(Raster::from_rgba_image(resized))
        }
    }
}

/// 保持宽高比缩放，使长边等于 `size`。
pub fn resize_longer(raster: &Raster, size: u32, filter: FilterType) -> Result<Raster, PipelineError> {
    let (width, height) = longer_side_dimensions(raster.width(), raster.height(), size);
    resize(raster, width, height, filter)
}

/// 长边对齐 `size` 后的尺寸，短边四舍五入且至少为 1。
pub fn longer_side_dimensions(width: u32, height: u32, size: u32) -> (u32, u32) {
    if width >= height {
        (size, scaled_side(height, size, width))
    } else {
        (scaled_side(width, size, height), size)
    }
}

/// 短边对齐 `size` 后的尺寸，长边四舍五入且至少为 1。
pub fn shorter_side_dimensions(width: u32, height: u32, size: u32) -> (u32, u32) {
    if width <= height {
        (size, scaled_side(height, size, width))
    } else {
        (scaled_side(width, size, height), size)
    }
}

fn scaled_side(side: u32, target: u32, reference: u32) -> u32 {
    if reference == 0 {
        return 1;
    }
    ((side as f64 * target as f64 / reference as f64).round() as u32).max(1)
}

fn resize_with_fast_image_resize(
    raster: &Raster,
    width: u32,
    height: u32,
    filter: FilterType,
) -> Result<Raster, PipelineError> {
    let src_image = fr::images::Image::from_vec_u8(
        raster.width(),
        raster.height(),
        raster.as_bytes().to_vec(),
        fr::PixelType::U8x4,
    )
    .map_err(|e| PipelineError::Decode(format!("构建源图像缓冲失败：{}", e)))?;

    let mut dst_image = fr::images::Image::new(width, height, fr::PixelType::U8x4);

    let mut resizer = fr::Resizer::new();
    let options = fr::ResizeOptions::new()
        .resize_alg(fr::ResizeAlg::Convolution(to_fast_filter(filter)));

    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| PipelineError::Decode(format!("fast_image_resize 执行失败：{}", e)))?;

    Raster::new(width, height, dst_image.into_vec())
}

fn to_fast_filter(filter: FilterType) -> fr::FilterType {
    match filter {
        FilterType::Nearest => fr::FilterType::Box,
        FilterType::Triangle => fr::FilterType::Bilinear,
        FilterType::CatmullRom => fr::FilterType::CatmullRom,
        FilterType::Gaussian => fr::FilterType::Mitchell,
        FilterType::Lanczos3 => fr::FilterType::Lanczos3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longer_side_matches_target() {
        assert_eq!(longer_side_dimensions(2000, 1000, 1024), (1024, 512));
        assert_eq!(longer_side_dimensions(384, 512, 224), (168, 224));
        assert_eq!(longer_side_dimensions(10, 10, 4), (4, 4));
    }

    #[test]
    fn shorter_side_matches_target() {
        assert_eq!(shorter_side_dimensions(512, 384, 224), (299, 224));
        assert_eq!(shorter_side_dimensions(384, 512, 224), (224, 299));
    }

    #[test]
    fn extreme_aspect_keeps_at_least_one_pixel() {
        assert_eq!(longer_side_dimensions(5000, 1, 100), (100, 1));
    }

    #[test]
    fn resize_produces_requested_size() {
        let raster = Raster::filled(40, 30, [12, 34, 56, 255]);
        let resized = resize(&raster, 17, 9, DEFAULT_FILTER).expect("resize should succeed");

        assert_eq!(resized.dimensions(), (17, 9));
        assert_eq!(resized.as_bytes().len(), 17 * 9 * 4);
        // 纯色图经过插值仍然是纯色
        let px = resized.get_pixel(8, 4).expect("in bounds");
        assert!((px[0] as i32 - 12).abs() <= 1);
        assert!((px[2] as i32 - 56).abs() <= 1);
    }

    #[test]
    fn resize_rejects_zero_target() {
        let raster = Raster::filled(4, 4, [0, 0, 0, 255]);
        assert!(matches!(
            resize(&raster, 0, 4, DEFAULT_FILTER),
            Err(PipelineError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn resize_longer_keeps_aspect_ratio() {
        let raster = Raster::filled(200, 100, [0, 0, 0, 255]);
        let resized = resize_longer(&raster, 64, DEFAULT_FILTER).expect("resize should succeed");
        assert_eq!(resized.dimensions(), (64, 32));
    }
}
