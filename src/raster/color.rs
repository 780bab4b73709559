//! RGB 与 YCbCr（JPEG 全范围系数）互转。
//!
//! 超分辨率模型只处理亮度通道，色度平面单独缩放后再合并回来。
//! 每个通道独立四舍五入并钳制到 `[0, 255]`，alpha 原样保留。

use super::Raster;

/// 逐像素 RGB → YCbCr。
pub fn rgb_to_ycbcr(raster: &Raster) -> Raster {
    map_pixels(raster, |r, g, b| {
        [
            0.299 * r + 0.587 * g + 0.114 * b,
            128.0 - 0.168736 * r - 0.331264 * g + 0.5 * b,
            128.0 + 0.5 * r - 0.418688 * g - 0.081312 * b,
        ]
    })
}

/// 逐像素 YCbCr → RGB，`rgb_to_ycbcr` 的精确逆变换。
pub fn ycbcr_to_rgb(raster: &Raster) -> Raster {
    map_pixels(raster, |y, cb, cr| {
        [
            y + 1.402 * (cr - 128.0),
            y - 0.344136 * (cb - 128.0) - 0.714136 * (cr - 128.0),
            y + 1.772 * (cb - 128.0),
        ]
    })
}

fn map_pixels<F>(raster: &Raster, convert: F) -> Raster
where
    F: Fn(f64, f64, f64) -> [f64; 3],
{
    let mut data = Vec::with_capacity(raster.as_bytes().len());
    for px in raster.as_bytes().chunks_exact(4) {
        let out = convert(px[0] as f64, px[1] as f64, px[2] as f64);
        data.push(to_byte(out[0]));
        data.push(to_byte(out[1]));
        data.push(to_byte(out[2]));
        data.push(px[3]);
    }

    Raster::from_raw_parts(raster.width(), raster.height(), data)
}

#[inline]
fn to_byte(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
