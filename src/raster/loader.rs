//! # 加载与解码模块
//!
//! ## 设计思路
//!
//! 图片加载是显式的异步阶段：读取 → 校验 → 解码 → 得到 `Raster`，
//! 任何一步失败都以 `Err` 返回给调用方，不存在“加载完成回调”。
//!
//! ## 实现思路
//!
//! - 文件：metadata 体积限制 + `tokio::fs` 读取。
//! - Base64：Data URL 解析 + 解码前体积估算。
//! - 所有来源都做文件签名校验（`infer`），再按头部尺寸做像素上限检查。
//! - 完整解码放到 `spawn_blocking`，不阻塞异步运行时。

use base64::{Engine as _, engine::general_purpose};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::Path;
use std::time::Instant;

use super::source::RawImageData;
use super::{ImageSource, ImageSourceKind, LoadConfig, Raster};
use crate::PipelineError;

/// 显示用导出格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataUrlFormat {
    Jpeg,
    Png,
}

impl DataUrlFormat {
    fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }
}

/// 图片加载器。
#[derive(Debug, Clone, Default)]
pub struct ImageLoader {
    config: LoadConfig,
}

impl ImageLoader {
    pub fn new(config: LoadConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    /// 加载主入口：从任意来源读取并解码为 `Raster`。
    ///
    /// # 示例
    /// ```rust,ignore
    /// use vision_pipeline::raster::{ImageLoader, ImageSource};
    ///
    /// # async fn demo() -> Result<(), vision_pipeline::PipelineError> {
    /// let loader = ImageLoader::default();
    /// let raster = loader.load(ImageSource::FilePath("cat.jpg".into())).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn load(&self, source: ImageSource) -> Result<Raster, PipelineError> {
        let total_start = Instant::now();

        let raw = match source {
            ImageSource::FilePath(path) => self.read_file(&path).await?,
            ImageSource::Base64(data) => self.read_base64(&data)?,
            ImageSource::Bytes(bytes) => {
                self.config
                    .check_file_size(bytes.len() as u64, ImageSourceKind::Bytes)?;
                RawImageData {
                    bytes,
                    kind: ImageSourceKind::Bytes,
                }
            }
        };
        let load_elapsed = total_start.elapsed();

        let decode_start = Instant::now();
        let raster = self.decode(raw).await?;
        let decode_elapsed = decode_start.elapsed();

        log::info!(
            "✅ 图片加载完成 - {}x{} load={}ms decode={}ms",
            raster.width(),
            raster.height(),
            load_elapsed.as_millis(),
            decode_elapsed.as_millis()
        );

        Ok(raster)
    }

    async fn read_file(&self, path: &Path) -> Result<RawImageData, PipelineError> {
        log::info!("📁 开始读取本地图片 - 路径: {}", path.display());

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| PipelineError::FileSystem(format!("无法读取文件信息 {}：{}", path.display(), e)))?;
        self.config
            .check_file_size(metadata.len(), ImageSourceKind::File)?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PipelineError::FileSystem(format!("无法读取图片文件：{}", e)))?;

        Ok(RawImageData {
            bytes,
            kind: ImageSourceKind::File,
        })
    }

    fn read_base64(&self, data: &str) -> Result<RawImageData, PipelineError> {
        log::info!("📝 开始处理 base64 图片");

        let bytes = parse_base64_with_limit(data, self.config.max_file_size)?;
        self.config
            .check_file_size(bytes.len() as u64, ImageSourceKind::Base64)?;

        Ok(RawImageData {
            bytes,
            kind: ImageSourceKind::Base64,
        })
    }

    async fn decode(&self, raw: RawImageData) -> Result<Raster, PipelineError> {
        validate_image_signature(&raw.bytes)?;

        let (header_width, header_height) = inspect_dimensions(&raw.bytes)?;
        self.config.check_dimensions(header_width, header_height)?;

        let config = self.config.clone();
        let kind = raw.kind;
        tokio::task::spawn_blocking(move || decode_blocking(raw.bytes, &config))
            .await
            .map_err(|e| PipelineError::Decode(format!("{} 解码任务异常终止：{}", kind.as_str(), e)))?
    }
}

fn decode_blocking(bytes: Vec<u8>, config: &LoadConfig) -> Result<Raster, PipelineError> {
    let decoded = image::load_from_memory(&bytes)
        .map_err(|e| PipelineError::Decode(format!("图片解码失败：{}", e)))?;

    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    config.check_dimensions(width, height)?;

    Raster::new(width, height, rgba.into_raw())
}

/// 仅通过图片头信息读取宽高，用于在完整解码前做像素限制检查。
fn inspect_dimensions(bytes: &[u8]) -> Result<(u32, u32), PipelineError> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| PipelineError::InvalidFormat(format!("无法识别图片格式：{}", e)))?;

    reader
        .into_dimensions()
        .map_err(|e| PipelineError::InvalidFormat(format!("无法读取图片尺寸：{}", e)))
}

fn validate_image_signature(bytes: &[u8]) -> Result<(), PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::InvalidFormat("图片内容为空".to_string()));
    }

    let kind = infer::get(bytes)
        .ok_or_else(|| PipelineError::InvalidFormat("无法识别图片类型".to_string()))?;

    if kind.matcher_type() != infer::MatcherType::Image {
        return Err(PipelineError::InvalidFormat(format!(
            "文件签名不是图片类型：{}",
            kind.mime_type()
        )));
    }

    Ok(())
}

fn estimate_base64_decoded_upper_bound_len(base64_data: &str) -> Result<u64, PipelineError> {
    let len = base64_data.trim().len() as u64;
    let groups = len
        .checked_add(3)
        .ok_or_else(|| PipelineError::ResourceLimit("Base64 输入长度溢出".to_string()))?
        / 4;

    groups
        .checked_mul(3)
        .ok_or_else(|| PipelineError::ResourceLimit("Base64 解码体积估算溢出".to_string()))
}

pub(crate) fn parse_base64_with_limit(data: &str, max_file_size: u64) -> Result<Vec<u8>, PipelineError> {
    let normalized = data.trim();

    let payload = if normalized.starts_with("data:") {
        let base64_start = normalized
            .find(";base64,")
            .ok_or_else(|| PipelineError::InvalidFormat("缺少 base64 标记".to_string()))?;
        &normalized[base64_start + 8..]
    } else {
        normalized
    };

    let estimated_len = estimate_base64_decoded_upper_bound_len(payload)?;
    if estimated_len > max_file_size {
        return Err(PipelineError::ResourceLimit(format!(
            "Base64 预计解码体积过大：{:.2} MB（限制：{:.2} MB）",
            estimated_len as f64 / 1024.0 / 1024.0,
            max_file_size as f64 / 1024.0 / 1024.0
        )));
    }

    general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| PipelineError::Decode(format!("Base64 解码失败：{}", e)))
}

/// 将光栅图编码为 Data URL，供前端 `<img>` 直接显示。
///
/// JPEG 不支持 alpha，编码前先丢弃透明通道。
pub fn encode_data_url(raster: &Raster, format: DataUrlFormat) -> Result<String, PipelineError> {
    let rgba = DynamicImage::ImageRgba8(raster.to_rgba_image()?);
    let (image, image_format) = match format {
        DataUrlFormat::Jpeg => (DynamicImage::ImageRgb8(rgba.to_rgb8()), ImageFormat::Jpeg),
        DataUrlFormat::Png => (rgba, ImageFormat::Png),
    };

    let mut cursor = Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, image_format)
        .map_err(|e| PipelineError::Decode(format!("图片编码失败：{}", e)))?;

    let encoded = general_purpose::STANDARD.encode(cursor.into_inner());
    Ok(format!("data:{};base64,{}", format.mime(), encoded))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::ImageBuffer::from_fn(width, height, |x, y| {
            image::Rgba([(x % 255) as u8, (y % 255) as u8, ((x + y) % 255) as u8, 255])
        });
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("failed to encode test image");
        cursor.into_inner()
    }

    #[tokio::test]
    async fn load_bytes_decodes_to_raster() {
        let loader = ImageLoader::default();
        let raster = loader
            .load(ImageSource::Bytes(png_bytes(12, 7)))
            .await
            .expect("load should succeed");

        assert_eq!(raster.dimensions(), (12, 7));
        assert_eq!(raster.get_pixel(3, 2), Some([3, 2, 5, 255]));
    }

    #[tokio::test]
    async fn load_data_url_round_trips_through_encoder() {
        let loader = ImageLoader::default();
        let original = loader
            .load(ImageSource::Bytes(png_bytes(5, 4)))
            .await
            .expect("load should succeed");

        let url = encode_data_url(&original, DataUrlFormat::Png).expect("encode should succeed");
        assert!(url.starts_with("data:image/png;base64,"));

        let reloaded = loader
            .load(ImageSource::Base64(url))
            .await
            .expect("reload should succeed");
        assert_eq!(reloaded, original);
    }

    #[tokio::test]
    async fn load_rejects_non_image_payload() {
        let loader = ImageLoader::default();
        let result = loader.load(ImageSource::Base64("SGVsbG8=".to_string())).await;

        assert!(matches!(result, Err(PipelineError::InvalidFormat(_))));
    }

    #[tokio::test]
    async fn load_rejects_too_many_pixels_before_decode() {
        let loader = ImageLoader::new(LoadConfig {
            max_decoded_pixels: 100,
            ..LoadConfig::default()
        });
        let result = loader.load(ImageSource::Bytes(png_bytes(20, 20))).await;

        assert!(matches!(result, Err(PipelineError::ResourceLimit(_))));
    }

    #[tokio::test]
    async fn load_missing_file_is_file_system_error() {
        let loader = ImageLoader::default();
        let result = loader
            .load(ImageSource::FilePath("/definitely/not/here.png".into()))
            .await;

        assert!(matches!(result, Err(PipelineError::FileSystem(_))));
    }

    #[test]
    fn parse_base64_with_limit_rejects_large_payload_before_decode() {
        let huge = "A".repeat(1024 * 1024);
        let result = parse_base64_with_limit(&huge, 32);

        assert!(matches!(result, Err(PipelineError::ResourceLimit(_))));
    }

    #[test]
    fn jpeg_data_url_has_jpeg_mime() {
        let raster = Raster::filled(8, 8, [10, 200, 30, 128]);
        let url = encode_data_url(&raster, DataUrlFormat::Jpeg).expect("encode should succeed");
        assert!(url.starts_with("data:image/jpeg;base64,"));
    }
}
