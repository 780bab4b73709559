//! # 加载配置模块
//!
//! ## 设计思路
//!
//! 把加载阶段的资源上限集中到 `LoadConfig`，在完整解码之前就能按头部尺寸拒绝
//! 过大的输入。默认值面向浏览器侧常见图片（手机照片、截图）。

use super::ImageSourceKind;
use crate::PipelineError;

/// 图片加载配置。
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// 读取原始字节时允许的最大体积（字节）。
    pub max_file_size: u64,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 按 RGBA 估算的解码内存上限（字节）。
    pub max_decoded_bytes: u64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            max_decoded_pixels: 40_000_000,
            max_decoded_bytes: 160 * 1024 * 1024,
        }
    }
}

impl LoadConfig {
    /// 校验原始字节体积。
    pub(crate) fn check_file_size(&self, len: u64, kind: ImageSourceKind) -> Result<(), PipelineError> {
        if len > self.max_file_size {
            return Err(PipelineError::ResourceLimit(format!(
                "{} 图片体积过大：{:.2} MB（限制：{:.2} MB）",
                kind.as_str(),
                len as f64 / 1024.0 / 1024.0,
                self.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }
        Ok(())
    }

    /// 校验像素数量与解码内存估算。
    pub(crate) fn check_dimensions(&self, width: u32, height: u32) -> Result<(), PipelineError> {
        let pixels = (width as u64)
            .checked_mul(height as u64)
            .ok_or_else(|| PipelineError::ResourceLimit("图片像素数溢出".to_string()))?;

        if pixels > self.max_decoded_pixels {
            return Err(PipelineError::ResourceLimit(format!(
                "图片像素过大：{} 像素（限制：{} 像素）",
                pixels, self.max_decoded_pixels
            )));
        }

        let estimated = pixels
            .checked_mul(4)
            .ok_or_else(|| PipelineError::ResourceLimit("图片解码内存估算溢出".to_string()))?;
        if estimated > self.max_decoded_bytes {
            return Err(PipelineError::ResourceLimit(format!(
                "图片解码预计内存过大：{:.2} MB（限制：{:.2} MB）",
                estimated as f64 / 1024.0 / 1024.0,
                self.max_decoded_bytes as f64 / 1024.0 / 1024.0
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_too_many_pixels() {
        let config = LoadConfig {
            max_decoded_pixels: 1_000_000,
            ..LoadConfig::default()
        };

        assert!(config.check_dimensions(1000, 1000).is_ok());
        assert!(matches!(
            config.check_dimensions(1001, 1000),
            Err(PipelineError::ResourceLimit(_))
        ));
    }

    #[test]
    fn rejects_large_memory_estimate() {
        let config = LoadConfig {
            max_decoded_bytes: 1024,
            ..LoadConfig::default()
        };

        assert!(config.check_dimensions(16, 16).is_ok());
        assert!(config.check_dimensions(17, 16).is_err());
    }

    #[test]
    fn rejects_oversized_file() {
        let config = LoadConfig {
            max_file_size: 10,
            ..LoadConfig::default()
        };

        assert!(config.check_file_size(10, ImageSourceKind::Bytes).is_ok());
        assert!(config.check_file_size(11, ImageSourceKind::File).is_err());
    }
}
