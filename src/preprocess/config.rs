//! # 预处理配置模块
//!
//! ## 设计思路
//!
//! 模型目录中的 `preprocessor_config.json` 是松散的 JSON。这里分两层：
//! - `PreprocessDescriptor`：与 JSON 字段一一对应的反序列化结构，拒绝未知字段
//! - `PreprocessConfig`：经过校验的强类型配置，构造后不可变
//!
//! 所有越界或自相矛盾的取值都在构造阶段以 `Configuration` 错误返回，
//! 不做静默兜底。
//!
//! ## 实现思路
//!
//! - 布尔开关缺省为 `false`，`rescale_factor` 缺省为 `1.0`。
//! - 开关打开时对应参数必须给出且合法（尺寸非零、std 非零且有限）。
//! - 同时打开归一化与缩放时归一化优先，记录告警。

use std::path::Path;

use image::imageops::FilterType;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::ValuePolicy;
use crate::PipelineError;
use crate::raster::DEFAULT_FILTER;
use crate::tensor::ChannelOrder;

/// ImageNet 统计量，分类与分割模型共用。
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

static CLASSIFIER_DEFAULT: Lazy<PreprocessConfig> = Lazy::new(|| PreprocessConfig {
    resize: Some(ResizePolicy {
        size: 224,
        mode: ResizeMode::Square,
    }),
    center_crop: None,
    pad: None,
    channel_order: ChannelOrder::Rgb,
    values: ValuePolicy::Normalize {
        mean: IMAGENET_MEAN,
        std: IMAGENET_STD,
    },
    filter: DEFAULT_FILTER,
});

/// `preprocessor_config.json` 的原始字段。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PreprocessDescriptor {
    #[serde(default)]
    pub do_normalize: bool,
    #[serde(default)]
    pub image_mean: Option<Vec<f32>>,
    #[serde(default)]
    pub image_std: Option<Vec<f32>>,
    #[serde(default)]
    pub do_resize: bool,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub do_center_crop: bool,
    #[serde(default)]
    pub crop_size: u32,
    #[serde(default)]
    pub do_flip_channels: bool,
    #[serde(default)]
    pub do_square: bool,
    #[serde(default)]
    pub do_pad: bool,
    #[serde(default)]
    pub pad_size: u32,
    /// 扩展字段：填充时居中放置（缺省左上角）。
    #[serde(default)]
    pub pad_centered: bool,
    #[serde(default)]
    pub do_rescale: bool,
    #[serde(default = "default_rescale_factor")]
    pub rescale_factor: f32,
    #[serde(default)]
    pub resize_longer: bool,
}

fn default_rescale_factor() -> f32 {
    1.0
}

/// 缩放模式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeMode {
    /// 直接缩放到 `size x size`。
    Square,
    /// 保持宽高比，长边等于 `size`。
    Longer,
    /// 保持宽高比，短边等于 `size`。
    Shorter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizePolicy {
    pub size: u32,
    pub mode: ResizeMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PadPolicy {
    pub size: u32,
    pub centered: bool,
}

/// 校验后的预处理配置。
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessConfig {
    resize: Option<ResizePolicy>,
    center_crop: Option<u32>,
    pad: Option<PadPolicy>,
    channel_order: ChannelOrder,
    values: ValuePolicy,
    filter: FilterType,
}

impl PreprocessConfig {
    /// 从描述结构构造并校验。
    pub fn from_descriptor(descriptor: &PreprocessDescriptor) -> Result<Self, PipelineError> {
        let resize = if descriptor.do_resize {
            if descriptor.size == 0 {
                return Err(config_error("do_resize 已开启但 size 为 0"));
            }
            let mode = if descriptor.do_square {
                ResizeMode::Square
            } else if descriptor.resize_longer {
                ResizeMode::Longer
            } else {
                ResizeMode::Shorter
            };
            Some(ResizePolicy {
                size: descriptor.size,
                mode,
            })
        } else {
            None
        };

        let center_crop = if descriptor.do_center_crop {
            if descriptor.crop_size == 0 {
                return Err(config_error("do_center_crop 已开启但 crop_size 为 0"));
            }
            Some(descriptor.crop_size)
        } else {
            None
        };

        let pad = if descriptor.do_pad {
            if descriptor.pad_size == 0 {
                return Err(config_error("do_pad 已开启但 pad_size 为 0"));
            }
            Some(PadPolicy {
                size: descriptor.pad_size,
                centered: descriptor.pad_centered,
            })
        } else {
            None
        };

        let values = Self::value_policy(descriptor)?;

        let channel_order = if descriptor.do_flip_channels {
            ChannelOrder::Bgr
        } else {
            ChannelOrder::Rgb
        };

        Ok(Self {
            resize,
            center_crop,
            pad,
            channel_order,
            values,
            filter: DEFAULT_FILTER,
        })
    }

    /// 从 JSON 文本构造。
    pub fn from_json_str(json: &str) -> Result<Self, PipelineError> {
        let descriptor: PreprocessDescriptor = serde_json::from_str(json)
            .map_err(|e| config_error(&format!("解析预处理配置失败：{}", e)))?;
        Self::from_descriptor(&descriptor)
    }

    /// 从 JSON 文件构造。
    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            config_error(&format!("读取预处理配置 {} 失败：{}", path.display(), e))
        })?;
        let config = Self::from_json_str(&content)?;

        log::info!("⚙️ 已加载预处理配置：{} -> {:?}", path.display(), config);
        Ok(config)
    }

    /// 分类模型默认配置：224 方形缩放 + ImageNet 归一化。
    pub fn classifier_default() -> Self {
        CLASSIFIER_DEFAULT.clone()
    }

    /// 替换缩放滤镜（默认双三次）。
    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    pub fn resize(&self) -> Option<ResizePolicy> {
        self.resize
    }

    pub fn center_crop(&self) -> Option<u32> {
        self.center_crop
    }

    pub fn pad(&self) -> Option<PadPolicy> {
        self.pad
    }

    pub fn channel_order(&self) -> ChannelOrder {
        self.channel_order
    }

    pub fn values(&self) -> ValuePolicy {
        self.values
    }

    pub fn filter(&self) -> FilterType {
        self.filter
    }

    fn value_policy(descriptor: &PreprocessDescriptor) -> Result<ValuePolicy, PipelineError> {
        if descriptor.do_normalize {
            let mean = channel_triple("image_mean", descriptor.image_mean.as_deref())?;
            let std = channel_triple("image_std", descriptor.image_std.as_deref())?;
            if std.iter().any(|&s| s == 0.0) {
                return Err(config_error("image_std 不能包含 0"));
            }
            if descriptor.do_rescale {
                log::warn!("⚠️ do_normalize 与 do_rescale 同时开启，按归一化处理，忽略 rescale_factor");
            }
            return Ok(ValuePolicy::Normalize { mean, std });
        }

        if descriptor.do_rescale {
            let factor = descriptor.rescale_factor;
            if !factor.is_finite() || factor <= 0.0 {
                return Err(config_error(&format!("rescale_factor 必须为正的有限数：{}", factor)));
            }
            return Ok(ValuePolicy::Rescale { factor });
        }

        Ok(ValuePolicy::UnitScale)
    }
}

fn channel_triple(name: &str, values: Option<&[f32]>) -> Result<[f32; 3], PipelineError> {
    let values = values.ok_or_else(|| config_error(&format!("do_normalize 已开启但缺少 {}", name)))?;
    if values.len() != 3 {
        return Err(config_error(&format!(
            "{} 必须恰好包含 3 个通道值，实际 {} 个",
            name,
            values.len()
        )));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(config_error(&format!("{} 包含非有限数", name)));
    }
    Ok([values[0], values[1], values[2]])
}

fn config_error(message: &str) -> PipelineError {
    PipelineError::Configuration(message.to_string())
}
