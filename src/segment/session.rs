//! # 分割会话
//!
//! ## 设计思路
//!
//! 一个会话持有：当前图片、与之配对的图像嵌入、最近一次掩码。
//! 编码器很贵，解码器很便宜，所以嵌入按图片缓存，提示变化只重跑解码器。
//!
//! ```text
//! Unloaded ──load_image──▶ (图片就绪) ──embed──▶ Embedded
//! Embedded ──segment──▶ Prompted ──解码成功──▶ Masked
//!                          └──解码失败──▶ Embedded（嵌入保留）
//! 任意状态 ──load_image──▶ 嵌入与掩码同时作废
//! ```
//!
//! ## 实现思路
//!
//! - 每次 `load_image` 分配新的 `ImageId`，嵌入缓存按 `ImageId` 打标签，
//!   引用旧 `ImageId` 的提示返回 `StaleImage`，不会和新嵌入配对。
//! - 所有可变操作都要 `&mut self`，同一会话上的编码与解码天然串行。
//! - 引擎失败时缓存保持原样，不做自动重试。

use std::num::NonZeroU8;
use std::time::{Duration, Instant};

use crate::PipelineError;
use crate::inference::{self, Feeds, InferenceEngine};
use crate::preprocess::{IMAGENET_MEAN, IMAGENET_STD, ValuePolicy};
use crate::raster::{self, DEFAULT_FILTER, FilterType, Raster};
use crate::tensor::{CanvasLayout, ChannelOrder, Tensor, planarize_with};

use super::mask::{Mask, decode_mask_tensor};
use super::prompt::{
    ImageId, PromptArrays, PromptMapper, PromptOptions, SegmentationPrompt,
};

pub const ENCODER_INPUT: &str = "x";
pub const DECODER_EMBEDDINGS: &str = "image_embeddings";
pub const DECODER_POINT_COORDS: &str = "point_coords";
pub const DECODER_POINT_LABELS: &str = "point_labels";
pub const DECODER_MASK_INPUT: &str = "mask_input";
pub const DECODER_HAS_MASK_INPUT: &str = "has_mask_input";
pub const DECODER_ORIG_SIZE: &str = "orig_im_size";
pub const DECODER_MASKS: &str = "masks";

/// 会话参数。
#[derive(Debug, Clone)]
pub struct SegmentOptions {
    pub prompt: PromptOptions,
    pub mean: [f32; 3],
    pub std: [f32; 3],
    pub filter: FilterType,
    /// 编码器输出的预期形状。
    pub embedding_shape: [usize; 4],
    /// `mask_input` 的边长。
    pub mask_input_size: usize,
    pub mask_input_fill: f32,
    /// 前景像素写入的值；0 留给背景。
    pub mask_id: NonZeroU8,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            prompt: PromptOptions::default(),
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
            filter: DEFAULT_FILTER,
            embedding_shape: [1, 256, 64, 64],
            mask_input_size: 256,
            mask_input_fill: 0.0,
            mask_id: NonZeroU8::MIN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// 没有图片，或图片已加载但尚未编码。
    Unloaded,
    Embedded,
    Prompted,
    Masked,
}

/// 编码器输入与缩放后的尺寸。
#[derive(Debug, Clone)]
pub struct EncoderInput {
    /// `[1, 3, 1024, 1024]`
    pub tensor: Tensor,
    pub new_width: u32,
    pub new_height: u32,
}

#[derive(Debug, Clone)]
pub struct SegmentResult {
    pub image: ImageId,
    pub mask: Mask,
    /// 仅解码器耗时。
    pub elapsed: Duration,
}

/// 长边缩放到模型尺寸 → 左上对齐白色填充 → ImageNet 归一化 → 平面化。
pub fn prepare_encoder_input(
    image: &Raster,
    options: &SegmentOptions,
) -> Result<EncoderInput, PipelineError> {
    let size = options.prompt.model_size;
    let resized = raster::resize_longer(image, size, options.filter)?;
    let (new_width, new_height) = resized.dimensions();
    let padded = resized.pad(size, false)?;

    let values = ValuePolicy::Normalize {
        mean: options.mean,
        std: options.std,
    };
    let planes = planarize_with(
        &padded,
        CanvasLayout::fit(&padded),
        ChannelOrder::Rgb,
        |raw, channel| values.apply(raw, channel),
    );
    let tensor = Tensor::from_array(planes);

    Ok(EncoderInput {
        tensor,
        new_width,
        new_height,
    })
}

struct LoadedImage {
    id: ImageId,
    raster: Raster,
}

/// 单张图片的交互式分割会话。
pub struct SegmentSession<E, D> {
    encoder: E,
    decoder: D,
    options: SegmentOptions,
    mapper: PromptMapper,
    image: Option<LoadedImage>,
    embedding: Option<(ImageId, Tensor)>,
    last_mask: Option<Mask>,
    state: SessionState,
    next_id: u64,
}

impl<E, D> SegmentSession<E, D>
where
    E: InferenceEngine,
    D: InferenceEngine,
{
    pub fn new(encoder: E, decoder: D, options: SegmentOptions) -> Self {
        let mapper = PromptMapper::new(options.prompt);
        Self {
            encoder,
            decoder,
            options,
            mapper,
            image: None,
            embedding: None,
            last_mask: None,
            state: SessionState::Unloaded,
            next_id: 0,
        }
    }

    pub fn options(&self) -> &SegmentOptions {
        &self.options
    }

    pub fn mapper(&self) -> &PromptMapper {
        &self.mapper
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn image_id(&self) -> Option<ImageId> {
        self.image.as_ref().map(|image| image.id)
    }

    pub fn image(&self) -> Option<&Raster> {
        self.image.as_ref().map(|image| &image.raster)
    }

    /// 当前图片的嵌入（已编码时）。
    pub fn embedding(&self) -> Option<&Tensor> {
        let current = self.image_id()?;
        self.embedding
            .as_ref()
            .filter(|(id, _)| *id == current)
            .map(|(_, tensor)| tensor)
    }

    pub fn last_mask(&self) -> Option<&Mask> {
        self.last_mask.as_ref()
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// 替换当前图片，旧嵌入与旧掩码一并作废。
    pub fn load_image(&mut self, raster: Raster) -> ImageId {
        self.next_id += 1;
        let id = ImageId(self.next_id);
        log::info!(
            "🧩 加载分割图片 #{}（{}x{}）",
            id.0,
            raster.width(),
            raster.height()
        );

        self.image = Some(LoadedImage { id, raster });
        self.embedding = None;
        self.last_mask = None;
        self.state = SessionState::Unloaded;
        id
    }

    /// 卸载图片，回到初始状态。
    pub fn clear(&mut self) {
        self.image = None;
        self.embedding = None;
        self.last_mask = None;
        self.state = SessionState::Unloaded;
    }

    /// 对当前图片运行编码器；已有嵌入时直接返回缓存。
    pub async fn embed(&mut self) -> Result<&Tensor, PipelineError> {
        let image = self.image.as_ref().ok_or(PipelineError::NoImageLoaded)?;
        let id = image.id;

        let cached = matches!(&self.embedding, Some((cached_id, _)) if *cached_id == id);
        if !cached {
            let start = Instant::now();
            let input = prepare_encoder_input(&image.raster, &self.options)?;
            log::debug!(
                "编码器输入就绪 {:?}（缩放后 {}x{}）{}ms",
                input.tensor.shape(),
                input.new_width,
                input.new_height,
                start.elapsed().as_millis()
            );

            let mut feeds = Feeds::new();
            feeds.insert(ENCODER_INPUT.to_string(), input.tensor);
            let mut outputs = inference::run_engine(&self.encoder, feeds, "编码器").await?;
            let output = inference::take_first_output(&self.encoder, &mut outputs)?;
            let embedding = self.validate_embedding(output)?;

            log::info!(
                "✅ 图片 #{} 编码完成，耗时 {}ms",
                id.0,
                start.elapsed().as_millis()
            );
            self.embedding = Some((id, embedding));
            self.state = SessionState::Embedded;
        } else {
            log::debug!("图片 #{} 命中嵌入缓存", id.0);
        }

        match &self.embedding {
            Some((_, tensor)) => Ok(tensor),
            None => Err(PipelineError::NoImageLoaded),
        }
    }

    /// 根据提示运行解码器，必要时先编码。
    pub async fn segment(
        &mut self,
        prompt: &SegmentationPrompt,
    ) -> Result<SegmentResult, PipelineError> {
        let current = self.image_id().ok_or(PipelineError::NoImageLoaded)?;
        if let Some(requested) = prompt.image {
            if requested != current {
                log::warn!(
                    "⚠️ 提示引用图片 #{}，当前图片为 #{}",
                    requested.0,
                    current.0
                );
                return Err(PipelineError::StaleImage {
                    requested: requested.0,
                    current: current.0,
                });
            }
        }

        // 提示只依赖原图尺寸，先映射，无效提示不会触发编码
        let (width, height) = self
            .image()
            .map(Raster::dimensions)
            .ok_or(PipelineError::NoImageLoaded)?;
        let arrays = self.mapper.map(prompt, width, height)?;

        let embedding = self.embed().await?.clone();
        self.last_mask = None;
        self.state = SessionState::Prompted;

        let start = Instant::now();
        match self.decode(embedding, &arrays, width, height).await {
            Ok(mask) => {
                let elapsed = start.elapsed();
                log::info!(
                    "✅ 解码完成：{} 个提示点，前景 {} 像素，耗时 {}ms",
                    arrays.len(),
                    mask.foreground_count(),
                    elapsed.as_millis()
                );
                self.last_mask = Some(mask.clone());
                self.state = SessionState::Masked;
                Ok(SegmentResult {
                    image: current,
                    mask,
                    elapsed,
                })
            }
            Err(err) => {
                self.state = SessionState::Embedded;
                Err(err)
            }
        }
    }

    /// 组装解码器输入。
    pub fn decoder_feeds(
        &self,
        embedding: Tensor,
        arrays: &PromptArrays,
        width: u32,
        height: u32,
    ) -> Result<Feeds, PipelineError> {
        let size = self.options.mask_input_size;
        let mut feeds = Feeds::new();
        feeds.insert(DECODER_EMBEDDINGS.to_string(), embedding);
        feeds.insert(DECODER_POINT_COORDS.to_string(), arrays.coords_tensor()?);
        feeds.insert(DECODER_POINT_LABELS.to_string(), arrays.labels_tensor()?);
        feeds.insert(
            DECODER_MASK_INPUT.to_string(),
            Tensor::filled(vec![1, 1, size, size], self.options.mask_input_fill)?,
        );
        feeds.insert(DECODER_HAS_MASK_INPUT.to_string(), Tensor::zeros(vec![1])?);
        feeds.insert(
            DECODER_ORIG_SIZE.to_string(),
            Tensor::new(vec![height as f32, width as f32], vec![2])?,
        );
        Ok(feeds)
    }

    async fn decode(
        &self,
        embedding: Tensor,
        arrays: &PromptArrays,
        width: u32,
        height: u32,
    ) -> Result<Mask, PipelineError> {
        let feeds = self.decoder_feeds(embedding, arrays, width, height)?;
        let mut outputs = inference::run_engine(&self.decoder, feeds, "解码器").await?;
        let masks = inference::take_output(&mut outputs, DECODER_MASKS)?;

        let shape = masks.shape();
        let matches = shape.len() == 4
            && shape[0] >= 1
            && shape[1] >= 1
            && shape[2] == height as usize
            && shape[3] == width as usize;
        if !matches {
            return Err(PipelineError::ShapeMismatch(format!(
                "解码器输出形状 {:?}，期望 [1, k, {}, {}]",
                shape, height, width
            )));
        }

        decode_mask_tensor(&masks, self.options.mask_id)
    }

    fn validate_embedding(&self, output: Tensor) -> Result<Tensor, PipelineError> {
        let expected = self.options.embedding_shape.to_vec();
        let expected_len: usize = expected.iter().product();
        if output.len() != expected_len {
            return Err(PipelineError::ShapeMismatch(format!(
                "编码器输出 {:?}（{} 个元素），期望 {:?}",
                output.shape(),
                output.len(),
                expected
            )));
        }
        output.reshape(expected)
    }
}
