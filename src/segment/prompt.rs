//! # 提示与坐标映射
//!
//! ## 设计思路
//!
//! 用户的点击与框选都在原图像素坐标系里，解码器需要的是“长边缩放到 1024”
//! 之后的模型坐标系。这里负责两者之间的换算，并组装 `point_coords` / `point_labels`。
//!
//! ## 实现思路
//!
//! - 点：统一比例 `min(1024/W, 1024/H)`，与编码器的长边缩放一致。
//! - 框角：默认使用独立比例 `1024/W`、`1024/H`（`BoxScaling::Independent`），
//!   也可切换为与点相同的统一比例。两种行为都保留，由调用方显式选择。
//! - 空提示：`EmptyPromptPolicy` 决定提交中性点 `(0,0,-1)` 还是直接报错。

use crate::PipelineError;
use crate::tensor::Tensor;

/// 编码器输入边长。
pub const MODEL_INPUT_SIZE: u32 = 1024;

pub const LABEL_PADDING: f32 = -1.0;
pub const LABEL_NEGATIVE: f32 = 0.0;
pub const LABEL_POSITIVE: f32 = 1.0;
pub const LABEL_BOX_TOP_LEFT: f32 = 2.0;
pub const LABEL_BOX_BOTTOM_RIGHT: f32 = 3.0;

/// 坐标点；`positive` 区分前景/背景点击。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub positive: bool,
}

impl Point {
    pub fn positive(x: f64, y: f64) -> Self {
        Self { x, y, positive: true }
    }

    pub fn negative(x: f64, y: f64) -> Self {
        Self { x, y, positive: false }
    }
}

/// 轴对齐包围盒。所在坐标系（原图或模型）由调用方自行跟踪。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub top_left: Point,
    pub bottom_right: Point,
}

impl BoundingBox {
    /// 退化包围盒：左上 `(∞, ∞)`、右下 `(0, 0)`，表示“没有前景”。
    pub fn empty() -> Self {
        Self {
            top_left: Point::negative(f64::INFINITY, f64::INFINITY),
            bottom_right: Point::negative(0.0, 0.0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.top_left.x > self.bottom_right.x || self.top_left.y > self.bottom_right.y
    }

    /// 扩展包围盒使其包含 `(x, y)`。
    pub fn include(&mut self, x: f64, y: f64) {
        self.top_left.x = self.top_left.x.min(x);
        self.top_left.y = self.top_left.y.min(y);
        self.bottom_right.x = self.bottom_right.x.max(x);
        self.bottom_right.y = self.bottom_right.y.max(y);
    }
}

/// 一张已加载图片的标识，图片被替换后旧标识失效。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageId(pub(crate) u64);

impl ImageId {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// 分割提示：点与框角对，均为原图像素坐标。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentationPrompt {
    /// 提示针对的图片；为 `None` 时默认指当前图片。
    pub image: Option<ImageId>,
    pub points: Vec<Point>,
    pub boxes: Vec<[Point; 2]>,
}

impl SegmentationPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_image(mut self, image: ImageId) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_point(mut self, point: Point) -> Self {
        self.points.push(point);
        self
    }

    pub fn with_box(mut self, top_left: Point, bottom_right: Point) -> Self {
        self.boxes.push([top_left, bottom_right]);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty() && self.boxes.is_empty()
    }
}

/// 既没有点也没有框时的处理方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyPromptPolicy {
    /// 提交中性点 `(0, 0)`、标签 `-1`，请求模型给出默认掩码。
    #[default]
    NeutralPoint,
    /// 直接返回 `MissingPrompt`。
    Reject,
}

/// 框角坐标的缩放方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoxScaling {
    /// x、y 分别按 `1024/W`、`1024/H` 缩放。
    #[default]
    Independent,
    /// 与点相同的统一比例 `min(1024/W, 1024/H)`。
    Uniform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptOptions {
    pub empty_prompt: EmptyPromptPolicy,
    pub box_scaling: BoxScaling,
    /// 只有点没有框时追加 `(0,0,-1)` 占位点。
    pub pad_point_without_box: bool,
    pub model_size: u32,
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            empty_prompt: EmptyPromptPolicy::default(),
            box_scaling: BoxScaling::default(),
            pad_point_without_box: true,
            model_size: MODEL_INPUT_SIZE,
        }
    }
}

/// 映射后的模型坐标与标签。
#[derive(Debug, Clone, PartialEq)]
pub struct PromptArrays {
    /// 交错的 `x, y`，长度为 `2 * N`。
    pub coords: Vec<f32>,
    pub labels: Vec<f32>,
}

impl PromptArrays {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    fn push(&mut self, x: f64, y: f64, label: f32) {
        self.coords.push(x as f32);
        self.coords.push(y as f32);
        self.labels.push(label);
    }

    /// `[1, N, 2]`
    pub fn coords_tensor(&self) -> Result<Tensor, PipelineError> {
        Tensor::new(self.coords.clone(), vec![1, self.len(), 2])
    }

    /// `[1, N]`
    pub fn labels_tensor(&self) -> Result<Tensor, PipelineError> {
        Tensor::new(self.labels.clone(), vec![1, self.len()])
    }
}

/// 原图坐标 → 模型坐标。
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptMapper {
    options: PromptOptions,
}

impl PromptMapper {
    pub fn new(options: PromptOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PromptOptions {
        &self.options
    }

    /// 点使用的统一比例。
    pub fn point_scale(&self, original_width: u32, original_height: u32) -> f64 {
        let (sx, sy) = self.axis_scales(original_width, original_height);
        sx.min(sy)
    }

    /// 框角使用的 `(scale_x, scale_y)`。
    pub fn box_scales(&self, original_width: u32, original_height: u32) -> (f64, f64) {
        match self.options.box_scaling {
            BoxScaling::Independent => self.axis_scales(original_width, original_height),
            BoxScaling::Uniform => {
                let scale = self.point_scale(original_width, original_height);
                (scale, scale)
            }
        }
    }

    /// 把提示映射为解码器输入数组。
    pub fn map(
        &self,
        prompt: &SegmentationPrompt,
        original_width: u32,
        original_height: u32,
    ) -> Result<PromptArrays, PipelineError> {
        if original_width == 0 || original_height == 0 {
            return Err(PipelineError::InvalidGeometry(format!(
                "原图尺寸非法：{}x{}",
                original_width, original_height
            )));
        }

        let mut arrays = PromptArrays {
            coords: Vec::with_capacity((prompt.points.len() + prompt.boxes.len() * 2 + 1) * 2),
            labels: Vec::with_capacity(prompt.points.len() + prompt.boxes.len() * 2 + 1),
        };

        if prompt.is_empty() {
            return match self.options.empty_prompt {
                EmptyPromptPolicy::Reject => Err(PipelineError::MissingPrompt),
                EmptyPromptPolicy::NeutralPoint => {
                    log::debug!("空提示，提交中性点 (0,0,-1)");
                    arrays.push(0.0, 0.0, LABEL_PADDING);
                    Ok(arrays)
                }
            };
        }

        let scale = self.point_scale(original_width, original_height);
        for point in &prompt.points {
            let label = if point.positive {
                LABEL_POSITIVE
            } else {
                LABEL_NEGATIVE
            };
            arrays.push(point.x * scale, point.y * scale, label);
        }

        let (scale_x, scale_y) = self.box_scales(original_width, original_height);
        for [top_left, bottom_right] in &prompt.boxes {
            arrays.push(top_left.x * scale_x, top_left.y * scale_y, LABEL_BOX_TOP_LEFT);
            arrays.push(
                bottom_right.x * scale_x,
                bottom_right.y * scale_y,
                LABEL_BOX_BOTTOM_RIGHT,
            );
        }

        if prompt.boxes.is_empty() && self.options.pad_point_without_box {
            arrays.push(0.0, 0.0, LABEL_PADDING);
        }

        Ok(arrays)
    }

    fn axis_scales(&self, original_width: u32, original_height: u32) -> (f64, f64) {
        let size = self.options.model_size as f64;
        (size / original_width as f64, size / original_height as f64)
    }
}
