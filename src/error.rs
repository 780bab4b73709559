//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 整条流水线（加载 → 预处理 → 推理 → 后处理）共用一个 `PipelineError` 枚举，
//! 调用侧可以按分支匹配，也可以通过 `code()` 拿到稳定的错误码交给 UI 层。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 推理引擎的错误原样保存在 `InferenceEngine` 分支的 `source` 中，不做改写。
//! - 核心内部不做任何自动重试，也不会在失败时替换为默认数据。

/// 推理引擎返回的不透明错误。
pub type EngineError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 流水线统一错误类型。
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 预处理描述文件缺失、格式错误或取值越界，在任何处理开始前就会返回。
    #[error("配置错误：{0}")]
    Configuration(String),

    /// 张量形状不一致（批处理维度不同、模型输出形状异常等）。
    #[error("形状不匹配：{0}")]
    ShapeMismatch(String),

    /// 分割解码时既没有点也没有框，且未启用中性点兜底。
    #[error("缺少分割提示：至少需要提供一个点或一个框")]
    MissingPrompt,

    /// 外部推理引擎失败。
    #[error("推理引擎错误：{0}")]
    InferenceEngine(#[source] EngineError),

    /// 提示引用的图片已被替换，嵌入缓存不能再与它配对。
    #[error("图片已过期：提示引用 #{requested}，当前图片 #{current}")]
    StaleImage { requested: u64, current: u64 },

    /// 会话中尚未加载图片就请求编码或解码。
    #[error("尚未加载图片")]
    NoImageLoaded,

    /// 模型输出中缺少约定的键。
    #[error("模型输出缺少字段：{0}")]
    MissingOutput(String),

    /// 几何参数非法（裁剪/填充超出范围、零尺寸等）。
    #[error("几何参数错误：{0}")]
    InvalidGeometry(String),

    #[error("格式错误：{0}")]
    InvalidFormat(String),

    #[error("解码错误：{0}")]
    Decode(String),

    #[error("文件错误：{0}")]
    FileSystem(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),
}

impl PipelineError {
    /// 稳定的机器可读错误码，供 UI 层区分处理。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::ShapeMismatch(_) => "shape_mismatch",
            Self::MissingPrompt => "missing_prompt",
            Self::InferenceEngine(_) => "inference_engine",
            Self::StaleImage { .. } => "stale_image",
            Self::NoImageLoaded => "no_image_loaded",
            Self::MissingOutput(_) => "missing_output",
            Self::InvalidGeometry(_) => "invalid_geometry",
            Self::InvalidFormat(_) => "invalid_format",
            Self::Decode(_) => "decode",
            Self::FileSystem(_) => "file_system",
            Self::ResourceLimit(_) => "resource_limit",
        }
    }

    /// 包装外部引擎错误。
    pub fn engine<E>(error: E) -> Self
    where
        E: Into<EngineError>,
    {
        Self::InferenceEngine(error.into())
    }
}
