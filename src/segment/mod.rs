//! # 交互式分割模块（segment）
//!
//! ## 设计思路
//!
//! 两段式分割：编码器每张图片跑一次得到嵌入，解码器按提示反复运行。
//!
//! - `prompt`：点/框提示与原图 → 模型坐标映射
//! - `session`：会话状态机、嵌入缓存与解码器输入组装
//! - `mask`：logits → 二值掩码、包围盒与叠加渲染
//!
//! ```text
//! Raster ──load_image──▶ SegmentSession ──embed──▶ [1,256,64,64]
//!                               │
//! SegmentationPrompt ──PromptMapper──▶ point_coords / point_labels
//!                               ↓
//!                       decoder("masks") ──decode_mask──▶ Mask
//! ```

mod mask;
mod prompt;
mod session;

pub use mask::{DEFAULT_MASK_COLOR, DEFAULT_OVERLAY_OPACITY, Mask, decode_mask, decode_mask_tensor};
pub use prompt::{
    BoundingBox, BoxScaling, EmptyPromptPolicy, ImageId, LABEL_BOX_BOTTOM_RIGHT,
    LABEL_BOX_TOP_LEFT, LABEL_NEGATIVE, LABEL_PADDING, LABEL_POSITIVE, MODEL_INPUT_SIZE, Point,
    PromptArrays, PromptMapper, PromptOptions, SegmentationPrompt,
};
pub use session::{
    DECODER_EMBEDDINGS, DECODER_HAS_MASK_INPUT, DECODER_MASK_INPUT, DECODER_MASKS,
    DECODER_ORIG_SIZE, DECODER_POINT_COORDS, DECODER_POINT_LABELS, ENCODER_INPUT, EncoderInput,
    SegmentOptions, SegmentResult, SegmentSession, SessionState, prepare_encoder_input,
};
