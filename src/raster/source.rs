//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入类型”和“流水线中间结果”解耦：
//! - `ImageSource` 表示外部来源语义
//! - `RawImageData` 表示已读取但未解码的字节

use std::path::PathBuf;

/// 图片输入来源。
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// 本地文件路径。
    FilePath(PathBuf),
    /// Base64（支持 Data URL 与纯 Base64 字符串），浏览器上传控件的常见形态。
    Base64(String),
    /// 已在内存中的编码字节（PNG/JPEG 等）。
    Bytes(Vec<u8>),
}

impl ImageSource {
    pub fn kind(&self) -> ImageSourceKind {
        match self {
            Self::FilePath(_) => ImageSourceKind::File,
            Self::Base64(_) => ImageSourceKind::Base64,
            Self::Bytes(_) => ImageSourceKind::Bytes,
        }
    }
}

/// 来源类别，用于日志与错误信息。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSourceKind {
    File,
    Base64,
    Bytes,
}

impl ImageSourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Base64 => "base64",
            Self::Bytes => "bytes",
        }
    }
}

/// 读取阶段输出：原始字节与来源标识。
pub(crate) struct RawImageData {
    pub(crate) bytes: Vec<u8>,
    pub(crate) kind: ImageSourceKind,
}
