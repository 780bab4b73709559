//! 像素取值策略：均值/方差归一化、线性缩放或单位缩放，三者互斥。

/// 原始字节到张量数值的映射。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValuePolicy {
    /// `(raw / 255 - mean[c]) / std[c]`
    Normalize { mean: [f32; 3], std: [f32; 3] },
    /// `raw * factor`
    Rescale { factor: f32 },
    /// `raw / 255`
    UnitScale,
}

impl Default for ValuePolicy {
    fn default() -> Self {
        Self::UnitScale
    }
}

impl ValuePolicy {
    /// `channel` 为源通道下标（0=R, 1=G, 2=B）。
    #[inline]
    pub fn apply(&self, raw: u8, channel: usize) -> f32 {
        match self {
            Self::Normalize { mean, std } => (raw as f32 / 255.0 - mean[channel]) / std[channel],
            Self::Rescale { factor } => raw as f32 * factor,
            Self::UnitScale => raw as f32 / 255.0,
        }
    }

    /// 该策略下单个通道可能产生的取值区间（不含填充的 0.0）。
    pub fn channel_range(&self, channel: usize) -> (f32, f32) {
        let lo = self.apply(0, channel);
        let hi = self.apply(255, channel);
        if lo <= hi { (lo, hi) } else { (hi, lo) }
    }
}
