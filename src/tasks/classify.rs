//! # 图像分类
//!
//! ## 实现思路
//!
//! 预处理（默认正方形 224 + ImageNet 归一化）→ 推理 → 对第一个输出做 softmax
//! → 按置信度降序取前 `top_k` 个。缺失的标签以 `class_{index}` 代替。

use std::time::{Duration, Instant};

use crate::PipelineError;
use crate::inference::{self, Feeds, InferenceEngine};
use crate::preprocess::{PreprocessConfig, Preprocessor};
use crate::raster::Raster;

pub const CLASSIFIER_INPUT: &str = "data";
pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub index: usize,
    pub label: String,
    pub confidence: f32,
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub predictions: Vec<Prediction>,
    /// 仅推理耗时。
    pub elapsed: Duration,
}

impl Classification {
    pub fn best(&self) -> Option<&Prediction> {
        self.predictions.first()
    }
}

pub struct Classifier<E> {
    engine: E,
    preprocessor: Preprocessor,
    labels: Vec<String>,
    input_name: String,
    top_k: usize,
}

impl<E: InferenceEngine> Classifier<E> {
    pub fn new(engine: E, labels: Vec<String>) -> Self {
        Self {
            engine,
            preprocessor: Preprocessor::new(PreprocessConfig::classifier_default()),
            labels,
            input_name: CLASSIFIER_INPUT.to_string(),
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_config(mut self, config: PreprocessConfig) -> Self {
        self.preprocessor = Preprocessor::new(config);
        self
    }

    pub fn with_input_name(mut self, name: impl Into<String>) -> Self {
        self.input_name = name.into();
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub async fn classify(&self, image: &Raster) -> Result<Classification, PipelineError> {
        let prepared = self.preprocessor.process(image)?;

        let mut feeds = Feeds::new();
        feeds.insert(self.input_name.clone(), prepared.tensor);

        let start = Instant::now();
        let mut outputs = inference::run_engine(&self.engine, feeds, "分类器").await?;
        let elapsed = start.elapsed();
        let logits = inference::take_first_output(&self.engine, &mut outputs)?;

        let probabilities = softmax(logits.data())?;
        let predictions = rank(&probabilities, &self.labels, self.top_k);
        if let Some(best) = predictions.first() {
            log::info!(
                "✅ 分类完成：{}（{:.3}），耗时 {}ms",
                best.label,
                best.confidence,
                elapsed.as_millis()
            );
        }

        Ok(Classification {
            predictions,
            elapsed,
        })
    }
}

/// 数值稳定的 softmax。
pub fn softmax(logits: &[f32]) -> Result<Vec<f32>, PipelineError> {
    if logits.is_empty() {
        return Err(PipelineError::ShapeMismatch("分类器输出为空".to_string()));
    }

    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    Ok(exps.into_iter().map(|v| v / sum).collect())
}

/// 按置信度降序取前 `top_k` 个。
pub fn rank(probabilities: &[f32], labels: &[String], top_k: usize) -> Vec<Prediction> {
    let mut indexed: Vec<(usize, f32)> = probabilities.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    indexed
        .into_iter()
        .take(top_k)
        .map(|(index, confidence)| Prediction {
            index,
            label: labels
                .get(index)
                .cloned()
                .unwrap_or_else(|| format!("class_{}", index)),
            confidence,
        })
        .collect()
}
