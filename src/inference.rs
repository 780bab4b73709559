//! # 推理引擎契约
//!
//! 核心只依赖“按名字喂张量、按名字取张量”这一层约定，
//! 具体用哪种推理后端由调用方决定。

use std::collections::HashMap;
use std::future::Future;

use crate::PipelineError;
use crate::error::EngineError;
use crate::tensor::Tensor;

/// 模型输入/输出：名字 → 张量。
pub type Feeds = HashMap<String, Tensor>;

/// 不透明的推理引擎。
///
/// 实现方可以直接写 `async fn run(...)`，返回的 future 需要是 `Send`。
pub trait InferenceEngine {
    /// 执行一次推理。
    fn run(&self, feeds: Feeds) -> impl Future<Output = Result<Feeds, EngineError>> + Send;

    /// 模型声明的输出名，按声明顺序排列。
    fn output_names(&self) -> Vec<String>;
}

/// 按名字取出输出张量。
pub(crate) fn take_output(outputs: &mut Feeds, name: &str) -> Result<Tensor, PipelineError> {
    outputs
        .remove(name)
        .ok_or_else(|| PipelineError::MissingOutput(name.to_string()))
}

/// 取出模型声明的第一个输出。
pub(crate) fn take_first_output<E: InferenceEngine>(
    engine: &E,
    outputs: &mut Feeds,
) -> Result<Tensor, PipelineError> {
    let names = engine.output_names();
    let first = names
        .first()
        .ok_or_else(|| PipelineError::MissingOutput("<模型未声明任何输出>".to_string()))?;
    take_output(outputs, first)
}

/// 执行推理并把引擎错误原样包装。
pub(crate) async fn run_engine<E: InferenceEngine>(
    engine: &E,
    feeds: Feeds,
    stage: &str,
) -> Result<Feeds, PipelineError> {
    match engine.run(feeds).await {
        Ok(outputs) => Ok(outputs),
        Err(err) => {
            log::error!("❌ {} 推理失败：{}", stage, err);
            Err(PipelineError::InferenceEngine(err))
        }
    }
}
