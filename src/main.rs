//! # 视觉预处理流水线：命令行入口
//!
//! 用法：`vision-pipeline <preprocessor_config.json> <image>`
//!
//! 加载图片、按描述文件执行预处理，输出张量形状、缩放后尺寸与取值范围。

use std::path::PathBuf;
use std::process::ExitCode;

use vision_pipeline::{ImageLoader, ImageSource, PipelineError, PreprocessConfig, Preprocessor};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [config_path, image_path] = args.as_slice() else {
        eprintln!("用法：vision-pipeline <preprocessor_config.json> <image>");
        return ExitCode::from(2);
    };

    match run(PathBuf::from(config_path), PathBuf::from(image_path)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("❌ 预处理失败 [{}]：{}", err.code(), err);
            ExitCode::FAILURE
        }
    }
}

async fn run(config_path: PathBuf, image_path: PathBuf) -> Result<(), PipelineError> {
    let config = PreprocessConfig::from_path(&config_path)?;

    let image = ImageLoader::default()
        .load(ImageSource::FilePath(image_path))
        .await?;
    let preprocessor = Preprocessor::new(config);
    let output = preprocessor.process(&image)?;

    let (min, max) = output
        .tensor
        .view()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    println!("shape: {:?}", output.tensor.shape());
    println!("resized: {}x{}", output.new_width, output.new_height);
    println!("range: [{:.4}, {:.4}]", min, max);
    for channel in 0..3 {
        let (lo, hi) = preprocessor.config().values().channel_range(channel);
        println!("channel {} bound: [{:.4}, {:.4}]", channel, lo, hi);
    }
    Ok(())
}
