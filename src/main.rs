// 该文件是 Shanan （山南西风） 项目的一部分。
// src/main.rs - 回放原始输出并执行后处理
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use shanan_anchor::{
  DetectionPipeline, FromUrl, PipelineConfigBuilder,
  detector::YoloDetector,
  frame::ImageSize,
  model::ReplayModel,
  output::OutputWrapper,
  task::{OneShotTask, Task},
};

/// Shanan 锚框检测后处理回放工具
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 原始输出文件，例如 replay:///path/to/outputs.json
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 流水线配置，例如 yolov3:///?obj=0.6&nms=0.5
  #[arg(long, value_name = "CONFIG", default_value = "yolov3:///")]
  pub config: Url,
  /// 原图宽度
  #[arg(long, value_name = "WIDTH")]
  pub image_width: u32,
  /// 原图高度
  #[arg(long, value_name = "HEIGHT")]
  pub image_height: u32,
  /// 预处理使用了保持宽高比的填充缩放
  #[arg(long, default_value_t = false)]
  pub letterbox: bool,
  /// 输出路径，例如 record:///tmp/result.txt 或 json:-
  #[arg(long, value_name = "OUTPUT", default_value = "json:-")]
  pub output: Url,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("原始输出: {}", args.model);
  info!("流水线配置: {}", args.config);
  info!("原图尺寸: {}x{}", args.image_width, args.image_height);
  info!("输出路径: {}", args.output);

  let config = PipelineConfigBuilder::from_url(&args.config)?.build()?;
  let labels = config.labels.clone();
  let pipeline = DetectionPipeline::new(config)?;
  let model = ReplayModel::<ImageSize>::from_url(&args.model)?;
  let detector = YoloDetector::new(model, pipeline).with_letterbox(args.letterbox);
  let output = OutputWrapper::from_url(&args.output)?.with_labels(labels);

  let frames = std::iter::once(ImageSize::new(args.image_width, args.image_height));
  OneShotTask.run_task(frames, &detector, &output)?;

  Ok(())
}
