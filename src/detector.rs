// 该文件是 Shanan （山南西风） 项目的一部分。
// src/detector.rs - 目标检测器：推理 + 后处理
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

use thiserror::Error;
use tracing::debug;

use crate::{
  frame::FrameSize,
  model::{DetectResult, Model},
  pipeline::{DetectionPipeline, PipelineError},
  postprocess::Letterbox,
};

#[derive(Error, Debug)]
pub enum DetectorError<E> {
  #[error("推理错误: {0}")]
  Model(E),
  #[error("后处理错误: {0}")]
  Pipeline(#[from] PipelineError),
}

/// YOLO 目标检测器，把推理协作者和后处理流水线串起来
pub struct YoloDetector<M> {
  model: M,
  pipeline: DetectionPipeline,
  letterbox: bool,
}

impl<M> YoloDetector<M> {
  pub fn new(model: M, pipeline: DetectionPipeline) -> Self {
    Self {
      model,
      pipeline,
      letterbox: false,
    }
  }

  /// 上游预处理使用保持宽高比的填充缩放时打开
  pub fn with_letterbox(mut self, letterbox: bool) -> Self {
    self.letterbox = letterbox;
    self
  }

  pub fn pipeline(&self) -> &DetectionPipeline {
    &self.pipeline
  }
}

impl<F: FrameSize, M: Model<Input = F>> YoloDetector<M> {
  pub fn detect(&self, frame: &F) -> Result<DetectResult, DetectorError<M::Error>> {
    let outputs = self.model.infer(frame).map_err(DetectorError::Model)?;
    debug!("模型返回 {} 个检测尺度", outputs.len());

    let letterbox = if self.letterbox {
      let config = self.pipeline.config();
      Letterbox::fit(
        config.input_width as f32,
        config.input_height as f32,
        frame.width() as f32,
        frame.height() as f32,
      )
    } else {
      Letterbox::none()
    };

    let result = self
      .pipeline
      .run_letterboxed(&outputs, frame.width(), frame.height(), letterbox)?;
    Ok(result)
  }
}
