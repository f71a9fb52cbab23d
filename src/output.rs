// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output.rs - 输出定义
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
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::FrameSize,
  model::{DetectResult, LabelSet},
};

/// 渲染协作者：接收最终检测结果和原始帧
pub trait Render<Frame>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &DetectResult) -> Result<(), Self::Error>;
}

mod record;
pub use self::record::{RecordOutput, RecordOutputError};

mod json;
pub use self::json::{JsonOutput, JsonOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("记录输出错误: {0}")]
  RecordOutputError(#[from] RecordOutputError),
  #[error("JSON 输出错误: {0}")]
  JsonOutputError(#[from] JsonOutputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper {
  RecordOutput(RecordOutput),
  JsonOutput(JsonOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      RecordOutput::SCHEME => Ok(OutputWrapper::RecordOutput(RecordOutput::from_url(url)?)),
      JsonOutput::SCHEME => Ok(OutputWrapper::JsonOutput(JsonOutput::from_url(url)?)),
      scheme => Err(OutputError::SchemeMismatch(scheme.to_string())),
    }
  }
}

impl OutputWrapper {
  pub fn with_labels(self, labels: LabelSet) -> Self {
    match self {
      OutputWrapper::RecordOutput(output) => {
        OutputWrapper::RecordOutput(output.with_labels(labels))
      }
      OutputWrapper::JsonOutput(output) => OutputWrapper::JsonOutput(output.with_labels(labels)),
    }
  }
}

impl<Frame: FrameSize> Render<Frame> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, frame: &Frame, result: &DetectResult) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::RecordOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      OutputWrapper::JsonOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
    }
  }
}
