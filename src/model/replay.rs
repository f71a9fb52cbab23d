// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/replay.rs - 回放模型：从 JSON 文件读取预先计算的原始输出
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

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{Model, RawOutput, RawOutputError},
};

#[derive(Error, Debug)]
pub enum ReplayModelError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("输出格式错误: {0}")]
  Malformed(String),
  #[error("原始输出错误: {0}")]
  RawOutput(#[from] RawOutputError),
}

/// 回放模型，每次推理都返回同一组原始输出
///
/// 文件内容为 JSON 数组，每个检测尺度一项，
/// 每项嵌套为 `[grid_h][grid_w][num_anchors][5 + num_classes]`。
pub struct ReplayModel<Frame> {
  outputs: Vec<RawOutput>,
  _phantom: std::marker::PhantomData<Frame>,
}

impl<Frame> FromUrlWithScheme for ReplayModel<Frame> {
  const SCHEME: &'static str = "replay";
}

impl<Frame> FromUrl for ReplayModel<Frame> {
  type Error = ReplayModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ReplayModelError::SchemeMismatch(url.scheme().to_string()));
    }

    info!("加载回放文件: {}", url.path());
    let text = std::fs::read_to_string(url.path())?;
    Self::from_json_str(&text)
  }
}

impl<Frame> ReplayModel<Frame> {
  pub fn new(outputs: Vec<RawOutput>) -> Self {
    Self {
      outputs,
      _phantom: std::marker::PhantomData,
    }
  }

  pub fn from_json_str(text: &str) -> Result<Self, ReplayModelError> {
    let value: Value = serde_json::from_str(text)?;
    let scales = value
      .as_array()
      .ok_or_else(|| ReplayModelError::Malformed("顶层必须是数组".to_string()))?;

    let outputs = scales
      .iter()
      .enumerate()
      .map(|(idx, scale)| parse_scale(idx, scale))
      .collect::<Result<Vec<_>, _>>()?;

    debug!("回放文件包含 {} 个检测尺度", outputs.len());
    Ok(Self::new(outputs))
  }

  pub fn outputs(&self) -> &[RawOutput] {
    &self.outputs
  }
}

impl<Frame> Model for ReplayModel<Frame> {
  type Input = Frame;
  type Error = ReplayModelError;

  fn infer(&self, _input: &Self::Input) -> Result<Vec<RawOutput>, Self::Error> {
    Ok(self.outputs.clone())
  }
}

/// 逐层展开嵌套数组，同时检查每层长度一致
fn parse_scale(idx: usize, value: &Value) -> Result<RawOutput, ReplayModelError> {
  let mut shape = [0usize; 4];
  let mut data = Vec::new();
  flatten(idx, value, 0, &mut shape, &mut data)?;
  Ok(RawOutput::new(shape, data)?)
}

fn flatten(
  idx: usize,
  value: &Value,
  depth: usize,
  shape: &mut [usize; 4],
  data: &mut Vec<f32>,
) -> Result<(), ReplayModelError> {
  if depth == 4 {
    return match value.as_f64() {
      Some(v) => {
        data.push(v as f32);
        Ok(())
      }
      None => Err(ReplayModelError::Malformed(format!(
        "尺度 {}: 叶子节点不是数值: {}",
        idx, value
      ))),
    };
  }

  let items = value.as_array().ok_or_else(|| {
    ReplayModelError::Malformed(format!("尺度 {}: 第 {} 层不是数组", idx, depth))
  })?;

  if shape[depth] == 0 {
    shape[depth] = items.len();
  } else if shape[depth] != items.len() {
    return Err(ReplayModelError::Malformed(format!(
      "尺度 {}: 第 {} 层长度不一致, 期望 {}, 实际 {}",
      idx,
      depth,
      shape[depth],
      items.len()
    )));
  }

  for item in items {
    flatten(idx, item, depth + 1, shape, data)?;
  }
  Ok(())
}
