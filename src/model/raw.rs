// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/raw.rs - 单尺度原始输出张量
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

/// 每个槽位的固定字段：tx, ty, tw, th, objectness
pub const SLOT_FIXED_FIELDS: usize = 5;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RawOutputError {
  #[error("数据长度不匹配: 形状 {shape:?} 期望长度 {expected}, 实际长度 {actual}")]
  DataLength {
    shape: [usize; 4],
    expected: usize,
    actual: usize,
  },
}

/// 一个检测尺度的原始输出，形状 `[grid_h, grid_w, num_anchors, 5 + num_classes]`，行优先存储
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutput {
  shape: [usize; 4],
  data: Box<[f32]>,
}

impl RawOutput {
  pub fn new(shape: [usize; 4], data: Vec<f32>) -> Result<Self, RawOutputError> {
    let expected = shape.iter().product::<usize>();
    if data.len() != expected {
      return Err(RawOutputError::DataLength {
        shape,
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      shape,
      data: data.into_boxed_slice(),
    })
  }

  pub fn shape(&self) -> [usize; 4] {
    self.shape
  }

  pub fn grid_h(&self) -> usize {
    self.shape[0]
  }

  pub fn grid_w(&self) -> usize {
    self.shape[1]
  }

  pub fn num_anchors(&self) -> usize {
    self.shape[2]
  }

  /// 每个槽位的通道数，即 `5 + num_classes`
  pub fn channels(&self) -> usize {
    self.shape[3]
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  /// 取出 `(row, col, anchor)` 槽位的全部通道
  pub fn slot(&self, row: usize, col: usize, anchor: usize) -> &[f32] {
    let [_, grid_w, num_anchors, channels] = self.shape;
    let base = ((row * grid_w + col) * num_anchors + anchor) * channels;
    &self.data[base..base + channels]
  }
}
