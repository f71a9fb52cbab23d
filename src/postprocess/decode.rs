// 该文件是 Shanan （山南西风） 项目的一部分。
// src/postprocess/decode.rs - 网格/先验框解码
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
use tracing::{debug, error};

use crate::model::{Anchor, BBox, Candidate, RawOutput, SLOT_FIXED_FIELDS};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
  #[error("先验框数量不匹配: 输出为 {expected}, 提供了 {actual}")]
  AnchorCount { expected: usize, actual: usize },
  #[error("通道数不足: 至少需要 {minimum}, 实际 {actual}")]
  ChannelCount { minimum: usize, actual: usize },
}

/// 将单个尺度的原始输出解码为候选框（网络输入像素坐标）
///
/// 每个网格单元的每个先验框都产生一个候选框，这里不做任何阈值剪枝。
/// 先验框数量必须与输出的先验框维度一致，通道数不得少于 5。
pub fn decode_output(
  output: &RawOutput,
  anchors: &[Anchor],
  input_width: f32,
  input_height: f32,
) -> Result<Vec<Candidate>, DecodeError> {
  let grid_h = output.grid_h();
  let grid_w = output.grid_w();
  let num_anchors = output.num_anchors();
  if anchors.len() != num_anchors {
    error!("先验框数量不匹配: 输出 {}, 提供 {}", num_anchors, anchors.len());
    return Err(DecodeError::AnchorCount {
      expected: num_anchors,
      actual: anchors.len(),
    });
  }
  if output.channels() < SLOT_FIXED_FIELDS {
    error!("通道数不足: {}", output.channels());
    return Err(DecodeError::ChannelCount {
      minimum: SLOT_FIXED_FIELDS,
      actual: output.channels(),
    });
  }
  let mut candidates = Vec::with_capacity(grid_h * grid_w * num_anchors);

  for row in 0..grid_h {
    for col in 0..grid_w {
      for (a, anchor) in anchors.iter().enumerate() {
        let slot = output.slot(row, col, a);
        let (tx, ty, tw, th, obj) = (slot[0], slot[1], slot[2], slot[3], slot[4]);

        let cx = (col as f32 + sigmoid(tx)) / grid_w as f32;
        let cy = (row as f32 + sigmoid(ty)) / grid_h as f32;
        let bw = anchor.width * tw.exp() / input_width;
        let bh = anchor.height * th.exp() / input_height;

        let bbox = BBox::new(
          (cx - bw / 2.0) * input_width,
          (cy - bh / 2.0) * input_height,
          (cx + bw / 2.0) * input_width,
          (cy + bh / 2.0) * input_height,
        );

        let class_scores = slot[SLOT_FIXED_FIELDS..]
          .iter()
          .map(|&logit| sigmoid(logit))
          .collect();

        candidates.push(Candidate {
          bbox,
          objectness: sigmoid(obj),
          class_scores,
        });
      }
    }
  }

  debug!(
    "尺度 {}x{}x{}: 解码得到 {} 个候选框",
    grid_h,
    grid_w,
    num_anchors,
    candidates.len()
  );
  Ok(candidates)
}

pub fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}
