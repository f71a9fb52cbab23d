// 该文件是 Shanan （山南西风） 项目的一部分。
// src/postprocess/filter.rs - 置信度过滤
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

use crate::model::{Candidate, DetectItem};

/// 丢弃 objectness 不高于阈值的候选框，并为剩余的框确定类别和得分
///
/// 类别取类别概率的 argmax（并列时取较小的索引），
/// 得分为 `objectness * 最大类别概率`。
pub fn filter_boxes(candidates: &[Candidate], obj_threshold: f32) -> Vec<DetectItem> {
  candidates
    .iter()
    .filter(|c| c.objectness > obj_threshold)
    .filter_map(|c| {
      let (class_id, class_score) = argmax(&c.class_scores)?;
      Some(DetectItem {
        class_id: class_id as u32,
        score: c.objectness * class_score,
        objectness: c.objectness,
        bbox: c.bbox,
      })
    })
    .collect()
}

fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
  let mut best: Option<(usize, f32)> = None;
  for (idx, &score) in scores.iter().enumerate() {
    match best {
      Some((_, max)) if score <= max => {}
      _ => best = Some((idx, score)),
    }
  }
  best
}
