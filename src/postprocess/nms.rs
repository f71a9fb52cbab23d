// 该文件是 Shanan （山南西风） 项目的一部分。
// src/postprocess/nms.rs - 非极大值抑制
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

use tracing::debug;

use crate::{
  model::DetectItem,
  postprocess::group::{ClassGroups, group_by_class},
};

/// 单个类别内的贪心 NMS
///
/// 先按得分稳定降序排序，再依次保留最高分的框，
/// 并移除与其 IoU 不小于 `nms_score` 的其余框。
/// 面积为 0 的退化框与保留框接触或落在其内部时同样被移除。
/// `nms_score` 必须大于 0，否则互不相交的框也会被抑制。
pub fn nms(items: &[DetectItem], nms_score: f32) -> Vec<DetectItem> {
  let mut remaining = items.to_vec();
  // sort_by 是稳定排序，同分时保持原顺序
  remaining.sort_by(|a, b| b.score.total_cmp(&a.score));

  let mut kept = Vec::new();
  while !remaining.is_empty() {
    let best = remaining.remove(0);
    remaining.retain(|item| {
      if item.bbox.is_degenerate() && best.bbox.touches(&item.bbox) {
        return false;
      }
      best.bbox.iou(&item.bbox) < nms_score
    });
    kept.push(best);
  }

  kept
}

/// 对每个类别分别做 NMS，结果按类别编号升序拼接
pub fn nms_groups(groups: &ClassGroups, nms_score: f32) -> Vec<DetectItem> {
  let mut result = Vec::new();
  for (class_id, items) in groups {
    let kept = nms(items, nms_score);
    debug!(
      "类别 {}: NMS 前 {} 个, NMS 后 {} 个",
      class_id,
      items.len(),
      kept.len()
    );
    result.extend(kept);
  }
  result
}

pub fn nms_per_class(items: &[DetectItem], nms_score: f32) -> Vec<DetectItem> {
  nms_groups(&group_by_class(items), nms_score)
}
