// 该文件是 Shanan （山南西风） 项目的一部分。
// src/postprocess/group.rs - 按类别分组
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

use std::collections::BTreeMap;

use crate::model::DetectItem;

/// 类别编号到该类检测框的映射，按类别编号升序遍历
pub type ClassGroups = BTreeMap<u32, Vec<DetectItem>>;

/// 组内保持输入顺序
pub fn group_by_class(items: &[DetectItem]) -> ClassGroups {
  let mut groups = ClassGroups::new();
  for item in items {
    groups.entry(item.class_id).or_default().push(*item);
  }
  groups
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::BBox;

  fn item(class_id: u32, score: f32) -> DetectItem {
    DetectItem {
      class_id,
      score,
      objectness: 1.0,
      bbox: BBox::new(0.0, 0.0, 1.0, 1.0),
    }
  }

  #[test]
  fn preserves_insertion_order() {
    let items = [item(2, 0.1), item(0, 0.5), item(2, 0.9), item(0, 0.3)];
    let groups = group_by_class(&items);

    assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec![0, 2]);
    let scores: Vec<f32> = groups[&2].iter().map(|i| i.score).collect();
    assert_eq!(scores, vec![0.1, 0.9]);
    let scores: Vec<f32> = groups[&0].iter().map(|i| i.score).collect();
    assert_eq!(scores, vec![0.5, 0.3]);
  }
}
