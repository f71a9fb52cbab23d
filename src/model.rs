// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model.rs - 模型
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

/// 推理协作者：给定预处理后的输入，每个检测尺度返回一个原始输出
pub trait Model {
  type Input;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Vec<RawOutput>, Self::Error>;
}

/// 先验框尺寸（网络输入像素）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
  pub width: f32,
  pub height: f32,
}

impl Anchor {
  pub const fn new(width: f32, height: f32) -> Self {
    Self { width, height }
  }
}

/// 轴对齐边界框，角点形式
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BBox {
  pub xmin: f32,
  pub ymin: f32,
  pub xmax: f32,
  pub ymax: f32,
}

impl BBox {
  pub const fn new(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
    Self {
      xmin,
      ymin,
      xmax,
      ymax,
    }
  }

  pub fn width(&self) -> f32 {
    self.xmax - self.xmin
  }

  pub fn height(&self) -> f32 {
    self.ymax - self.ymin
  }

  /// 退化框（宽或高不为正）面积为 0
  pub fn area(&self) -> f32 {
    if self.is_degenerate() {
      0.0
    } else {
      self.width() * self.height()
    }
  }

  pub fn is_degenerate(&self) -> bool {
    self.xmax <= self.xmin || self.ymax <= self.ymin
  }

  /// 闭区间相交检测，接触边界也算；对角点颠倒的退化框同样适用
  pub fn touches(&self, other: &BBox) -> bool {
    let (ax0, ax1) = (self.xmin.min(self.xmax), self.xmin.max(self.xmax));
    let (ay0, ay1) = (self.ymin.min(self.ymax), self.ymin.max(self.ymax));
    let (bx0, bx1) = (other.xmin.min(other.xmax), other.xmin.max(other.xmax));
    let (by0, by1) = (other.ymin.min(other.ymax), other.ymin.max(other.ymax));
    ax0 <= bx1 && bx0 <= ax1 && ay0 <= by1 && by0 <= ay1
  }

  /// 计算两个边界框的 IoU
  pub fn iou(&self, other: &BBox) -> f32 {
    let area_a = self.area();
    let area_b = other.area();
    if area_a <= 0.0 || area_b <= 0.0 {
      return 0.0;
    }

    let x1 = self.xmin.max(other.xmin);
    let y1 = self.ymin.max(other.ymin);
    let x2 = self.xmax.min(other.xmax);
    let y2 = self.ymax.min(other.ymax);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = area_a + area_b - intersection;

    if union > 0.0 {
      intersection / union
    } else {
      0.0
    }
  }
}

/// 解码后的候选框，尚未过滤
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
  pub bbox: BBox,
  pub objectness: f32,
  /// 按类别索引的概率
  pub class_scores: Box<[f32]>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectItem {
  pub class_id: u32,
  pub score: f32,
  pub objectness: f32,
  pub bbox: BBox,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, DetectItem> {
    self.items.iter()
  }
}

impl From<Vec<DetectItem>> for DetectResult {
  fn from(items: Vec<DetectItem>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

mod label;
pub use self::label::{COCO_CLASSES, LabelError, LabelSet};

mod raw;
pub use self::raw::{RawOutput, RawOutputError, SLOT_FIXED_FIELDS};

mod replay;
pub use self::replay::{ReplayModel, ReplayModelError};
