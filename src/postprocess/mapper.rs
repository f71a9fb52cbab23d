// 该文件是 Shanan （山南西风） 项目的一部分。
// src/postprocess/mapper.rs - 坐标映射
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

use crate::model::{BBox, DetectItem};

/// 预处理时的填充偏移和缩放，均为相对网络输入的归一化值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
  pub x_offset: f32,
  pub y_offset: f32,
  pub x_scale: f32,
  pub y_scale: f32,
}

impl Default for Letterbox {
  fn default() -> Self {
    Self::none()
  }
}

impl Letterbox {
  /// 直接缩放，无填充
  pub const fn none() -> Self {
    Self {
      x_offset: 0.0,
      y_offset: 0.0,
      x_scale: 1.0,
      y_scale: 1.0,
    }
  }

  /// 保持宽高比缩放进网络输入并居中填充时对应的偏移和缩放
  pub fn fit(input_width: f32, input_height: f32, image_width: f32, image_height: f32) -> Self {
    let ratio = (input_width / image_width).min(input_height / image_height);
    let new_w = image_width * ratio;
    let new_h = image_height * ratio;

    Self {
      x_offset: (input_width - new_w) / 2.0 / input_width,
      y_offset: (input_height - new_h) / 2.0 / input_height,
      x_scale: new_w / input_width,
      y_scale: new_h / input_height,
    }
  }
}

/// 将网络输入像素坐标映射到原图像素坐标，结果取整，不做裁剪
pub fn map_to_image(
  items: &[DetectItem],
  input_width: f32,
  input_height: f32,
  image_width: f32,
  image_height: f32,
  letterbox: Letterbox,
) -> Vec<DetectItem> {
  let map_x = |x: f32| {
    ((x / input_width - letterbox.x_offset) / letterbox.x_scale * image_width).round()
  };
  let map_y = |y: f32| {
    ((y / input_height - letterbox.y_offset) / letterbox.y_scale * image_height).round()
  };

  items
    .iter()
    .map(|item| DetectItem {
      bbox: BBox::new(
        map_x(item.bbox.xmin),
        map_y(item.bbox.ymin),
        map_x(item.bbox.xmax),
        map_y(item.bbox.ymax),
      ),
      ..*item
    })
    .collect()
}
