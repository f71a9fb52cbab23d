// 该文件是 Shanan （山南西风） 项目的一部分。
// src/postprocess.rs - 后处理：解码、过滤、坐标映射、分组与非极大值抑制
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

mod decode;
pub use self::decode::{DecodeError, decode_output, sigmoid};

mod filter;
pub use self::filter::filter_boxes;

mod mapper;
pub use self::mapper::{Letterbox, map_to_image};

mod group;
pub use self::group::{ClassGroups, group_by_class};

mod nms;
pub use self::nms::{nms, nms_groups, nms_per_class};
