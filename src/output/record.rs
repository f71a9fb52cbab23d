// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/record.rs - 文本记录输出
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

use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Mutex;

use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::FrameSize,
  model::{DetectResult, LabelSet},
  output::Render,
};

#[derive(Error, Debug)]
pub enum RecordOutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("记录文件锁已损坏")]
  Poisoned,
}

struct RecordState {
  writer: BufWriter<File>,
  frame_id: u64,
}

/// 每个检测一行: `帧号, 类别, 得分, xmin, ymin, xmax, ymax`
///
/// `record:///path/to/file.txt`，加上 `?label=id` 时用类别编号代替名称。
pub struct RecordOutput {
  state: Mutex<RecordState>,
  label_with_name: bool,
  labels: LabelSet,
}

impl FromUrlWithScheme for RecordOutput {
  const SCHEME: &'static str = "record";
}

impl FromUrl for RecordOutput {
  type Error = RecordOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        uri.scheme()
      );
      return Err(RecordOutputError::SchemeMismatch(uri.scheme().to_string()));
    }

    let label_with_name = !uri.query_pairs().any(|(k, v)| k == "label" && v == "id");

    debug!("创建记录文件: {}", uri.path());
    let file = File::create(uri.path())?;

    Ok(RecordOutput {
      state: Mutex::new(RecordState {
        writer: BufWriter::new(file),
        frame_id: 0,
      }),
      label_with_name,
      labels: LabelSet::default(),
    })
  }
}

impl RecordOutput {
  pub fn with_labels(mut self, labels: LabelSet) -> Self {
    self.labels = labels;
    self
  }
}

impl<Frame: FrameSize> Render<Frame> for RecordOutput {
  type Error = RecordOutputError;

  fn render_result(&self, _frame: &Frame, result: &DetectResult) -> Result<(), Self::Error> {
    let mut state = self.state.lock().map_err(|_| RecordOutputError::Poisoned)?;
    state.frame_id += 1;
    let frame_id = state.frame_id;

    for item in result.iter() {
      let name = if self.label_with_name {
        self.labels.name_of(item.class_id)
      } else {
        format!("{}", item.class_id)
      };
      writeln!(
        state.writer,
        "{}, {}, {:.4}, {:.0}, {:.0}, {:.0}, {:.0}",
        frame_id, name, item.score, item.bbox.xmin, item.bbox.ymin, item.bbox.xmax, item.bbox.ymax
      )?;
    }
    state.writer.flush()?;
    Ok(())
  }
}
