// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/json.rs - JSON Lines 输出
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

use serde_json::{Value, json};
use thiserror::Error;
use tracing::error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::FrameSize,
  model::{DetectResult, LabelSet},
  output::Render,
};

#[derive(Error, Debug)]
pub enum JsonOutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("输出锁已损坏")]
  Poisoned,
}

enum Sink {
  Stdout,
  File(BufWriter<File>),
}

/// 每帧一行 JSON，`json:-` 写到标准输出，`json:///path` 写到文件
pub struct JsonOutput {
  sink: Mutex<Sink>,
  labels: LabelSet,
}

impl FromUrlWithScheme for JsonOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonOutput {
  type Error = JsonOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        uri.scheme()
      );
      return Err(JsonOutputError::SchemeMismatch(uri.scheme().to_string()));
    }

    let sink = match uri.path() {
      "" | "-" => Sink::Stdout,
      path => Sink::File(BufWriter::new(File::create(path)?)),
    };

    Ok(JsonOutput {
      sink: Mutex::new(sink),
      labels: LabelSet::default(),
    })
  }
}

impl JsonOutput {
  pub fn with_labels(mut self, labels: LabelSet) -> Self {
    self.labels = labels;
    self
  }

  pub fn to_value<Frame: FrameSize>(&self, frame: &Frame, result: &DetectResult) -> Value {
    let detections: Vec<Value> = result
      .iter()
      .map(|item| {
        json!({
          "class_id": item.class_id,
          "label": self.labels.name_of(item.class_id),
          "score": item.score,
          "objectness": item.objectness,
          "bbox": [item.bbox.xmin, item.bbox.ymin, item.bbox.xmax, item.bbox.ymax],
        })
      })
      .collect();

    json!({
      "width": frame.width(),
      "height": frame.height(),
      "detections": detections,
    })
  }
}

impl<Frame: FrameSize> Render<Frame> for JsonOutput {
  type Error = JsonOutputError;

  fn render_result(&self, frame: &Frame, result: &DetectResult) -> Result<(), Self::Error> {
    let value = self.to_value(frame, result);
    let mut sink = self.sink.lock().map_err(|_| JsonOutputError::Poisoned)?;
    match &mut *sink {
      Sink::Stdout => {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        serde_json::to_writer(&mut lock, &value)?;
        writeln!(lock)?;
      }
      Sink::File(writer) => {
        serde_json::to_writer(&mut *writer, &value)?;
        writeln!(writer)?;
        writer.flush()?;
      }
    }
    Ok(())
  }
}
