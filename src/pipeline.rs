// 该文件是 Shanan （山南西风） 项目的一部分。
// src/pipeline.rs - 检测后处理流水线
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
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{Anchor, DetectResult, LabelError, LabelSet, RawOutput, SLOT_FIXED_FIELDS},
  postprocess::{
    DecodeError, Letterbox, decode_output, filter_boxes, group_by_class, map_to_image, nms_groups,
  },
};

const YOLOV3_INPUT_W: u32 = 416;
const YOLOV3_INPUT_H: u32 = 416;
const YOLOV3_CLASS_NUM: usize = 80;
const YOLOV3_OBJECT_THRESH: f32 = 0.6;
const YOLOV3_NMS_SCORE: f32 = 0.5;
// 与输出顺序一致：13x13, 26x26, 52x52
const YOLOV3_ANCHORS: [[(f32, f32); 3]; 3] = [
  [(116.0, 90.0), (156.0, 198.0), (373.0, 326.0)],
  [(30.0, 61.0), (62.0, 45.0), (59.0, 119.0)],
  [(10.0, 13.0), (16.0, 30.0), (33.0, 23.0)],
];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
  #[error("检测尺度数量不匹配: 期望 {expected}, 实际 {actual}")]
  ScaleCount { expected: usize, actual: usize },
  #[error("尺度 {scale}: 通道数不匹配, 期望 {expected} (5 + 类别数), 实际 {actual}")]
  ChannelCount {
    scale: usize,
    expected: usize,
    actual: usize,
  },
  #[error("尺度 {scale}: 先验框数量不匹配, 期望 {expected}, 实际 {actual}")]
  AnchorCount {
    scale: usize,
    expected: usize,
    actual: usize,
  },
  #[error("配置无效: {0}")]
  InvalidConfig(String),
  #[error("解码失败: {0}")]
  Decode(#[from] DecodeError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{actual}'")]
  SchemeMismatch { expected: String, actual: String },
  #[error("参数 {name} 无效: {value}")]
  InvalidParameter { name: String, value: String },
  #[error("未知参数: {0}")]
  UnknownParameter(String),
  #[error("类别名称加载失败: {0}")]
  Labels(#[from] LabelError),
}

impl ConfigError {
  fn invalid(name: &str, value: &str) -> Self {
    ConfigError::InvalidParameter {
      name: name.to_string(),
      value: value.to_string(),
    }
  }
}

/// 流水线静态配置
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
  /// 每个检测尺度的先验框，顺序与模型输出一致
  pub anchors: Vec<Vec<Anchor>>,
  pub input_width: u32,
  pub input_height: u32,
  pub num_classes: usize,
  pub obj_threshold: f32,
  /// NMS 的 IoU 阈值
  pub nms_score: f32,
  /// 类别名称，仅用于输出
  pub labels: LabelSet,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      anchors: YOLOV3_ANCHORS
        .iter()
        .map(|scale| scale.iter().map(|&(w, h)| Anchor::new(w, h)).collect())
        .collect(),
      input_width: YOLOV3_INPUT_W,
      input_height: YOLOV3_INPUT_H,
      num_classes: YOLOV3_CLASS_NUM,
      obj_threshold: YOLOV3_OBJECT_THRESH,
      nms_score: YOLOV3_NMS_SCORE,
      labels: LabelSet::coco(),
    }
  }
}

impl PipelineConfig {
  pub fn validate(&self) -> Result<(), PipelineError> {
    let invalid = |msg: String| Err(PipelineError::InvalidConfig(msg));

    if self.anchors.is_empty() {
      return invalid("至少需要一个检测尺度".to_string());
    }
    if let Some(idx) = self.anchors.iter().position(Vec::is_empty) {
      return invalid(format!("尺度 {} 没有先验框", idx));
    }
    if self
      .anchors
      .iter()
      .flatten()
      .any(|a| !(a.width.is_finite() && a.height.is_finite() && a.width > 0.0 && a.height > 0.0))
    {
      return invalid("先验框尺寸必须为正数".to_string());
    }
    if self.input_width == 0 || self.input_height == 0 {
      return invalid(format!(
        "输入尺寸无效: {}x{}",
        self.input_width, self.input_height
      ));
    }
    if self.num_classes == 0 {
      return invalid("类别数必须大于 0".to_string());
    }
    if !(0.0..=1.0).contains(&self.obj_threshold) {
      return invalid(format!("置信度阈值超出范围: {}", self.obj_threshold));
    }
    // 阈值为 0 时互不相交的框也会互相抑制
    if !(self.nms_score > 0.0 && self.nms_score <= 1.0) {
      return invalid(format!("NMS 阈值超出范围: {}", self.nms_score));
    }
    Ok(())
  }
}

/// 构建 [`PipelineConfig`]，也可以从 URL 解析
///
/// `yolov3:///?input=416x416&classes=80&obj=0.6&nms=0.5&anchors=116,90;156,198|30,61;62,45&labels=coco`
///
/// `labels` 可以是 `coco`、逗号分隔的名称列表，或 `file:///path/to/classes.txt`（每行一个）。
#[derive(Debug, Clone, Default)]
pub struct PipelineConfigBuilder {
  config: PipelineConfig,
}

impl FromUrlWithScheme for PipelineConfigBuilder {
  const SCHEME: &'static str = "yolov3";
}

impl FromUrl for PipelineConfigBuilder {
  type Error = ConfigError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ConfigError::SchemeMismatch {
        expected: Self::SCHEME.to_string(),
        actual: url.scheme().to_string(),
      });
    }

    let mut builder = PipelineConfigBuilder::default();
    for (k, v) in url.query_pairs() {
      builder = match k.as_ref() {
        "input" => {
          let (w, h) = parse_size(&v).ok_or_else(|| ConfigError::invalid(&k, &v))?;
          builder.input_size(w, h)
        }
        "classes" => builder.num_classes(v.parse().map_err(|_| ConfigError::invalid(&k, &v))?),
        "obj" => builder.obj_threshold(v.parse().map_err(|_| ConfigError::invalid(&k, &v))?),
        "nms" => builder.nms_score(v.parse().map_err(|_| ConfigError::invalid(&k, &v))?),
        "anchors" => {
          builder.anchors(parse_anchors(&v).ok_or_else(|| ConfigError::invalid(&k, &v))?)
        }
        "labels" => builder.labels(parse_labels(&v)?),
        _ => return Err(ConfigError::UnknownParameter(k.to_string())),
      };
    }

    Ok(builder)
  }
}

impl PipelineConfigBuilder {
  pub fn anchors(mut self, anchors: Vec<Vec<Anchor>>) -> Self {
    self.config.anchors = anchors;
    self
  }

  pub fn input_size(mut self, width: u32, height: u32) -> Self {
    self.config.input_width = width;
    self.config.input_height = height;
    self
  }

  pub fn num_classes(mut self, num_classes: usize) -> Self {
    self.config.num_classes = num_classes;
    self
  }

  pub fn obj_threshold(mut self, threshold: f32) -> Self {
    self.config.obj_threshold = threshold;
    self
  }

  pub fn nms_score(mut self, nms_score: f32) -> Self {
    self.config.nms_score = nms_score;
    self
  }

  pub fn labels(mut self, labels: LabelSet) -> Self {
    self.config.labels = labels;
    self
  }

  pub fn build(self) -> Result<PipelineConfig, PipelineError> {
    self.config.validate()?;
    Ok(self.config)
  }
}

fn parse_labels(value: &str) -> Result<LabelSet, ConfigError> {
  if value == "coco" {
    return Ok(LabelSet::coco());
  }
  if value.starts_with("file:") {
    let url = Url::parse(value).map_err(|_| ConfigError::invalid("labels", value))?;
    let path = url
      .to_file_path()
      .map_err(|_| ConfigError::invalid("labels", value))?;
    return Ok(LabelSet::from_file(path)?);
  }
  Ok(LabelSet::new(value.split(',').map(str::trim)))
}

fn parse_size(value: &str) -> Option<(u32, u32)> {
  let (w, h) = value.split_once('x')?;
  Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

/// 尺度之间用 `|` 分隔，先验框之间用 `;` 分隔，每个先验框为 `w,h`
fn parse_anchors(value: &str) -> Option<Vec<Vec<Anchor>>> {
  value
    .split('|')
    .map(|scale| {
      scale
        .split(';')
        .map(|pair| {
          let (w, h) = pair.split_once(',')?;
          Some(Anchor::new(w.trim().parse().ok()?, h.trim().parse().ok()?))
        })
        .collect::<Option<Vec<_>>>()
    })
    .collect()
}

/// 检测后处理流水线：解码 → 过滤 → 坐标映射 → 分组 → NMS
///
/// 只持有静态配置，每次调用相互独立。
#[derive(Debug, Clone)]
pub struct DetectionPipeline {
  config: PipelineConfig,
}

impl DetectionPipeline {
  pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
    config.validate()?;
    info!(
      "检测流水线: 输入 {}x{}, {} 个尺度, {} 个类别, 置信度阈值 {}, NMS 阈值 {}",
      config.input_width,
      config.input_height,
      config.anchors.len(),
      config.num_classes,
      config.obj_threshold,
      config.nms_score
    );
    if config.labels.len() != config.num_classes {
      warn!(
        "类别名称数量 ({}) 与类别数 ({}) 不一致, 缺失的名称以编号代替",
        config.labels.len(),
        config.num_classes
      );
    }
    Ok(Self { config })
  }

  pub fn config(&self) -> &PipelineConfig {
    &self.config
  }

  pub fn labels(&self) -> &LabelSet {
    &self.config.labels
  }

  /// 在解码之前检查所有输出的形状
  pub fn check_outputs(&self, outputs: &[RawOutput]) -> Result<(), PipelineError> {
    if outputs.len() != self.config.anchors.len() {
      error!(
        "预期检测尺度数量为 {}, 实际为 {}",
        self.config.anchors.len(),
        outputs.len()
      );
      return Err(PipelineError::ScaleCount {
        expected: self.config.anchors.len(),
        actual: outputs.len(),
      });
    }

    let channels = SLOT_FIXED_FIELDS + self.config.num_classes;
    for (scale, (output, anchors)) in outputs.iter().zip(&self.config.anchors).enumerate() {
      if output.channels() != channels {
        error!(
          "尺度 {}: 预期通道数为 {}, 实际为 {}",
          scale,
          channels,
          output.channels()
        );
        return Err(PipelineError::ChannelCount {
          scale,
          expected: channels,
          actual: output.channels(),
        });
      }
      if output.num_anchors() != anchors.len() {
        error!(
          "尺度 {}: 预期先验框数量为 {}, 实际为 {}",
          scale,
          anchors.len(),
          output.num_anchors()
        );
        return Err(PipelineError::AnchorCount {
          scale,
          expected: anchors.len(),
          actual: output.num_anchors(),
        });
      }
    }
    Ok(())
  }

  /// 直接缩放（无填充）预处理的输出
  pub fn run(
    &self,
    outputs: &[RawOutput],
    image_width: u32,
    image_height: u32,
  ) -> Result<DetectResult, PipelineError> {
    self.run_letterboxed(outputs, image_width, image_height, Letterbox::none())
  }

  pub fn run_letterboxed(
    &self,
    outputs: &[RawOutput],
    image_width: u32,
    image_height: u32,
    letterbox: Letterbox,
  ) -> Result<DetectResult, PipelineError> {
    self.check_outputs(outputs)?;

    let input_w = self.config.input_width as f32;
    let input_h = self.config.input_height as f32;

    let candidates: Vec<_> = outputs
      .iter()
      .zip(&self.config.anchors)
      .map(|(output, anchors)| decode_output(output, anchors, input_w, input_h))
      .collect::<Result<Vec<_>, _>>()?
      .into_iter()
      .flatten()
      .collect();
    debug!("候选框总数: {}", candidates.len());

    let filtered = filter_boxes(&candidates, self.config.obj_threshold);
    debug!("置信度过滤后: {} 个", filtered.len());

    let mapped = map_to_image(
      &filtered,
      input_w,
      input_h,
      image_width as f32,
      image_height as f32,
      letterbox,
    );

    let groups = group_by_class(&mapped);
    let items = nms_groups(&groups, self.config.nms_score);
    debug!("检测到 {} 个物体", items.len());

    Ok(DetectResult::from(items))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_config_is_yolov3_coco() {
    let config = PipelineConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.anchors.len(), 3);
    assert_eq!(config.anchors[2][0], Anchor::new(10.0, 13.0));
    assert_eq!(config.labels.len(), 80);
  }

  #[test]
  fn builder_rejects_bad_values() {
    let err = PipelineConfigBuilder::default().num_classes(0).build().unwrap_err();
    assert!(matches!(err, PipelineError::InvalidConfig(_)));

    let err = PipelineConfigBuilder::default().nms_score(1.5).build().unwrap_err();
    assert!(matches!(err, PipelineError::InvalidConfig(_)));

    let err = PipelineConfigBuilder::default().nms_score(0.0).build().unwrap_err();
    assert!(matches!(err, PipelineError::InvalidConfig(_)));
    assert!(PipelineConfigBuilder::default().nms_score(1.0).build().is_ok());

    let err = PipelineConfigBuilder::default()
      .anchors(vec![vec![Anchor::new(10.0, 13.0)], vec![]])
      .build()
      .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidConfig(_)));

    let err = PipelineConfigBuilder::default().input_size(0, 416).build().unwrap_err();
    assert!(matches!(err, PipelineError::InvalidConfig(_)));
  }

  #[test]
  fn parses_url_config() {
    let url = Url::parse(
      "yolov3:///?input=320x256&classes=2&obj=0.3&nms=0.4&anchors=10,13;16,30|33,23&labels=ball,net",
    )
    .unwrap();
    let config = PipelineConfigBuilder::from_url(&url).unwrap().build().unwrap();

    assert_eq!((config.input_width, config.input_height), (320, 256));
    assert_eq!(config.num_classes, 2);
    assert_eq!(config.obj_threshold, 0.3);
    assert_eq!(config.nms_score, 0.4);
    assert_eq!(
      config.anchors,
      vec![
        vec![Anchor::new(10.0, 13.0), Anchor::new(16.0, 30.0)],
        vec![Anchor::new(33.0, 23.0)],
      ]
    );
    assert_eq!(config.labels.name_of(1), "net");
  }

  #[test]
  fn reads_labels_from_file_url() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("classes.txt");
    std::fs::write(&path, "ball\nnet\n").unwrap();

    let url = Url::parse(&format!(
      "yolov3:///?classes=2&labels=file://{}",
      path.display()
    ))
    .unwrap();
    let config = PipelineConfigBuilder::from_url(&url).unwrap().build().unwrap();
    assert_eq!(config.labels, LabelSet::new(["ball", "net"]));

    let missing = dir.path().join("missing.txt");
    let url = Url::parse(&format!("yolov3:///?labels=file://{}", missing.display())).unwrap();
    assert!(matches!(
      PipelineConfigBuilder::from_url(&url),
      Err(ConfigError::Labels(LabelError::IoError(_)))
    ));
  }

  #[test]
  fn url_config_errors() {
    let url = Url::parse("yolov5:///?obj=0.3").unwrap();
    assert!(matches!(
      PipelineConfigBuilder::from_url(&url),
      Err(ConfigError::SchemeMismatch { .. })
    ));

    let url = Url::parse("yolov3:///?obj=high").unwrap();
    assert!(matches!(
      PipelineConfigBuilder::from_url(&url),
      Err(ConfigError::InvalidParameter { .. })
    ));

    let url = Url::parse("yolov3:///?anchors=10;13").unwrap();
    assert!(matches!(
      PipelineConfigBuilder::from_url(&url),
      Err(ConfigError::InvalidParameter { .. })
    ));

    let url = Url::parse("yolov3:///?stride=8").unwrap();
    assert!(matches!(
      PipelineConfigBuilder::from_url(&url),
      Err(ConfigError::UnknownParameter(_))
    ));
  }
}
