use shanan_anchor::model::{Anchor, BBox, LabelSet, RawOutput};
use shanan_anchor::postprocess::{Letterbox, decode_output, filter_boxes, nms_per_class};
use shanan_anchor::{DetectionPipeline, PipelineConfig, PipelineConfigBuilder, PipelineError};

const NUM_CLASSES: usize = 2;
const CHANNELS: usize = 5 + NUM_CLASSES;
const EMPTY: f32 = -10.0;

fn logit(p: f32) -> f32 {
  (p / (1.0 - p)).ln()
}

struct ScaleBuilder {
  shape: [usize; 4],
  data: Vec<f32>,
}

impl ScaleBuilder {
  fn new(grid_h: usize, grid_w: usize, num_anchors: usize) -> Self {
    let shape = [grid_h, grid_w, num_anchors, CHANNELS];
    let mut data = vec![0.0; shape.iter().product()];
    for slot in data.chunks_mut(CHANNELS) {
      slot[4] = EMPTY;
      for c in slot[5..].iter_mut() {
        *c = EMPTY;
      }
    }
    Self { shape, data }
  }

  fn set(mut self, row: usize, col: usize, anchor: usize, slot: [f32; CHANNELS]) -> Self {
    let base = ((row * self.shape[1] + col) * self.shape[2] + anchor) * CHANNELS;
    self.data[base..base + CHANNELS].copy_from_slice(&slot);
    self
  }

  fn build(self) -> RawOutput {
    RawOutput::new(self.shape, self.data).unwrap()
  }
}

fn two_scale_config() -> PipelineConfig {
  PipelineConfigBuilder::default()
    .input_size(416, 416)
    .num_classes(NUM_CLASSES)
    .anchors(vec![
      vec![Anchor::new(208.0, 208.0)],
      vec![Anchor::new(208.0, 208.0)],
    ])
    .obj_threshold(0.6)
    .nms_score(0.5)
    .labels(LabelSet::new(["ball", "player"]))
    .build()
    .unwrap()
}

fn two_scale_outputs() -> Vec<RawOutput> {
  let fine = ScaleBuilder::new(2, 2, 1)
    // (0,0) 上的 ball，覆盖输入左上四分之一
    .set(0, 0, 0, [0.0, 0.0, 0.0, 0.0, logit(0.9), logit(0.9), EMPTY])
    // 低于阈值
    .set(0, 1, 0, [0.0, 0.0, 0.0, 0.0, logit(0.3), logit(0.9), EMPTY])
    // (1,1) 上的 player，覆盖右下四分之一
    .set(1, 1, 0, [0.0, 0.0, 0.0, 0.0, logit(0.95), EMPTY, logit(0.95)])
    .build();
  // 粗尺度上的同一个 ball，得分较低
  let coarse = ScaleBuilder::new(1, 1, 1)
    .set(
      0,
      0,
      0,
      [logit(0.25), logit(0.25), 0.0, 0.0, logit(0.8), logit(0.9), EMPTY],
    )
    .build();
  vec![fine, coarse]
}

#[test]
fn end_to_end_resolves_cross_scale_duplicates() {
  let pipeline = DetectionPipeline::new(two_scale_config()).unwrap();
  let result = pipeline.run(&two_scale_outputs(), 832, 832).unwrap();

  assert_eq!(result.len(), 2);
  let ball = result.items[0];
  assert_eq!(ball.class_id, 0);
  assert!((ball.score - 0.81).abs() < 1e-4);
  assert_eq!(ball.bbox, BBox::new(0.0, 0.0, 416.0, 416.0));

  let player = result.items[1];
  assert_eq!(player.class_id, 1);
  assert!((player.score - 0.9025).abs() < 1e-4);
  assert_eq!(player.bbox, BBox::new(416.0, 416.0, 832.0, 832.0));
  assert_eq!(pipeline.labels().name_of(player.class_id), "player");
}

#[test]
fn identical_inputs_give_identical_results() {
  let pipeline = DetectionPipeline::new(two_scale_config()).unwrap();
  let outputs = two_scale_outputs();

  let first = pipeline.run(&outputs, 1280, 720).unwrap();
  for _ in 0..5 {
    assert_eq!(pipeline.run(&outputs, 1280, 720).unwrap(), first);
  }

  // 另一个独立配置的流水线不影响结果
  let other = DetectionPipeline::new(PipelineConfig::default()).unwrap();
  assert_eq!(other.config().num_classes, 80);
  assert_eq!(pipeline.run(&outputs, 1280, 720).unwrap(), first);
}

#[test]
fn full_input_box_maps_to_full_image() {
  let config = PipelineConfigBuilder::default()
    .input_size(416, 416)
    .num_classes(1)
    .anchors(vec![vec![Anchor::new(104.0, 104.0)]])
    .build()
    .unwrap();
  let t = (4.0f32).ln();
  let output = RawOutput::new([1, 1, 1, 6], vec![0.0, 0.0, t, t, 5.0, 5.0]).unwrap();

  let pipeline = DetectionPipeline::new(config).unwrap();
  let result = pipeline.run(&[output], 1280, 720).unwrap();

  assert_eq!(result.len(), 1);
  assert_eq!(result.items[0].bbox, BBox::new(0.0, 0.0, 1280.0, 720.0));
}

#[test]
fn letterboxed_run_removes_padding() {
  // 1280x720 填充进 416x416 后内容区域为 y ∈ [91, 325]
  let config = PipelineConfigBuilder::default()
    .input_size(416, 416)
    .num_classes(1)
    .anchors(vec![vec![Anchor::new(416.0, 234.0)]])
    .build()
    .unwrap();
  let output = RawOutput::new([1, 1, 1, 6], vec![0.0, 0.0, 0.0, 0.0, 5.0, 5.0]).unwrap();

  let pipeline = DetectionPipeline::new(config).unwrap();
  let letterbox = Letterbox::fit(416.0, 416.0, 1280.0, 720.0);
  let result = pipeline.run_letterboxed(&[output], 1280, 720, letterbox).unwrap();

  assert_eq!(result.items[0].bbox, BBox::new(0.0, 0.0, 1280.0, 720.0));
}

#[test]
fn all_below_threshold_is_empty_not_error() {
  let pipeline = DetectionPipeline::new(two_scale_config()).unwrap();
  let outputs = vec![
    ScaleBuilder::new(2, 2, 1).build(),
    ScaleBuilder::new(1, 1, 1).build(),
  ];

  let result = pipeline.run(&outputs, 640, 480).unwrap();
  assert!(result.is_empty());
}

#[test]
fn shape_mismatches_fail_fast() {
  let pipeline = DetectionPipeline::new(two_scale_config()).unwrap();
  let outputs = two_scale_outputs();

  let err = pipeline.run(&outputs[..1], 640, 480).unwrap_err();
  assert_eq!(
    err,
    PipelineError::ScaleCount {
      expected: 2,
      actual: 1,
    }
  );

  let wrong_channels = RawOutput::new([1, 1, 1, 8], vec![0.0; 8]).unwrap();
  let err = pipeline
    .run(&[outputs[0].clone(), wrong_channels], 640, 480)
    .unwrap_err();
  assert_eq!(
    err,
    PipelineError::ChannelCount {
      scale: 1,
      expected: 7,
      actual: 8,
    }
  );

  let wrong_anchors = ScaleBuilder::new(1, 1, 3).build();
  let err = pipeline
    .run(&[wrong_anchors, outputs[1].clone()], 640, 480)
    .unwrap_err();
  assert_eq!(
    err,
    PipelineError::AnchorCount {
      scale: 0,
      expected: 1,
      actual: 3,
    }
  );
}

/// 线性同余生成器，保证测试数据可复现
fn pseudo_random_output(seed: u32, shape: [usize; 4]) -> RawOutput {
  let mut state = seed;
  let data = (0..shape.iter().product::<usize>())
    .map(|_| {
      state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
      (state >> 8) as f32 / (1u32 << 24) as f32 * 8.0 - 4.0
    })
    .collect();
  RawOutput::new(shape, data).unwrap()
}

#[test]
fn raising_objectness_threshold_never_adds_boxes() {
  let anchors = [Anchor::new(30.0, 61.0), Anchor::new(62.0, 45.0), Anchor::new(59.0, 119.0)];
  let output = pseudo_random_output(7, [8, 8, 3, CHANNELS]);
  let candidates = decode_output(&output, &anchors, 416.0, 416.0).unwrap();
  assert_eq!(candidates.len(), 8 * 8 * 3);

  let counts: Vec<usize> = [0.0, 0.1, 0.3, 0.5, 0.7, 0.9, 0.99]
    .iter()
    .map(|&t| filter_boxes(&candidates, t).len())
    .collect();
  assert!(counts.windows(2).all(|w| w[0] >= w[1]), "{:?}", counts);
  assert_eq!(counts[0], candidates.len());
}

#[test]
fn raising_nms_score_never_removes_boxes() {
  // 每隔 2 像素平移的一串同类框，得分递减
  let items: Vec<_> = (0..10)
    .map(|i| shanan_anchor::model::DetectItem {
      class_id: 0,
      score: 1.0 - i as f32 * 0.05,
      objectness: 1.0,
      bbox: BBox::new(i as f32 * 2.0, 0.0, i as f32 * 2.0 + 10.0, 10.0),
    })
    .collect();

  let counts: Vec<usize> = [0.1, 0.3, 0.5, 0.7, 0.9]
    .iter()
    .map(|&t| nms_per_class(&items, t).len())
    .collect();
  assert!(counts.windows(2).all(|w| w[0] <= w[1]), "{:?}", counts);
  assert_eq!(counts[0], 2);
  assert_eq!(counts[4], 10);
}

#[test]
fn surviving_boxes_respect_nms_invariant() {
  let config = PipelineConfigBuilder::default()
    .input_size(416, 416)
    .num_classes(NUM_CLASSES)
    .anchors(vec![
      vec![Anchor::new(116.0, 90.0), Anchor::new(156.0, 198.0)],
      vec![Anchor::new(30.0, 61.0), Anchor::new(62.0, 45.0)],
    ])
    .obj_threshold(0.3)
    .nms_score(0.45)
    .build()
    .unwrap();
  let outputs = vec![
    pseudo_random_output(11, [4, 4, 2, CHANNELS]),
    pseudo_random_output(23, [8, 8, 2, CHANNELS]),
  ];

  let pipeline = DetectionPipeline::new(config).unwrap();
  let result = pipeline.run(&outputs, 1280, 720).unwrap();
  assert!(!result.is_empty());

  for (i, a) in result.iter().enumerate() {
    for b in result.iter().skip(i + 1) {
      if a.class_id == b.class_id {
        assert!(a.bbox.iou(&b.bbox) < 0.45);
      }
    }
  }
}
