// 该文件是 Yunhai （云海） 项目的一部分。
// tests/predict.rs - 端到端预测测试
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

use std::cell::RefCell;

use image::{Rgb, RgbImage};
use ndarray::{Array3, Array4, ArrayD, ArrayView4, s};

use yunhai::{
  frame::PixelFrame,
  input::NamedFrame,
  model::{InferenceEngine, InputShapeMode, Model, PredictorConfig, Yolov8, Yolov8Error},
  utils::PixelRect,
};

/// 返回预先准备好的输出，并记录收到的输入
struct ScriptedEngine {
  input_shape: Vec<i64>,
  output_shapes: Vec<Vec<i64>>,
  outputs: Vec<ArrayD<f32>>,
  fail: bool,
  seen: RefCell<Vec<Array4<f32>>>,
}

impl ScriptedEngine {
  fn new(input_shape: &[i64], outputs: Vec<ArrayD<f32>>) -> Self {
    let output_shapes = outputs
      .iter()
      .map(|o| o.shape().iter().map(|&d| d as i64).collect())
      .collect();
    Self {
      input_shape: input_shape.to_vec(),
      output_shapes,
      outputs,
      fail: false,
      seen: RefCell::new(Vec::new()),
    }
  }
}

impl InferenceEngine for ScriptedEngine {
  type Error = std::io::Error;

  fn input_shape(&self) -> &[i64] {
    &self.input_shape
  }

  fn output_shapes(&self) -> &[Vec<i64>] {
    &self.output_shapes
  }

  fn run(&self, input: ArrayView4<f32>) -> Result<Vec<ArrayD<f32>>, Self::Error> {
    self.seen.borrow_mut().push(input.to_owned());
    if self.fail {
      return Err(std::io::Error::other("设备丢失"));
    }
    Ok(self.outputs.clone())
  }
}

/// (1, channels, anchors) 检测张量，`anchors` 每项为该锚点的全部通道值
fn detection_tensor(channels: usize, anchors: &[Vec<f32>]) -> ArrayD<f32> {
  let mut tensor = Array3::<f32>::zeros((1, channels, anchors.len()));
  for (a, values) in anchors.iter().enumerate() {
    for (c, &v) in values.iter().enumerate() {
      tensor[[0, c, a]] = v;
    }
  }
  tensor.into_dyn()
}

fn anchor(channels: usize, rect: [f32; 4], class_id: usize, score: f32) -> Vec<f32> {
  let mut values = vec![0.0; channels];
  values[..4].copy_from_slice(&rect);
  values[4 + class_id] = score;
  values
}

fn frame(width: u32, height: u32) -> PixelFrame {
  PixelFrame::from_rgb_image(RgbImage::from_pixel(width, height, Rgb([200, 100, 50]))).unwrap()
}

#[test]
fn detection_maps_back_to_original_frame() {
  let channels = 84;
  let outputs = vec![detection_tensor(
    channels,
    &[
      anchor(channels, [320.0, 320.0, 100.0, 50.0], 3, 0.9),
      // 与第一个框重叠，类别不同，依然被抑制
      anchor(channels, [322.0, 321.0, 100.0, 50.0], 7, 0.6),
      anchor(channels, [100.0, 300.0, 40.0, 40.0], 1, 0.1),
    ],
  )];
  let model: Yolov8<_> =
    Yolov8::with_engine(ScriptedEngine::new(&[1, 3, 640, 640], outputs), PredictorConfig::default())
      .unwrap();

  let result = model.predict(&frame(1280, 720)).unwrap();

  assert_eq!(result.len(), 1);
  let detection = result.iter().next().unwrap();
  assert_eq!(detection.class_id, 3);
  assert!((detection.score - 0.9).abs() < 1e-6);
  assert_eq!(detection.bbox, PixelRect::new(540, 310, 200, 100));
  assert!(detection.mask.is_none());
}

#[test]
fn fixed_input_is_padded_and_normalized() {
  let outputs = vec![detection_tensor(84, &[vec![0.0; 84]])];
  let model: Yolov8<_> =
    Yolov8::with_engine(ScriptedEngine::new(&[1, 3, 640, 640], outputs), PredictorConfig::default())
      .unwrap();

  let result = model.predict(&frame(1280, 720)).unwrap();
  assert!(result.is_empty());

  let seen = model.engine().seen.borrow();
  let input = &seen[0];
  assert_eq!(input.shape(), &[1, 3, 640, 640]);
  // 上方填充区
  assert!((input[[0, 0, 10, 10]] - 114.0 / 255.0).abs() < 1e-6);
  // 图像区，RGB 顺序
  assert!((input[[0, 0, 320, 320]] - 200.0 / 255.0).abs() < 2.0 / 255.0);
  assert!((input[[0, 2, 320, 320]] - 50.0 / 255.0).abs() < 2.0 / 255.0);
}

#[test]
fn dynamic_input_is_stride_aligned() {
  let outputs = vec![detection_tensor(84, &[vec![0.0; 84]])];
  let model: Yolov8<_> =
    Yolov8::with_engine(ScriptedEngine::new(&[1, 3, -1, -1], outputs), PredictorConfig::default())
      .unwrap();
  assert_eq!(
    model.metadata().input_mode,
    InputShapeMode::Dynamic { stride: 32 }
  );

  model.predict(&frame(1280, 720)).unwrap();

  let seen = model.engine().seen.borrow();
  assert_eq!(seen[0].shape(), &[1, 3, 384, 640]);
}

#[test]
fn segmentation_mask_covers_box() {
  let class_count = 2;
  let channels = 4 + class_count + 32;

  let mut values = anchor(channels, [320.0, 320.0, 100.0, 50.0], 1, 0.8);
  values[4 + class_count] = 1.0;

  let mut protos = Array4::<f32>::zeros((1, 32, 160, 160));
  protos.slice_mut(s![0, 0, .., ..]).fill(10.0);

  let outputs = vec![detection_tensor(channels, &[values]), protos.into_dyn()];
  let model: Yolov8<_> =
    Yolov8::with_engine(ScriptedEngine::new(&[1, 3, 640, 640], outputs), PredictorConfig::default())
      .unwrap();
  assert!(model.metadata().has_mask);
  assert_eq!(model.class_count(), 2);

  let result = model.predict(&frame(1280, 720)).unwrap();
  assert_eq!(result.len(), 1);

  let detection = result.iter().next().unwrap();
  assert_eq!(detection.class_id, 1);
  assert_eq!(detection.bbox, PixelRect::new(540, 310, 200, 100));

  let mask = detection.mask.as_ref().unwrap();
  assert_eq!(mask.dim(), (100, 200));
  assert!(mask.iter().all(|&on| on));
  assert_eq!(detection.mask_area(), 200 * 100);
}

#[test]
fn negative_coefficients_give_empty_mask() {
  let class_count = 1;
  let channels = 4 + class_count + 32;

  let mut values = anchor(channels, [320.0, 320.0, 100.0, 50.0], 0, 0.8);
  values[4 + class_count] = -1.0;

  let mut protos = Array4::<f32>::zeros((1, 32, 160, 160));
  protos.slice_mut(s![0, 0, .., ..]).fill(10.0);

  let outputs = vec![detection_tensor(channels, &[values]), protos.into_dyn()];
  let model: Yolov8<_> =
    Yolov8::with_engine(ScriptedEngine::new(&[1, 3, 640, 640], outputs), PredictorConfig::default())
      .unwrap();

  let result = model.predict(&frame(1280, 720)).unwrap();
  let detection = result.iter().next().unwrap();
  assert_eq!(detection.mask_area(), 0);
}

#[test]
fn engine_failure_is_inference_error() {
  let outputs = vec![detection_tensor(84, &[vec![0.0; 84]])];
  let mut engine = ScriptedEngine::new(&[1, 3, 640, 640], outputs);
  engine.fail = true;
  let model: Yolov8<_> = Yolov8::with_engine(engine, PredictorConfig::default()).unwrap();

  assert!(matches!(
    model.predict(&frame(64, 64)),
    Err(Yolov8Error::InferenceError(_))
  ));
}

#[test]
fn missing_prototype_output_is_inference_error() {
  let channels = 4 + 80 + 32;
  let mut engine = ScriptedEngine::new(
    &[1, 3, 640, 640],
    vec![detection_tensor(channels, &[vec![0.0; channels]])],
  );
  engine.output_shapes.push(vec![1, 32, 160, 160]);
  let model: Yolov8<_> = Yolov8::with_engine(engine, PredictorConfig::default()).unwrap();

  assert!(matches!(
    model.predict(&frame(64, 64)),
    Err(Yolov8Error::InferenceError(_))
  ));
}

#[test]
fn model_trait_accepts_named_frames() {
  let channels = 84;
  let outputs = vec![detection_tensor(
    channels,
    &[anchor(channels, [320.0, 320.0, 64.0, 64.0], 0, 0.7)],
  )];
  let model: Yolov8<_, NamedFrame> =
    Yolov8::with_engine(ScriptedEngine::new(&[1, 3, 640, 640], outputs), PredictorConfig::default())
      .unwrap();

  let named = NamedFrame {
    name: "square.png".to_string(),
    frame: frame(640, 640),
  };
  let result = model.infer(&named).unwrap();
  assert_eq!(result.len(), 1);
  assert_eq!(
    result.iter().next().unwrap().bbox,
    PixelRect::new(288, 288, 64, 64)
  );
}
