// 该文件是 Yunhai （云海） 项目的一部分。
// src/model/yolov8.rs - YOLOv8 检测/实例分割模型
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

use std::{marker::PhantomData, time::Instant};

use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{PixelFrame, to_nchw_tensor},
  input::AsPixelFrame,
  model::{
    ClassNames, DetectResult, InferenceEngine, InputShapeMode, Model, ModelMetadata,
    decode::{DecodeConfig, decode},
    metadata::MetadataError,
  },
  url_local_path,
  utils::{FrameSize, LetterboxOptions, letterbox},
};

const YOLOV8_SCHEME: &str = "yolov8";

#[derive(Error, Debug)]
pub enum Yolov8Error {
  #[error("模型加载错误: {0}")]
  ModelLoadError(String),
  #[error("推理错误: {0}")]
  InferenceError(String),
  #[error("类别数不匹配: 模型为 {expected}, 类别文件为 {actual}")]
  ConfigMismatchError { expected: usize, actual: usize },
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
}

impl From<MetadataError> for Yolov8Error {
  fn from(err: MetadataError) -> Self {
    Yolov8Error::ModelLoadError(err.to_string())
  }
}

/// 预测参数
#[derive(Debug, Clone, PartialEq)]
pub struct PredictorConfig {
  pub conf_threshold: f32,
  pub iou_threshold: f32,
  pub mask_threshold: f32,
  pub pad_color: [u8; 3],
  /// 动态输入模型的目标尺寸，实际尺寸会按步长收缩
  pub dynamic_size: FrameSize,
  pub stride: u32,
}

impl Default for PredictorConfig {
  fn default() -> Self {
    Self {
      conf_threshold: 0.3,
      iou_threshold: 0.4,
      mask_threshold: 0.5,
      pad_color: [114, 114, 114],
      dynamic_size: FrameSize::new(640, 640),
      stride: 32,
    }
  }
}

pub struct Yolov8<E, Frame = PixelFrame> {
  engine: E,
  metadata: ModelMetadata,
  config: PredictorConfig,
  _phantom: PhantomData<Frame>,
}

impl<E: InferenceEngine, Frame> Yolov8<E, Frame> {
  /// 读取引擎的输入输出描述并推导模型元数据
  pub fn with_engine(engine: E, config: PredictorConfig) -> Result<Self, Yolov8Error> {
    let metadata = ModelMetadata::from_engine(&engine, config.stride).inspect_err(|e| {
      error!("模型元数据无效: {}", e);
    })?;
    info!("模型初始化完成, 输入模式: {:?}", metadata.input_mode);

    Ok(Self {
      engine,
      metadata,
      config,
      _phantom: PhantomData,
    })
  }

  pub fn metadata(&self) -> &ModelMetadata {
    &self.metadata
  }

  pub fn config(&self) -> &PredictorConfig {
    &self.config
  }

  pub fn engine(&self) -> &E {
    &self.engine
  }

  pub fn class_count(&self) -> usize {
    self.metadata.class_count
  }

  /// 类别名称数量必须与模型类别数一致
  pub fn ensure_class_count(&self, names: &ClassNames) -> Result<(), Yolov8Error> {
    if names.len() != self.metadata.class_count {
      error!(
        "类别文件有 {} 个类别, 模型有 {} 个",
        names.len(),
        self.metadata.class_count
      );
      return Err(Yolov8Error::ConfigMismatchError {
        expected: self.metadata.class_count,
        actual: names.len(),
      });
    }
    Ok(())
  }

  /// letterbox 的目标尺寸与参数
  fn letterbox_options(&self) -> (FrameSize, LetterboxOptions) {
    let base = LetterboxOptions {
      pad_color: self.config.pad_color,
      ..Default::default()
    };

    match self.metadata.input_mode {
      InputShapeMode::Fixed { height, width } => (
        FrameSize::new(width, height),
        LetterboxOptions {
          allow_modulo_pad: false,
          ..base
        },
      ),
      InputShapeMode::Dynamic { stride } => (
        self.config.dynamic_size,
        LetterboxOptions {
          allow_modulo_pad: true,
          stride,
          ..base
        },
      ),
    }
  }

  pub fn predict(&self, frame: &PixelFrame) -> Result<DetectResult, Yolov8Error> {
    let original = frame.size();
    let image = frame.to_rgb_image();

    let (target, options) = self.letterbox_options();
    let (resized, transform) = letterbox(&image, target, &options);
    let resized_size = transform.output_size();
    debug!(
      "预处理: {}x{} -> {}x{}",
      original.width, original.height, resized_size.width, resized_size.height
    );

    let input = to_nchw_tensor(&resized);

    let start = Instant::now();
    let outputs = self.engine.run(input.view()).map_err(|e| {
      error!("推理失败: {}", e);
      Yolov8Error::InferenceError(e.to_string())
    })?;
    debug!("推理耗时: {:?}", start.elapsed());

    let expected = if self.metadata.has_mask { 2 } else { 1 };
    if outputs.len() < expected {
      return Err(Yolov8Error::InferenceError(format!(
        "期望 {} 个输出, 实际为 {}",
        expected,
        outputs.len()
      )));
    }

    let config = DecodeConfig {
      conf_threshold: self.config.conf_threshold,
      iou_threshold: self.config.iou_threshold,
      mask_threshold: self.config.mask_threshold,
      class_count: self.metadata.class_count,
      has_mask: self.metadata.has_mask,
    };
    let protos = if self.metadata.has_mask {
      outputs.get(1).map(|p| p.view())
    } else {
      None
    };

    let items = decode(outputs[0].view(), protos, &config, resized_size, original)
      .map_err(|e| Yolov8Error::InferenceError(e.to_string()))?;
    debug!("检测到 {} 个物体", items.len());

    Ok(DetectResult::from(items))
  }
}

impl<E: InferenceEngine, Frame: AsPixelFrame> Model for Yolov8<E, Frame> {
  type Input = Frame;
  type Output = DetectResult;
  type Error = Yolov8Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.predict(input.as_pixel_frame())
  }
}

#[derive(Debug, Clone)]
pub struct Yolov8Builder {
  model_path: String,
  config: PredictorConfig,
  gpu: bool,
}

impl FromUrl for Yolov8Builder {
  type Error = Yolov8Error;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != YOLOV8_SCHEME {
      return Err(Yolov8Error::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        YOLOV8_SCHEME
      )));
    }

    let mut builder = Yolov8Builder::new(url_local_path(url));
    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "conf" => builder.config.conf_threshold = parse_threshold(&key, &value)?,
        "iou" => builder.config.iou_threshold = parse_threshold(&key, &value)?,
        "mask" => builder.config.mask_threshold = parse_threshold(&key, &value)?,
        "stride" => {
          builder.config.stride = value
            .parse()
            .map_err(|_| Yolov8Error::ModelPathError(format!("无效的步长: {}", value)))?
        }
        "gpu" => builder.gpu = !matches!(value.as_ref(), "false" | "0"),
        _ => debug!("忽略未知参数: {}={}", key, value),
      }
    }

    Ok(builder)
  }
}

impl FromUrlWithScheme for Yolov8Builder {
  const SCHEME: &'static str = YOLOV8_SCHEME;
}

fn parse_threshold(key: &str, value: &str) -> Result<f32, Yolov8Error> {
  match value.parse::<f32>() {
    Ok(v) if (0.0..=1.0).contains(&v) => Ok(v),
    _ => Err(Yolov8Error::ModelPathError(format!(
      "参数 {} 应为 [0, 1] 内的数值, 实际为 {}",
      key, value
    ))),
  }
}

impl Yolov8Builder {
  pub fn new<S: Into<String>>(model_path: S) -> Self {
    Self {
      model_path: model_path.into(),
      config: PredictorConfig::default(),
      gpu: false,
    }
  }

  pub fn model_path(&self) -> &str {
    &self.model_path
  }

  pub fn predictor_config(&self) -> &PredictorConfig {
    &self.config
  }

  pub fn is_gpu(&self) -> bool {
    self.gpu
  }

  pub fn conf_threshold(mut self, threshold: f32) -> Self {
    self.config.conf_threshold = threshold;
    self
  }

  pub fn iou_threshold(mut self, threshold: f32) -> Self {
    self.config.iou_threshold = threshold;
    self
  }

  pub fn mask_threshold(mut self, threshold: f32) -> Self {
    self.config.mask_threshold = threshold;
    self
  }

  pub fn gpu(mut self, gpu: bool) -> Self {
    self.gpu = gpu;
    self
  }

  /// 使用外部提供的推理引擎
  pub fn build_with_engine<E: InferenceEngine, Frame>(
    self,
    engine: E,
  ) -> Result<Yolov8<E, Frame>, Yolov8Error> {
    Yolov8::with_engine(engine, self.config)
  }

  #[cfg(feature = "onnxruntime")]
  pub fn build<Frame>(self) -> Result<Yolov8<crate::model::OnnxEngine, Frame>, Yolov8Error> {
    info!("加载模型文件: {}", self.model_path);
    let engine = crate::model::OnnxEngine::load(&self.model_path, self.gpu)
      .map_err(|e| Yolov8Error::ModelLoadError(e.to_string()))?;
    let model = Yolov8::with_engine(engine, self.config)?;
    info!(
      "模型加载完成, 输入: {}, 输出: {:?}",
      model.engine().input_name(),
      model.engine().output_names()
    );
    Ok(model)
  }
}
