// 该文件是 Yunhai （云海） 项目的一部分。
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

use ndarray::Array2;

use crate::utils::PixelRect;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 一个检测结果，坐标位于原图坐标系
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  pub bbox: PixelRect,
  pub score: f32,
  pub class_id: usize,
  /// 框内二值掩码，形状为 (bbox.height, bbox.width)；纯检测模型为 `None`
  pub mask: Option<Array2<bool>>,
}

impl Detection {
  /// 掩码前景像素数
  pub fn mask_area(&self) -> usize {
    self
      .mask
      .as_ref()
      .map(|m| m.iter().filter(|&&v| v).count())
      .unwrap_or(0)
  }
}

#[derive(Debug, Clone, Default)]
pub struct DetectResult {
  pub items: Box<[Detection]>,
}

impl DetectResult {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
    self.items.iter()
  }
}

impl From<Vec<Detection>> for DetectResult {
  fn from(items: Vec<Detection>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

pub mod decode;
pub mod engine;
pub mod labels;
pub mod metadata;
#[cfg(feature = "onnxruntime")]
pub mod onnx;
mod yolov8;

pub use self::engine::InferenceEngine;
pub use self::labels::{ClassNames, ClassNamesError};
pub use self::metadata::{InputShapeMode, ModelMetadata};
#[cfg(feature = "onnxruntime")]
pub use self::onnx::{OnnxEngine, OnnxEngineError};
pub use self::yolov8::{PredictorConfig, Yolov8, Yolov8Builder, Yolov8Error};
