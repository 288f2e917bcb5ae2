// 该文件是 Yunhai （云海） 项目的一部分。
// src/model/metadata.rs - 模型元数据
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
use tracing::{info, warn};

use crate::model::InferenceEngine;

/// 检测张量中框坐标占用的通道数 (cx, cy, w, h)
pub const BOX_CHANNELS: usize = 4;
/// 分割模型每个候选携带的掩码系数个数
pub const MASK_CHANNELS: usize = 32;

const DYNAMIC_DIM: i64 = -1;
const INPUT_CHANNELS: i64 = 3;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MetadataError {
  #[error("模型输入维度应为 4 (NCHW), 实际为 {0}")]
  InputRank(usize),
  #[error("模型输入通道数应为 3, 实际为 {0}")]
  InputChannels(i64),
  #[error("模型输入尺寸无效: {0}x{1}")]
  InputSize(i64, i64),
  #[error("模型输入高宽只有一个是动态的: {0}x{1}")]
  PartialDynamic(i64, i64),
  #[error("模型没有输出")]
  NoOutputs,
  #[error("第 {index} 个输出维度无效: {shape:?}")]
  OutputRank { index: usize, shape: Vec<i64> },
  #[error("检测输出通道数 {channels} 不足, 至少需要 {required}")]
  TooFewChannels { channels: i64, required: usize },
  #[error("掩码原型通道数应为 32, 实际为 {0}")]
  ProtoChannels(i64),
}

/// 输入尺寸模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputShapeMode {
  /// 固定输入尺寸
  Fixed { height: u32, width: u32 },
  /// 高宽都未指定，预处理时按步长对齐
  Dynamic { stride: u32 },
}

/// 模型加载时推导出的只读信息
#[derive(Debug, Clone, PartialEq)]
pub struct ModelMetadata {
  pub input_shape: Vec<i64>,
  pub output_shapes: Vec<Vec<i64>>,
  pub input_mode: InputShapeMode,
  pub class_count: usize,
  /// 引擎暴露了第二个输出（掩码原型）
  pub has_mask: bool,
}

impl ModelMetadata {
  pub fn from_engine<E: InferenceEngine>(engine: &E, stride: u32) -> Result<Self, MetadataError> {
    Self::from_shapes(engine.input_shape(), engine.output_shapes(), stride)
  }

  pub fn from_shapes(
    input: &[i64],
    outputs: &[Vec<i64>],
    stride: u32,
  ) -> Result<Self, MetadataError> {
    let input_mode = Self::input_mode(input, stride)?;

    let detection = outputs.first().ok_or(MetadataError::NoOutputs)?;
    if detection.len() != 3 {
      return Err(MetadataError::OutputRank {
        index: 0,
        shape: detection.clone(),
      });
    }

    let has_mask = outputs.len() > 1;
    if outputs.len() > 2 {
      warn!("模型有 {} 个输出, 只使用前两个", outputs.len());
    }

    if has_mask {
      let proto = &outputs[1];
      if proto.len() != 4 {
        return Err(MetadataError::OutputRank {
          index: 1,
          shape: proto.clone(),
        });
      }
      if proto[1] != MASK_CHANNELS as i64 && proto[1] != DYNAMIC_DIM {
        return Err(MetadataError::ProtoChannels(proto[1]));
      }
    }

    let channels = detection[1];
    let reserved = BOX_CHANNELS + if has_mask { MASK_CHANNELS } else { 0 };
    if channels <= reserved as i64 {
      return Err(MetadataError::TooFewChannels {
        channels,
        required: reserved + 1,
      });
    }
    let class_count = channels as usize - reserved;

    info!(
      "{}, 类别数: {}",
      if has_mask { "实例分割" } else { "目标检测" },
      class_count
    );

    Ok(Self {
      input_shape: input.to_vec(),
      output_shapes: outputs.to_vec(),
      input_mode,
      class_count,
      has_mask,
    })
  }

  fn input_mode(input: &[i64], stride: u32) -> Result<InputShapeMode, MetadataError> {
    if input.len() != 4 {
      return Err(MetadataError::InputRank(input.len()));
    }

    if input[1] != INPUT_CHANNELS && input[1] != DYNAMIC_DIM {
      return Err(MetadataError::InputChannels(input[1]));
    }

    match (input[2], input[3]) {
      (DYNAMIC_DIM, DYNAMIC_DIM) => {
        info!("动态输入尺寸, 步长对齐: {}", stride);
        Ok(InputShapeMode::Dynamic { stride })
      }
      (h, w) if h == DYNAMIC_DIM || w == DYNAMIC_DIM => Err(MetadataError::PartialDynamic(h, w)),
      (h, w) if h > 0 && w > 0 && h <= u32::MAX as i64 && w <= u32::MAX as i64 => {
        info!("固定输入尺寸: {}x{}", w, h);
        Ok(InputShapeMode::Fixed {
          height: h as u32,
          width: w as u32,
        })
      }
      (h, w) => Err(MetadataError::InputSize(h, w)),
    }
  }

  /// 检测张量的通道数
  pub fn detection_channels(&self) -> usize {
    BOX_CHANNELS + self.class_count + if self.has_mask { MASK_CHANNELS } else { 0 }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn detection_only_model() {
    let meta = ModelMetadata::from_shapes(&[1, 3, 640, 640], &[vec![1, 84, 8400]], 32).unwrap();
    assert_eq!(meta.class_count, 80);
    assert!(!meta.has_mask);
    assert_eq!(
      meta.input_mode,
      InputShapeMode::Fixed {
        height: 640,
        width: 640
      }
    );
    assert_eq!(meta.detection_channels(), 84);
  }

  #[test]
  fn segmentation_model() {
    let meta = ModelMetadata::from_shapes(
      &[1, 3, 640, 640],
      &[vec![1, 116, 8400], vec![1, 32, 160, 160]],
      32,
    )
    .unwrap();
    assert_eq!(meta.class_count, 80);
    assert!(meta.has_mask);
    assert_eq!(meta.detection_channels(), 116);
  }

  #[test]
  fn dynamic_input_model() {
    let meta = ModelMetadata::from_shapes(&[1, 3, -1, -1], &[vec![1, 84, -1]], 32).unwrap();
    assert_eq!(meta.input_mode, InputShapeMode::Dynamic { stride: 32 });
  }

  #[test]
  fn partially_dynamic_input_is_rejected() {
    let err = ModelMetadata::from_shapes(&[1, 3, -1, 640], &[vec![1, 84, 8400]], 32).unwrap_err();
    assert_eq!(err, MetadataError::PartialDynamic(-1, 640));
  }

  #[test]
  fn malformed_shapes_are_rejected() {
    assert_eq!(
      ModelMetadata::from_shapes(&[1, 3, 640], &[vec![1, 84, 8400]], 32).unwrap_err(),
      MetadataError::InputRank(3)
    );
    assert_eq!(
      ModelMetadata::from_shapes(&[1, 1, 640, 640], &[vec![1, 84, 8400]], 32).unwrap_err(),
      MetadataError::InputChannels(1)
    );
    assert_eq!(
      ModelMetadata::from_shapes(&[1, 3, 640, 640], &[], 32).unwrap_err(),
      MetadataError::NoOutputs
    );
    assert_eq!(
      ModelMetadata::from_shapes(&[1, 3, 640, 640], &[vec![1, 4, 8400]], 32).unwrap_err(),
      MetadataError::TooFewChannels {
        channels: 4,
        required: 5
      }
    );
    assert_eq!(
      ModelMetadata::from_shapes(
        &[1, 3, 640, 640],
        &[vec![1, 116, 8400], vec![1, 16, 160, 160]],
        32
      )
      .unwrap_err(),
      MetadataError::ProtoChannels(16)
    );
  }
}
