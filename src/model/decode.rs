// 该文件是 Yunhai （云海） 项目的一部分。
// src/model/decode.rs - YOLOv8 输出解码
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

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayView3, ArrayViewD, Axis, Ix2, Ix3, s};
use thiserror::Error;
use tracing::debug;

use crate::{
  model::{
    Detection,
    metadata::{BOX_CHANNELS, MASK_CHANNELS},
  },
  utils::{FrameSize, RectF, interp::resize_bilinear, invert_coordinates},
};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
  #[error("检测张量形状无效: {0:?}")]
  DetectionShape(Vec<usize>),
  #[error("检测张量通道数不足: 需要 {required}, 实际 {actual}")]
  TooFewChannels { required: usize, actual: usize },
  #[error("分割模型缺少掩码原型输出")]
  MissingProtos,
  #[error("掩码原型张量形状无效: {0:?}")]
  ProtoShape(Vec<usize>),
}

/// 解码参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeConfig {
  pub conf_threshold: f32,
  pub iou_threshold: f32,
  pub mask_threshold: f32,
  pub class_count: usize,
  pub has_mask: bool,
}

/// 通过置信度过滤、尚未经过 NMS 的候选
#[derive(Debug, Clone)]
struct RawCandidate {
  rect: RectF,
  score: f32,
  class_id: usize,
  coefficients: Option<Array1<f32>>,
}

/// 从一行检测数据中找出得分最高的类别
///
/// 并列时取下标最小的类别。返回 (得分, 类别下标)。
pub fn parse_row(row: ArrayView1<f32>, class_count: usize) -> (f32, usize) {
  let scores = row.slice(s![BOX_CHANNELS..BOX_CHANNELS + class_count]);

  let mut best = (f32::NEG_INFINITY, 0);
  for (class_id, &score) in scores.iter().enumerate() {
    if score > best.0 {
      best = (score, class_id);
    }
  }
  best
}

/// 解码模型原始输出
///
/// `detections` 形状为 (1, C, N) 或 (C, N)，`protos` 形状为 (1, 32, pH, pW) 或 (32, pH, pW)。
/// `resized` 为送入模型的帧尺寸，`original` 为原图尺寸。
/// 返回的检测结果按置信度降序排列，坐标位于原图坐标系。
pub fn decode(
  detections: ArrayViewD<f32>,
  protos: Option<ArrayViewD<f32>>,
  config: &DecodeConfig,
  resized: FrameSize,
  original: FrameSize,
) -> Result<Vec<Detection>, DecodeError> {
  let output = squeeze_detections(detections)?;

  let required =
    BOX_CHANNELS + config.class_count + if config.has_mask { MASK_CHANNELS } else { 0 };
  if output.nrows() < required {
    return Err(DecodeError::TooFewChannels {
      required,
      actual: output.nrows(),
    });
  }

  let protos = if config.has_mask {
    Some(squeeze_protos(protos.ok_or(DecodeError::MissingProtos)?)?)
  } else {
    None
  };

  // (C, N) -> (N, C)，每行一个锚点
  let rows = output.reversed_axes();
  let candidates = collect_candidates(rows, config);
  debug!("置信度过滤后候选数: {}", candidates.len());

  let kept = non_max_suppression(candidates, config.iou_threshold);
  debug!("NMS 后保留: {}", kept.len());

  let detections = kept
    .into_iter()
    .map(|candidate| {
      let probability = match (&protos, &candidate.coefficients) {
        (Some(protos), Some(coefficients)) => {
          Some(reconstruct_mask(coefficients.view(), protos.view(), resized))
        }
        _ => None,
      };
      let (bbox, mask) = invert_coordinates(
        candidate.rect,
        probability.as_ref().map(|p| p.view()),
        config.mask_threshold,
        resized,
        original,
      );
      Detection {
        bbox,
        score: candidate.score,
        class_id: candidate.class_id,
        mask,
      }
    })
    .collect();

  Ok(detections)
}

fn squeeze_detections(tensor: ArrayViewD<f32>) -> Result<ArrayView2<f32>, DecodeError> {
  let shape = tensor.shape().to_vec();
  let tensor = match shape.len() {
    3 if shape[0] == 1 => tensor.index_axis_move(Axis(0), 0),
    2 => tensor,
    _ => return Err(DecodeError::DetectionShape(shape)),
  };
  tensor
    .into_dimensionality::<Ix2>()
    .map_err(|_| DecodeError::DetectionShape(shape))
}

fn squeeze_protos(tensor: ArrayViewD<f32>) -> Result<ArrayView3<f32>, DecodeError> {
  let shape = tensor.shape().to_vec();
  let tensor = match shape.len() {
    4 if shape[0] == 1 => tensor.index_axis_move(Axis(0), 0),
    3 => tensor,
    _ => return Err(DecodeError::ProtoShape(shape)),
  };
  let tensor = tensor
    .into_dimensionality::<Ix3>()
    .map_err(|_| DecodeError::ProtoShape(shape.clone()))?;
  if tensor.len_of(Axis(0)) != MASK_CHANNELS {
    return Err(DecodeError::ProtoShape(shape));
  }
  Ok(tensor)
}

fn collect_candidates(rows: ArrayView2<f32>, config: &DecodeConfig) -> Vec<RawCandidate> {
  let coefficient_start = BOX_CHANNELS + config.class_count;

  rows
    .outer_iter()
    .filter_map(|row| {
      let (score, class_id) = parse_row(row, config.class_count);
      if score <= config.conf_threshold {
        return None;
      }

      let coefficients = config
        .has_mask
        .then(|| row.slice(s![coefficient_start..coefficient_start + MASK_CHANNELS]).to_owned());

      Some(RawCandidate {
        rect: RectF::from_center(row[0], row[1], row[2], row[3]),
        score,
        class_id,
        coefficients,
      })
    })
    .collect()
}

// 不区分类别；与任一已保留框 IoU 超过阈值即被抑制
fn non_max_suppression(mut candidates: Vec<RawCandidate>, iou_threshold: f32) -> Vec<RawCandidate> {
  candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

  let mut kept: Vec<RawCandidate> = Vec::with_capacity(candidates.len());
  for candidate in candidates {
    if kept
      .iter()
      .all(|k| k.rect.iou(&candidate.rect) <= iou_threshold)
    {
      kept.push(candidate);
    }
  }
  kept
}

/// 掩码系数与原型线性组合，经 sigmoid 后缩放到推理帧尺寸
pub fn reconstruct_mask(
  coefficients: ArrayView1<f32>,
  protos: ArrayView3<f32>,
  frame: FrameSize,
) -> Array2<f32> {
  let (_, proto_h, proto_w) = protos.dim();

  let mut mask = Array2::<f32>::zeros((proto_h, proto_w));
  for (proto, &weight) in protos.outer_iter().zip(coefficients.iter()) {
    mask.scaled_add(weight, &proto);
  }
  mask.mapv_inplace(|v| 1.0 / (1.0 + (-v).exp()));

  resize_bilinear(mask.view(), frame.height as usize, frame.width as usize)
}
