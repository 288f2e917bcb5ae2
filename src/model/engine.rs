// 该文件是 Yunhai （云海） 项目的一部分。
// src/model/engine.rs - 推理引擎接口
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

use ndarray::{ArrayD, ArrayView4};

/// 推理引擎
///
/// 形状沿用 ONNX 约定，未指定的维度为 `-1`。
/// 输入固定为 (1, 3, H, W) 的 RGB 平面浮点数据，取值 [0, 1]。
/// 输出为一个 (1, 4 + 类别数, 锚点数) 的检测张量，
/// 分割模型额外输出一个 (1, 32, protoH, protoW) 的掩码原型张量。
pub trait InferenceEngine {
  type Error: std::error::Error + Send + Sync + 'static;

  /// 第一个输入的形状
  fn input_shape(&self) -> &[i64];

  /// 所有输出的形状，按模型声明顺序
  fn output_shapes(&self) -> &[Vec<i64>];

  /// 执行一次推理
  fn run(&self, input: ArrayView4<f32>) -> Result<Vec<ArrayD<f32>>, Self::Error>;
}
