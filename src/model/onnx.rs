// 该文件是 Yunhai （云海） 项目的一部分。
// src/model/onnx.rs - ONNX Runtime 推理引擎
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

use std::{path::Path, sync::Mutex};

use ndarray::{ArrayD, ArrayView4, IxDyn};
use ort::{
  session::Session,
  value::{TensorRef, ValueType},
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::InferenceEngine;

#[derive(Error, Debug)]
pub enum OnnxEngineError {
  #[error("模型文件不存在: {0}")]
  ModelNotFound(String),
  #[error("ONNX Runtime 错误: {0}")]
  Ort(#[from] ort::Error),
  #[error("模型没有输入")]
  NoInput,
  #[error("{0} 不是张量")]
  NotTensor(String),
  #[error("输出张量形状错误: {0}")]
  Shape(#[from] ndarray::ShapeError),
  #[error("推理会话锁已损坏")]
  Poisoned,
}

/// 基于 ONNX Runtime 会话的推理引擎
///
/// `Session::run` 需要可变借用，会话放在互斥锁里以便通过 `&self` 推理。
pub struct OnnxEngine {
  session: Mutex<Session>,
  input_name: String,
  input_shape: Vec<i64>,
  output_names: Vec<String>,
  output_shapes: Vec<Vec<i64>>,
}

impl OnnxEngine {
  pub fn load<P: AsRef<Path>>(path: P, gpu: bool) -> Result<Self, OnnxEngineError> {
    let path = path.as_ref();
    if !path.exists() {
      return Err(OnnxEngineError::ModelNotFound(path.display().to_string()));
    }

    let mut builder = Session::builder()?;
    if gpu {
      builder = Self::with_gpu(builder)?;
    } else {
      info!("使用 CPU 推理");
    }

    info!("加载 ONNX 模型: {}", path.display());
    let session = builder.commit_from_file(path)?;

    let input = session.inputs.first().ok_or(OnnxEngineError::NoInput)?;
    let input_name = input.name.clone();
    let input_shape = tensor_shape(&input.name, &input.input_type)?;
    debug!("模型输入 {}: {:?}", input_name, input_shape);

    let mut output_names = Vec::with_capacity(session.outputs.len());
    let mut output_shapes = Vec::with_capacity(session.outputs.len());
    for output in &session.outputs {
      let shape = tensor_shape(&output.name, &output.output_type)?;
      debug!("模型输出 {}: {:?}", output.name, shape);
      output_names.push(output.name.clone());
      output_shapes.push(shape);
    }

    Ok(Self {
      session: Mutex::new(session),
      input_name,
      input_shape,
      output_names,
      output_shapes,
    })
  }

  #[cfg(feature = "cuda")]
  fn with_gpu(
    builder: ort::session::builder::SessionBuilder,
  ) -> Result<ort::session::builder::SessionBuilder, OnnxEngineError> {
    use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};

    let cuda = CUDAExecutionProvider::default();
    match cuda.is_available() {
      Ok(true) => {
        info!("使用 CUDA 推理");
        Ok(builder.with_execution_providers([cuda.build()])?)
      }
      _ => {
        warn!("CUDA 不可用, 回退到 CPU 推理");
        Ok(builder)
      }
    }
  }

  #[cfg(not(feature = "cuda"))]
  fn with_gpu(
    builder: ort::session::builder::SessionBuilder,
  ) -> Result<ort::session::builder::SessionBuilder, OnnxEngineError> {
    warn!("未启用 cuda 特性, 回退到 CPU 推理");
    Ok(builder)
  }

  pub fn input_name(&self) -> &str {
    &self.input_name
  }

  pub fn output_names(&self) -> &[String] {
    &self.output_names
  }
}

fn tensor_shape(name: &str, value_type: &ValueType) -> Result<Vec<i64>, OnnxEngineError> {
  match value_type {
    ValueType::Tensor { shape, .. } => Ok(shape.iter().copied().collect()),
    _ => Err(OnnxEngineError::NotTensor(name.to_string())),
  }
}

impl InferenceEngine for OnnxEngine {
  type Error = OnnxEngineError;

  fn input_shape(&self) -> &[i64] {
    &self.input_shape
  }

  fn output_shapes(&self) -> &[Vec<i64>] {
    &self.output_shapes
  }

  fn run(&self, input: ArrayView4<f32>) -> Result<Vec<ArrayD<f32>>, Self::Error> {
    let input = input.as_standard_layout();
    let tensor = TensorRef::from_array_view(&input)?;

    let mut session = self.session.lock().map_err(|_| OnnxEngineError::Poisoned)?;
    let outputs = session.run(ort::inputs![self.input_name.as_str() => tensor])?;

    self
      .output_names
      .iter()
      .map(|name| {
        let (shape, data) = outputs[name.as_str()].try_extract_tensor::<f32>()?;
        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        Ok(ArrayD::from_shape_vec(IxDyn(&dims), data.to_vec())?)
      })
      .collect()
  }
}
