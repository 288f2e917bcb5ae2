// 该文件是 Yunhai （云海） 项目的一部分。
// src/args.rs - 批量推理程序参数
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

use std::path::PathBuf;

use clap::Parser;

/// Yunhai YOLOv8 批量推理
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// ONNX 模型文件路径
  #[arg(long, value_name = "FILE")]
  pub model: PathBuf,

  /// 输入图像目录（jpg/jpeg/png/gif）
  #[arg(long, value_name = "DIR")]
  pub input: PathBuf,

  /// 输出目录
  #[arg(long, value_name = "DIR")]
  pub output: PathBuf,

  /// 类别名称文件，每行一个
  #[arg(long, value_name = "FILE")]
  pub class_names: Option<PathBuf>,

  /// 输出文件名后缀
  #[arg(long, default_value = "yolov8")]
  pub suffix: String,

  /// 使用 GPU 推理
  #[arg(long)]
  pub gpu: bool,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = 0.4, value_name = "THRESHOLD")]
  pub confidence: f32,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = 0.4, value_name = "THRESHOLD")]
  pub iou: f32,

  /// 掩码阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = 0.5, value_name = "THRESHOLD")]
  pub mask: f32,

  /// 同时保存 JSON 检测记录
  #[arg(long)]
  pub record: bool,
}
