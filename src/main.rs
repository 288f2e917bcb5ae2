// 该文件是 Yunhai （云海） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use yunhai::{
  input::{DirectoryInput, NamedFrame},
  model::{ClassNames, Yolov8Builder},
  output::{DirectoryRecordOutput, draw::Draw},
  task::{BatchTask, Task},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("模型文件路径: {}", args.model.display());
  info!("输入目录: {}", args.input.display());
  info!("输出目录: {}", args.output.display());
  info!(
    "置信度阈值: {}, NMS 阈值: {}, 掩码阈值: {}",
    args.confidence, args.iou, args.mask
  );

  let model = Yolov8Builder::new(args.model.to_string_lossy())
    .conf_threshold(args.confidence)
    .iou_threshold(args.iou)
    .mask_threshold(args.mask)
    .gpu(args.gpu)
    .build::<NamedFrame>()?;

  let names = match &args.class_names {
    Some(path) => {
      let names = ClassNames::load(path)?;
      model.ensure_class_count(&names)?;
      Some(names)
    }
    None => None,
  };

  let input = DirectoryInput::open(&args.input)?;
  info!("共找到 {} 张图像", input.remaining());

  let output = DirectoryRecordOutput::new(&args.output)?
    .with_suffix(args.suffix)
    .with_record(args.record)
    .with_draw(Draw::for_classes(names, model.class_count())?);

  BatchTask::default()
    .interruptible(true)
    .run_task(input, model, output)?;

  Ok(())
}
