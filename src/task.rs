// 该文件是 Yunhai （云海） 项目的一部分。
// src/task.rs - 推理任务
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

use std::{
  sync::mpsc::{Receiver, channel},
  time::{Duration, Instant},
};
use tracing::{info, warn};

use crate::{model::Model, output::Render};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

pub struct OneShotTask;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = Instant::now();
    let result = model.infer(&frame)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&frame, &result)?;
    info!("渲染完成，总耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 对同一帧重复推理，统计平均耗时
#[derive(Debug, Clone, Copy)]
pub struct RepeatShotTask {
  repeat: usize,
  warmup: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self {
      repeat: 100,
      warmup: 2,
    }
  }
}

impl RepeatShotTask {
  pub fn new(repeat: usize) -> Self {
    Self {
      repeat,
      ..Default::default()
    }
  }

  pub fn with_warmup(mut self, warmup: usize) -> Self {
    self.warmup = warmup;
    self
  }
}

/// 去掉前 `warmup` 次后的平均耗时
pub fn average_excluding_warmup(times: &[Duration], warmup: usize) -> Option<Duration> {
  let measured = times.get(warmup..)?;
  if measured.is_empty() {
    return None;
  }
  Some(measured.iter().sum::<Duration>() / measured.len() as u32)
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for RepeatShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理 {} 次...", self.repeat);

    let mut times = Vec::with_capacity(self.repeat);
    let mut last = None;
    for i in 0..self.repeat {
      let now = Instant::now();
      let result = model.infer(&frame)?;
      let elapsed = now.elapsed();
      info!("({})推理完成，耗时: {:.2?}", i, elapsed);
      times.push(elapsed);
      last = Some(result);
    }

    if let Some(result) = last {
      output.render_result(&frame, &result)?;
    }

    match average_excluding_warmup(&times, self.warmup) {
      Some(average) => warn!(
        "平均推理时间: {:.2?}（排除前 {} 次预热）",
        average, self.warmup
      ),
      None => warn!("推理次数不足, 无法统计平均时间"),
    }

    Ok(())
  }
}

/// 批量处理所有输入帧
///
/// 单帧推理失败只记录并跳过，渲染失败终止任务。
#[derive(Default, Debug)]
pub struct BatchTask {
  interruptible: bool,
}

impl BatchTask {
  /// 收到 Ctrl-C 后在当前帧结束时停止
  pub fn interruptible(mut self, interruptible: bool) -> Self {
    self.interruptible = interruptible;
    self
  }

  fn interrupt_signal(&self) -> Option<Receiver<()>> {
    if !self.interruptible {
      return None;
    }

    let (tx, rx) = channel();
    match ctrlc::set_handler(move || {
      info!("收到中断信号，处理完当前图像后退出...");
      let _ = tx.send(());
    }) {
      Ok(()) => Some(rx),
      Err(e) => {
        warn!("无法设置 Ctrl-C 处理器: {}", e);
        None
      }
    }
  }
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for BatchTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始批量任务...");
    let interrupt = self.interrupt_signal();

    let mut processed = 0usize;
    let mut failed = 0usize;
    let mut total = Duration::ZERO;

    for (index, frame) in input.enumerate() {
      let now = Instant::now();
      let result = match model.infer(&frame) {
        Ok(result) => result,
        Err(e) => {
          warn!("第 {} 张图像推理失败, 跳过: {}", index + 1, e);
          failed += 1;
          continue;
        }
      };
      let elapsed = now.elapsed();
      total += elapsed;
      processed += 1;
      info!("第 {} 张图像推理完成，耗时: {:.2?}", index + 1, elapsed);

      output.render_result(&frame, &result)?;

      if interrupt.as_ref().is_some_and(|rx| rx.try_recv().is_ok()) {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("共处理 {} 张图像, 失败 {} 张", processed, failed);
    if processed > 0 {
      info!(
        "总推理时间: {:.2?}, 平均: {:.2?}",
        total,
        total / processed as u32
      );
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::RefCell;

  #[derive(Debug, thiserror::Error)]
  #[error("模拟错误")]
  struct MockError;

  /// 输入为负数时推理失败，否则输出两倍
  struct Doubler;

  impl Model for Doubler {
    type Input = i32;
    type Output = i32;
    type Error = MockError;

    fn infer(&self, input: &i32) -> Result<i32, MockError> {
      if *input < 0 { Err(MockError) } else { Ok(input * 2) }
    }
  }

  #[derive(Default)]
  struct Collect {
    seen: RefCell<Vec<(i32, i32)>>,
    fail_on: Option<i32>,
  }

  impl Render<i32, i32> for &Collect {
    type Error = MockError;

    fn render_result(&self, frame: &i32, result: &i32) -> Result<(), MockError> {
      if self.fail_on == Some(*frame) {
        return Err(MockError);
      }
      self.seen.borrow_mut().push((*frame, *result));
      Ok(())
    }
  }

  #[test]
  fn oneshot_renders_first_frame_only() {
    let sink = Collect::default();
    OneShotTask
      .run_task(vec![3, 4].into_iter(), Doubler, &sink)
      .unwrap();
    assert_eq!(*sink.seen.borrow(), [(3, 6)]);
  }

  #[test]
  fn oneshot_without_input_fails() {
    let sink = Collect::default();
    assert!(
      OneShotTask
        .run_task(Vec::<i32>::new().into_iter(), Doubler, &sink)
        .is_err()
    );
  }

  #[test]
  fn repeatshot_renders_once() {
    let sink = Collect::default();
    RepeatShotTask::new(5)
      .run_task(vec![7].into_iter(), Doubler, &sink)
      .unwrap();
    assert_eq!(*sink.seen.borrow(), [(7, 14)]);
  }

  #[test]
  fn batch_skips_failed_inference() {
    let sink = Collect::default();
    BatchTask::default()
      .run_task(vec![1, -2, 3].into_iter(), Doubler, &sink)
      .unwrap();
    assert_eq!(*sink.seen.borrow(), [(1, 2), (3, 6)]);
  }

  #[test]
  fn batch_stops_on_render_failure() {
    let sink = Collect {
      fail_on: Some(3),
      ..Default::default()
    };
    let result = BatchTask::default().run_task(vec![1, 3, 5].into_iter(), Doubler, &sink);
    assert!(result.is_err());
    assert_eq!(*sink.seen.borrow(), [(1, 2)]);
  }

  #[test]
  fn warmup_runs_are_excluded_from_average() {
    let times = [
      Duration::from_millis(100),
      Duration::from_millis(50),
      Duration::from_millis(10),
      Duration::from_millis(20),
    ];
    assert_eq!(
      average_excluding_warmup(&times, 2),
      Some(Duration::from_millis(15))
    );
    assert_eq!(average_excluding_warmup(&times, 4), None);
    assert_eq!(average_excluding_warmup(&times, 9), None);
  }
}
