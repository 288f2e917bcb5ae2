// 该文件是 Yunhai （云海） 项目的一部分。
// src/utils.rs - 几何工具
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

pub mod interp;
pub mod letterbox;

pub use self::letterbox::{
  LetterboxOptions, LetterboxTransform, invert_box, invert_coordinates, invert_mask, letterbox,
};

/// 将数值限制在 `[lower, upper]` 区间内
pub fn clip<T: PartialOrd>(value: T, lower: T, upper: T) -> T {
  if value < lower {
    lower
  } else if value > upper {
    upper
  } else {
    value
  }
}

/// 帧尺寸（像素）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameSize {
  pub width: u32,
  pub height: u32,
}

impl FrameSize {
  pub const fn new(width: u32, height: u32) -> Self {
    Self { width, height }
  }

  pub fn area(&self) -> usize {
    self.width as usize * self.height as usize
  }

  pub fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0
  }
}

/// 浮点矩形，左上角 + 宽高，单位为推理帧像素
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RectF {
  pub left: f32,
  pub top: f32,
  pub width: f32,
  pub height: f32,
}

impl RectF {
  pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
    Self {
      left,
      top,
      width,
      height,
    }
  }

  /// 由中心点形式 (cx, cy, w, h) 构造
  pub fn from_center(cx: f32, cy: f32, width: f32, height: f32) -> Self {
    Self {
      left: cx - width / 2.0,
      top: cy - height / 2.0,
      width,
      height,
    }
  }

  pub fn right(&self) -> f32 {
    self.left + self.width
  }

  pub fn bottom(&self) -> f32 {
    self.top + self.height
  }

  pub fn area(&self) -> f32 {
    self.width.max(0.0) * self.height.max(0.0)
  }

  /// 交并比
  pub fn iou(&self, other: &RectF) -> f32 {
    let left = self.left.max(other.left);
    let top = self.top.max(other.top);
    let right = self.right().min(other.right());
    let bottom = self.bottom().min(other.bottom());

    let intersection = (right - left).max(0.0) * (bottom - top).max(0.0);
    let union = self.area() + other.area() - intersection;

    if union > 0.0 {
      intersection / union
    } else {
      0.0
    }
  }
}

/// 原图坐标系下的整数像素矩形
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct PixelRect {
  pub x: u32,
  pub y: u32,
  pub width: u32,
  pub height: u32,
}

impl PixelRect {
  pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }

  pub fn right(&self) -> u32 {
    self.x + self.width
  }

  pub fn bottom(&self) -> u32 {
    self.y + self.height
  }

  pub fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0
  }
}
