// 该文件是 Yunhai （云海） 项目的一部分。
// src/frame.rs - 像素帧定义
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

use image::{ImageBuffer, Rgb, RgbImage};
use ndarray::Array4;
use thiserror::Error;

use crate::utils::FrameSize;

const RGB_CHANNELS: usize = 3;

/// 交错像素的通道顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
  #[default]
  Rgb,
  /// OpenCV 风格的 BGR 缓冲区
  Bgr,
}

#[derive(Error, Debug)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("帧尺寸无效: {0}x{1}")]
  EmptyFrame(u32, u32),
}

/// 任意尺寸的三通道交错（HWC）像素帧
#[derive(Debug, Clone)]
pub struct PixelFrame {
  width: u32,
  height: u32,
  order: ChannelOrder,
  data: Box<[u8]>,
}

impl PixelFrame {
  pub fn from_raw(
    width: u32,
    height: u32,
    order: ChannelOrder,
    data: Vec<u8>,
  ) -> Result<Self, FrameError> {
    if width == 0 || height == 0 {
      return Err(FrameError::EmptyFrame(width, height));
    }

    let expected = RGB_CHANNELS * width as usize * height as usize;
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      width,
      height,
      order,
      data: data.into_boxed_slice(),
    })
  }

  pub fn from_rgb_image(image: RgbImage) -> Result<Self, FrameError> {
    let (width, height) = image.dimensions();
    Self::from_raw(width, height, ChannelOrder::Rgb, image.into_raw())
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn size(&self) -> FrameSize {
    FrameSize::new(self.width, self.height)
  }

  pub fn order(&self) -> ChannelOrder {
    self.order
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn as_raw(&self) -> &[u8] {
    &self.data
  }

  /// 转为 RGB 图像，BGR 帧在这里交换通道
  pub fn to_rgb_image(&self) -> RgbImage {
    let width = self.width as usize;
    let data = &self.data;
    let order = self.order;

    ImageBuffer::from_fn(self.width, self.height, |x, y| {
      let idx = (y as usize * width + x as usize) * RGB_CHANNELS;
      let (a, g, b) = (data[idx], data[idx + 1], data[idx + 2]);
      match order {
        ChannelOrder::Rgb => Rgb([a, g, b]),
        ChannelOrder::Bgr => Rgb([b, g, a]),
      }
    })
  }
}

/// RGB 图像归一化到 [0, 1] 并转为 (1, 3, H, W) 平面布局
pub fn to_nchw_tensor(image: &RgbImage) -> Array4<f32> {
  let (width, height) = image.dimensions();
  let mut tensor = Array4::<f32>::zeros((1, RGB_CHANNELS, height as usize, width as usize));

  for (x, y, pixel) in image.enumerate_pixels() {
    for c in 0..RGB_CHANNELS {
      tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
    }
  }

  tensor
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn from_raw_rejects_bad_length() {
    let err = PixelFrame::from_raw(2, 2, ChannelOrder::Rgb, vec![0; 11]).unwrap_err();
    assert!(matches!(
      err,
      FrameError::LengthMismatch {
        expected: 12,
        actual: 11
      }
    ));
  }

  #[test]
  fn from_raw_rejects_empty_frame() {
    let err = PixelFrame::from_raw(0, 2, ChannelOrder::Rgb, vec![]).unwrap_err();
    assert!(matches!(err, FrameError::EmptyFrame(0, 2)));
  }

  #[test]
  fn bgr_frame_is_swapped_to_rgb() {
    let frame = PixelFrame::from_raw(1, 1, ChannelOrder::Bgr, vec![1, 2, 3]).unwrap();
    assert_eq!(frame.to_rgb_image().get_pixel(0, 0), &Rgb([3, 2, 1]));

    let frame = PixelFrame::from_raw(1, 1, ChannelOrder::Rgb, vec![1, 2, 3]).unwrap();
    assert_eq!(frame.to_rgb_image().get_pixel(0, 0), &Rgb([1, 2, 3]));
  }

  #[test]
  fn nchw_tensor_is_planar_and_normalized() {
    let mut image = RgbImage::new(2, 1);
    image.put_pixel(0, 0, Rgb([255, 0, 51]));
    image.put_pixel(1, 0, Rgb([0, 255, 102]));

    let tensor = to_nchw_tensor(&image);
    assert_eq!(tensor.shape(), &[1, 3, 1, 2]);
    assert_eq!(tensor[[0, 0, 0, 0]], 1.0);
    assert_eq!(tensor[[0, 1, 0, 1]], 1.0);
    assert!((tensor[[0, 2, 0, 0]] - 0.2).abs() < 1e-6);
    assert!((tensor[[0, 2, 0, 1]] - 0.4).abs() < 1e-6);
    assert_eq!(tensor[[0, 0, 0, 1]], 0.0);
  }
}
