// 该文件是 Yunhai （云海） 项目的一部分。
// src/utils/interp.rs - 双线性插值缩放
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

use ndarray::{Array2, ArrayView2};

/// 输出坐标系中的矩形区域
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roi {
  pub x: usize,
  pub y: usize,
  pub width: usize,
  pub height: usize,
}

impl Roi {
  pub fn full(height: usize, width: usize) -> Self {
    Self {
      x: 0,
      y: 0,
      width,
      height,
    }
  }

  fn clamp_to(self, height: usize, width: usize) -> Self {
    let x = self.x.min(width);
    let y = self.y.min(height);
    Self {
      x,
      y,
      width: self.width.min(width - x),
      height: self.height.min(height - y),
    }
  }
}

/// 一个输出坐标对应的两个源索引及权重
#[derive(Debug, Clone, Copy)]
struct Tap {
  index0: usize,
  index1: usize,
  weight: f32,
}

// 半像素中心对齐，边界处复制边缘像素
fn taps(src_len: usize, dst_len: usize, start: usize, count: usize) -> Vec<Tap> {
  let scale = src_len as f64 / dst_len as f64;
  let last = src_len - 1;

  (start..start + count)
    .map(|d| {
      let s = (d as f64 + 0.5) * scale - 0.5;
      let floor = s.floor();
      let (index0, weight) = if floor < 0.0 {
        (0, 0.0)
      } else if floor as usize >= last {
        (last, 0.0)
      } else {
        (floor as usize, s - floor)
      };
      Tap {
        index0,
        index1: (index0 + 1).min(last),
        weight: weight as f32,
      }
    })
    .collect()
}

/// 将 `src` 双线性缩放到 `out_height × out_width`
pub fn resize_bilinear(src: ArrayView2<f32>, out_height: usize, out_width: usize) -> Array2<f32> {
  resize_bilinear_roi(src, out_height, out_width, Roi::full(out_height, out_width))
}

/// 只计算缩放结果中 `roi` 覆盖的部分
///
/// 结果与先整幅缩放再裁剪完全一致，插值仍然基于整幅源图。
pub fn resize_bilinear_roi(
  src: ArrayView2<f32>,
  out_height: usize,
  out_width: usize,
  roi: Roi,
) -> Array2<f32> {
  let roi = roi.clamp_to(out_height, out_width);
  let (src_h, src_w) = src.dim();

  if src_h == 0 || src_w == 0 || roi.width == 0 || roi.height == 0 {
    return Array2::zeros((roi.height, roi.width));
  }

  let xs = taps(src_w, out_width, roi.x, roi.width);
  let ys = taps(src_h, out_height, roi.y, roi.height);

  Array2::from_shape_fn((roi.height, roi.width), |(r, c)| {
    let ty = ys[r];
    let tx = xs[c];
    let top = lerp(src[[ty.index0, tx.index0]], src[[ty.index0, tx.index1]], tx.weight);
    let bottom = lerp(src[[ty.index1, tx.index0]], src[[ty.index1, tx.index1]], tx.weight);
    lerp(top, bottom, ty.weight)
  })
}

// a == b 时结果严格等于 a
fn lerp(a: f32, b: f32, t: f32) -> f32 {
  a + (b - a) * t
}

#[cfg(test)]
mod tests {
  use super::*;
  use ndarray::{array, s};

  #[test]
  fn same_size_is_identity() {
    let src = array![[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]];
    let out = resize_bilinear(src.view(), 2, 3);
    assert_eq!(out, src);
  }

  #[test]
  fn upsampling_uses_half_pixel_centers() {
    let src = array![[0.0f32, 1.0]];
    let out = resize_bilinear(src.view(), 1, 4);
    let expected = [0.0f32, 0.25, 0.75, 1.0];
    for (got, want) in out.iter().zip(expected) {
      assert!((got - want).abs() < 1e-6, "{got} != {want}");
    }
  }

  #[test]
  fn roi_matches_crop_of_full_resize() {
    let src = Array2::from_shape_fn((5, 7), |(r, c)| (r * 7 + c) as f32 * 0.37);
    let full = resize_bilinear(src.view(), 23, 17);
    let roi = Roi {
      x: 3,
      y: 4,
      width: 9,
      height: 11,
    };
    let part = resize_bilinear_roi(src.view(), 23, 17, roi);
    assert_eq!(part, full.slice(s![4..15, 3..12]).to_owned());
  }

  #[test]
  fn roi_outside_output_is_clamped() {
    let src = Array2::<f32>::ones((4, 4));
    let roi = Roi {
      x: 6,
      y: 6,
      width: 10,
      height: 10,
    };
    let part = resize_bilinear_roi(src.view(), 8, 8, roi);
    assert_eq!(part.dim(), (2, 2));
    assert!(part.iter().all(|&v| (v - 1.0).abs() < 1e-6));
  }

  #[test]
  fn empty_source_yields_zeros() {
    let src = Array2::<f32>::zeros((0, 0));
    let out = resize_bilinear(src.view(), 3, 2);
    assert_eq!(out.dim(), (3, 2));
    assert!(out.iter().all(|&v| v == 0.0));
  }
}
