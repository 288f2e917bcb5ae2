// 该文件是 Yunhai （云海） 项目的一部分。
// src/utils/letterbox.rs - 等比缩放填充及其逆变换
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

use image::{Rgb, RgbImage, imageops};
use ndarray::{Array2, ArrayView2, s};
use tracing::debug;

use super::{
  FrameSize, PixelRect, RectF, clip,
  interp::{Roi, resize_bilinear_roi},
};

const DEFAULT_PAD_COLOR: [u8; 3] = [114, 114, 114];
const DEFAULT_STRIDE: u32 = 32;

/// letterbox 参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LetterboxOptions {
  /// 填充颜色
  pub pad_color: [u8; 3],
  /// 填充量对 `stride` 取模，输出尺寸只需对齐步长
  pub allow_modulo_pad: bool,
  /// 不保持宽高比，直接拉伸铺满目标尺寸
  pub stretch_fill: bool,
  /// 允许放大
  pub allow_upscale: bool,
  /// 网络步长
  pub stride: u32,
}

impl Default for LetterboxOptions {
  fn default() -> Self {
    Self {
      pad_color: DEFAULT_PAD_COLOR,
      allow_modulo_pad: true,
      stretch_fill: false,
      allow_upscale: true,
      stride: DEFAULT_STRIDE,
    }
  }
}

/// 一次 letterbox 的缩放比例与填充量
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxTransform {
  /// (宽方向, 高方向) 缩放比例，非拉伸模式下两者相等
  pub ratio: (f32, f32),
  pub pad_left: u32,
  pub pad_top: u32,
  pub pad_right: u32,
  pub pad_bottom: u32,
  /// 原图尺寸
  pub source: FrameSize,
  /// 缩放后、填充前的尺寸
  pub unpadded: FrameSize,
}

impl LetterboxTransform {
  /// 只计算变换参数，不触碰像素
  pub fn plan(source: FrameSize, target: FrameSize, options: &LetterboxOptions) -> Self {
    let (sw, sh) = (source.width.max(1) as f32, source.height.max(1) as f32);
    let (tw, th) = (target.width as f32, target.height as f32);

    let mut r = (th / sh).min(tw / sw);
    if !options.allow_upscale {
      r = r.min(1.0);
    }

    let mut ratio = (r, r);
    let mut unpadded = FrameSize::new(
      ((sw * r).round() as u32).max(1),
      ((sh * r).round() as u32).max(1),
    );

    let mut dw = target.width.saturating_sub(unpadded.width);
    let mut dh = target.height.saturating_sub(unpadded.height);

    if options.stretch_fill {
      dw = 0;
      dh = 0;
      unpadded = target;
      ratio = (tw / sw, th / sh);
    } else if options.allow_modulo_pad && options.stride > 0 {
      dw %= options.stride;
      dh %= options.stride;
    }

    // 奇数填充时多出的一像素放在右/下
    let pad_left = dw / 2;
    let pad_top = dh / 2;

    Self {
      ratio,
      pad_left,
      pad_top,
      pad_right: dw - pad_left,
      pad_bottom: dh - pad_top,
      source,
      unpadded,
    }
  }

  /// 填充后的输出尺寸
  pub fn output_size(&self) -> FrameSize {
    FrameSize::new(
      self.unpadded.width + self.pad_left + self.pad_right,
      self.unpadded.height + self.pad_top + self.pad_bottom,
    )
  }

  /// 原图坐标映射到推理帧坐标
  pub fn forward_rect(&self, rect: RectF) -> RectF {
    RectF {
      left: rect.left * self.ratio.0 + self.pad_left as f32,
      top: rect.top * self.ratio.1 + self.pad_top as f32,
      width: rect.width * self.ratio.0,
      height: rect.height * self.ratio.1,
    }
  }
}

/// 等比缩放并在两侧填充到目标尺寸
pub fn letterbox(
  image: &RgbImage,
  target: FrameSize,
  options: &LetterboxOptions,
) -> (RgbImage, LetterboxTransform) {
  let source = FrameSize::new(image.width(), image.height());
  let transform = LetterboxTransform::plan(source, target, options);
  let output = transform.output_size();

  debug!(
    "letterbox: {}x{} -> {}x{}, 填充 (左 {}, 上 {}, 右 {}, 下 {})",
    source.width,
    source.height,
    output.width,
    output.height,
    transform.pad_left,
    transform.pad_top,
    transform.pad_right,
    transform.pad_bottom
  );

  let mut canvas = RgbImage::from_pixel(output.width, output.height, Rgb(options.pad_color));
  let (x, y) = (transform.pad_left as i64, transform.pad_top as i64);

  if transform.unpadded != source {
    let resized = imageops::resize(
      image,
      transform.unpadded.width,
      transform.unpadded.height,
      imageops::FilterType::Triangle,
    );
    imageops::replace(&mut canvas, &resized, x, y);
  } else {
    imageops::replace(&mut canvas, image, x, y);
  }

  (canvas, transform)
}

/// 由两帧尺寸重新推导出的逆变换参数
#[derive(Debug, Clone, Copy, PartialEq)]
struct InverseParams {
  gain: f32,
  pad_left: u32,
  pad_top: u32,
  /// 推理帧中有效（非填充）区域的尺寸
  unpadded: FrameSize,
}

// 取整与拆分方式必须和 LetterboxTransform::plan 一致
fn inverse_params(resized: FrameSize, original: FrameSize) -> InverseParams {
  let (rw, rh) = (resized.width as f32, resized.height as f32);
  let (ow, oh) = (original.width.max(1) as f32, original.height.max(1) as f32);

  let gain = (rh / oh).min(rw / ow);
  let unpadded = FrameSize::new(
    ((ow * gain).round() as u32).max(1).min(resized.width),
    ((oh * gain).round() as u32).max(1).min(resized.height),
  );

  InverseParams {
    gain,
    pad_left: (resized.width - unpadded.width) / 2,
    pad_top: (resized.height - unpadded.height) / 2,
    unpadded,
  }
}

/// 推理帧中的框映射回原图，越界部分被截断
pub fn invert_box(rect: RectF, resized: FrameSize, original: FrameSize) -> PixelRect {
  let params = inverse_params(resized, original);
  let gain = params.gain;
  let (ow, oh) = (original.width as i64, original.height as i64);

  let x = clip(((rect.left - params.pad_left as f32) / gain).round() as i64, 0, ow);
  let y = clip(((rect.top - params.pad_top as f32) / gain).round() as i64, 0, oh);
  let width = clip((rect.width / gain).round() as i64, 0, ow - x);
  let height = clip((rect.height / gain).round() as i64, 0, oh - y);

  PixelRect::new(x as u32, y as u32, width as u32, height as u32)
}

/// 推理帧大小的概率掩码映射到原图中的 `rect` 区域并二值化
///
/// 先去掉填充区，再把有效区整体缩放到原图尺寸，最后裁出框内部分。
/// 像素概率严格大于 `threshold` 才算前景。
pub fn invert_mask(
  mask: ArrayView2<f32>,
  threshold: f32,
  resized: FrameSize,
  original: FrameSize,
  rect: PixelRect,
) -> Array2<bool> {
  let params = inverse_params(resized, original);
  let (mh, mw) = mask.dim();

  // 奇数填充时右/下多出的一行一列同样要去掉
  let y0 = (params.pad_top as usize).min(mh);
  let y1 = ((params.pad_top + params.unpadded.height) as usize).clamp(y0, mh);
  let x0 = (params.pad_left as usize).min(mw);
  let x1 = ((params.pad_left + params.unpadded.width) as usize).clamp(x0, mw);
  let valid = mask.slice(s![y0..y1, x0..x1]);

  let roi = Roi {
    x: rect.x as usize,
    y: rect.y as usize,
    width: rect.width as usize,
    height: rect.height as usize,
  };
  let probability = resize_bilinear_roi(
    valid,
    original.height as usize,
    original.width as usize,
    roi,
  );

  probability.mapv(|p| p > threshold)
}

/// 同时逆变换框与掩码
pub fn invert_coordinates(
  rect: RectF,
  mask: Option<ArrayView2<f32>>,
  mask_threshold: f32,
  resized: FrameSize,
  original: FrameSize,
) -> (PixelRect, Option<Array2<bool>>) {
  let pixel_rect = invert_box(rect, resized, original);
  let mask = mask.map(|m| invert_mask(m, mask_threshold, resized, original, pixel_rect));
  (pixel_rect, mask)
}
