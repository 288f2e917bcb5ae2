// 该文件是 Yunhai （云海） 项目的一部分。
// src/output/draw.rs - 检测与分割结果可视化
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

use ab_glyph::{FontRef, InvalidFont, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};

use crate::model::{ClassNames, DetectResult, Detection};

const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_PADDING: u32 = 2;
const BOX_THICKNESS: u32 = 2;
const TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
// 最终图像 = 原图 * 0.4 + 叠加层 * 0.6
const ORIGINAL_WEIGHT: f32 = 0.4;
const OVERLAY_WEIGHT: f32 = 0.6;
const GOLDEN_ANGLE: f32 = 137.507_77;

static DEFAULT_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

/// 每个类别两种颜色：前 n 个用于框和标签，后 n 个用于掩码填充
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
  class_count: usize,
  colors: Box<[Rgb<u8>]>,
}

impl Palette {
  pub fn new(class_count: usize) -> Self {
    let class_count = class_count.max(1);
    let colors = (0..2 * class_count)
      .map(|i| {
        let hue = (i as f32 * GOLDEN_ANGLE) % 360.0;
        // 掩码颜色稍暗，与框颜色区分
        let value = if i < class_count { 0.95 } else { 0.75 };
        hsv_to_rgb(hue, 0.8, value)
      })
      .collect();

    Self {
      class_count,
      colors,
    }
  }

  pub fn class_count(&self) -> usize {
    self.class_count
  }

  pub fn box_color(&self, class_id: usize) -> Rgb<u8> {
    self.colors[class_id % self.class_count]
  }

  pub fn mask_color(&self, class_id: usize) -> Rgb<u8> {
    self.colors[self.class_count + class_id % self.class_count]
  }
}

/// HSV 转 RGB
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = if h < 60.0 {
    (c, x, 0.0)
  } else if h < 120.0 {
    (x, c, 0.0)
  } else if h < 180.0 {
    (0.0, c, x)
  } else if h < 240.0 {
    (0.0, x, c)
  } else if h < 300.0 {
    (x, 0.0, c)
  } else {
    (c, 0.0, x)
  };

  Rgb([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ])
}

pub struct Draw<'a> {
  font: FontRef<'a>,
  scale: PxScale,
  names: Option<ClassNames>,
  palette: Palette,
}

impl<'a> Draw<'a> {
  /// 使用内置字体
  pub fn new(palette: Palette, names: Option<ClassNames>) -> Result<Self, InvalidFont> {
    Self::with_font(DEFAULT_FONT, palette, names)
  }

  pub fn with_font(
    font_data: &'a [u8],
    palette: Palette,
    names: Option<ClassNames>,
  ) -> Result<Self, InvalidFont> {
    Ok(Self {
      font: FontRef::try_from_slice(font_data)?,
      scale: PxScale::from(LABEL_FONT_SIZE),
      names,
      palette,
    })
  }

  /// 调色板大小取类别名称数，没有名称时取模型类别数
  pub fn for_classes(names: Option<ClassNames>, class_count: usize) -> Result<Self, InvalidFont> {
    let count = names.as_ref().map(ClassNames::len).unwrap_or(class_count);
    Self::new(Palette::new(count), names)
  }

  pub fn palette(&self) -> &Palette {
    &self.palette
  }

  pub fn names(&self) -> Option<&ClassNames> {
    self.names.as_ref()
  }

  /// 类别名称，缺失时退回类别编号
  pub fn class_name(&self, class_id: usize) -> String {
    self
      .names
      .as_ref()
      .and_then(|names| names.get(class_id))
      .map(str::to_string)
      .unwrap_or_else(|| format!("class{}", class_id))
  }

  /// 在原图副本上绘制全部结果，再与原图按权重混合
  pub fn draw_detections(&self, image: &RgbImage, result: &DetectResult) -> RgbImage {
    let mut overlay = image.clone();
    for detection in result.iter() {
      self.draw_detection(&mut overlay, detection);
    }
    blend(image, &overlay)
  }

  fn draw_detection(&self, image: &mut RgbImage, detection: &Detection) {
    let bbox = detection.bbox;
    if bbox.is_empty() {
      return;
    }

    let box_color = self.palette.box_color(detection.class_id);
    let mask_color = self.palette.mask_color(detection.class_id);

    if let Some(mask) = &detection.mask {
      for ((row, col), &on) in mask.indexed_iter() {
        let (x, y) = (bbox.x + col as u32, bbox.y + row as u32);
        if on && x < image.width() && y < image.height() {
          image.put_pixel(x, y, mask_color);
        }
      }
    }

    for t in 0..BOX_THICKNESS {
      if bbox.width <= 2 * t || bbox.height <= 2 * t {
        break;
      }
      let rect = Rect::at((bbox.x + t) as i32, (bbox.y + t) as i32)
        .of_size(bbox.width - 2 * t, bbox.height - 2 * t);
      draw_hollow_rect_mut(image, rect, box_color);
    }

    let label = format!(
      "{} {:.2}",
      self.class_name(detection.class_id),
      detection.score
    );
    let (text_w, text_h) = text_size(self.scale, &self.font, &label);
    let strip_w = text_w + 2 * LABEL_PADDING;
    let strip_h = text_h + 2 * LABEL_PADDING;
    // 框上方放不下时画在框内
    let strip_y = if bbox.y >= strip_h {
      bbox.y - strip_h
    } else {
      bbox.y
    };

    draw_filled_rect_mut(
      image,
      Rect::at(bbox.x as i32, strip_y as i32).of_size(strip_w, strip_h),
      box_color,
    );
    draw_text_mut(
      image,
      TEXT_COLOR,
      (bbox.x + LABEL_PADDING) as i32,
      (strip_y + LABEL_PADDING) as i32,
      self.scale,
      &self.font,
      &label,
    );
  }
}

fn blend(original: &RgbImage, overlay: &RgbImage) -> RgbImage {
  let mut output = original.clone();
  for (out, over) in output.pixels_mut().zip(overlay.pixels()) {
    for c in 0..3 {
      let value = ORIGINAL_WEIGHT * out[c] as f32 + OVERLAY_WEIGHT * over[c] as f32;
      out[c] = value.round().clamp(0.0, 255.0) as u8;
    }
  }
  output
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::utils::PixelRect;
  use ndarray::Array2;

  #[test]
  fn palette_is_deterministic_with_two_colors_per_class() {
    let a = Palette::new(80);
    let b = Palette::new(80);
    assert_eq!(a, b);
    assert_eq!(a.class_count(), 80);
    for id in 0..80 {
      assert_ne!(a.box_color(id), a.mask_color(id));
    }
    assert_eq!(a.box_color(81), a.box_color(1));
  }

  #[test]
  fn empty_palette_does_not_panic() {
    let palette = Palette::new(0);
    let _ = palette.box_color(3);
    let _ = palette.mask_color(3);
  }

  #[test]
  fn class_name_falls_back_to_id() {
    let names: ClassNames = ["person", "car"].into_iter().collect();
    let draw = Draw::new(Palette::new(2), Some(names)).unwrap();
    assert_eq!(draw.class_name(1), "car");
    assert_eq!(draw.class_name(7), "class7");
  }

  #[test]
  fn mask_fill_is_blended_and_background_untouched() {
    let palette = Palette::new(2);
    let mask_color = palette.mask_color(1);
    let draw = Draw::new(palette, None).unwrap();

    let image = RgbImage::new(100, 100);
    let result = DetectResult::from(vec![Detection {
      bbox: PixelRect::new(20, 40, 30, 30),
      score: 0.87,
      class_id: 1,
      mask: Some(Array2::from_elem((30, 30), true)),
    }]);

    let output = draw.draw_detections(&image, &result);
    let expected = Rgb(mask_color.0.map(|v| (OVERLAY_WEIGHT * v as f32).round() as u8));
    assert_eq!(output.get_pixel(35, 55), &expected);
    assert_eq!(output.get_pixel(90, 90), &Rgb([0, 0, 0]));
    assert_eq!(output.get_pixel(5, 5), &Rgb([0, 0, 0]));
  }

  #[test]
  fn empty_result_returns_original() {
    let draw = Draw::new(Palette::new(1), None).unwrap();
    let image = RgbImage::from_pixel(8, 8, Rgb([10, 200, 30]));
    let output = draw.draw_detections(&image, &DetectResult::default());
    assert_eq!(output, image);
  }
}
