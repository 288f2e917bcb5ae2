// 该文件是 Yunhai （云海） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use std::path::Path;

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::AsPixelFrame,
  model::DetectResult,
  output::{
    Render,
    draw::{Draw, Palette},
  },
  url_local_path,
};

/// 把叠加了结果的图像保存到单个文件
pub struct SaveImageFileOutput<'a> {
  path: String,
  draw: Draw<'a>,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("字体错误: {0}")]
  FontError(#[from] ab_glyph::InvalidFont),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl FromUrlWithScheme for SaveImageFileOutput<'_> {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput<'_> {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(SaveImageFileOutput {
      path: url_local_path(uri),
      draw: Draw::new(Palette::new(0), None)?,
    })
  }
}

impl<'a> SaveImageFileOutput<'a> {
  /// 替换绘制参数（类别名称与调色板）
  pub fn with_draw(mut self, draw: Draw<'a>) -> Self {
    self.draw = draw;
    self
  }

  pub fn path(&self) -> &str {
    &self.path
  }

  fn save_image(&self, image: image::RgbImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = Path::new(&self.path).parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    image.save(&self.path)?;
    info!("保存图像到文件: {}", self.path);

    Ok(())
  }
}

impl<F: AsPixelFrame> Render<F, DetectResult> for SaveImageFileOutput<'_> {
  type Error = SaveImageFileError;

  fn render_result(&self, frame: &F, result: &DetectResult) -> Result<(), Self::Error> {
    let image = frame.as_pixel_frame().to_rgb_image();
    self.save_image(self.draw.draw_detections(&image, result))
  }
}

