// 该文件是 Yunhai （云海） 项目的一部分。
// src/output/directory_record.rs - 目录批量输出
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

use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::PixelFrame,
  input::NamedFrame,
  model::DetectResult,
  output::{
    Render,
    draw::{Draw, Palette},
  },
  url_local_path,
};

const DEFAULT_SUFFIX: &str = "yolov8";

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("字体错误: {0}")]
  FontError(#[from] ab_glyph::InvalidFont),
}

/// `a/b/cat.jpg` + `yolov8` -> `cat_yolov8.jpg`
pub fn output_file_name(name: &str, suffix: &str) -> String {
  let path = Path::new(name);
  let stem = path
    .file_stem()
    .map(|s| s.to_string_lossy().into_owned())
    .unwrap_or_else(|| name.to_string());

  match path.extension() {
    Some(ext) => format!("{}_{}.{}", stem, suffix, ext.to_string_lossy()),
    None => format!("{}_{}", stem, suffix),
  }
}

/// 把每帧结果保存到目录中，文件名由输入文件名加后缀得到
pub struct DirectoryRecordOutput<'a> {
  directory: PathBuf,
  suffix: String,
  draw: Draw<'a>,
  record: bool,
  skip_empty: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput<'_> {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput<'_> {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let mut output = DirectoryRecordOutput::new(url_local_path(uri))?;
    for (k, v) in uri.query_pairs() {
      match k.as_ref() {
        "suffix" if !v.is_empty() => output.suffix = v.into_owned(),
        "record" => output.record = v != "false",
        "skip_empty" => output.skip_empty = v != "false",
        _ => debug!("忽略未知参数: {}={}", k, v),
      }
    }

    Ok(output)
  }
}

impl<'a> DirectoryRecordOutput<'a> {
  pub fn new<P: Into<PathBuf>>(directory: P) -> Result<Self, DirectoryRecordOutputError> {
    Ok(DirectoryRecordOutput {
      directory: directory.into(),
      suffix: DEFAULT_SUFFIX.to_string(),
      draw: Draw::new(Palette::new(0), None)?,
      record: false,
      skip_empty: false,
    })
  }

  pub fn with_draw(mut self, draw: Draw<'a>) -> Self {
    self.draw = draw;
    self
  }

  pub fn with_suffix<S: Into<String>>(mut self, suffix: S) -> Self {
    self.suffix = suffix.into();
    self
  }

  pub fn with_record(mut self, record: bool) -> Self {
    self.record = record;
    self
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  pub fn suffix(&self) -> &str {
    &self.suffix
  }

  fn save(
    &self,
    name: &str,
    frame: &PixelFrame,
    result: &DetectResult,
  ) -> Result<(), DirectoryRecordOutputError> {
    if self.skip_empty && result.is_empty() {
      debug!("{} 没有检测结果, 跳过保存", name);
      return Ok(());
    }

    std::fs::create_dir_all(&self.directory)?;
    let path = self.directory.join(output_file_name(name, &self.suffix));

    let image = self.draw.draw_detections(&frame.to_rgb_image(), result);
    image.save(&path)?;
    info!("保存结果到: {}", path.display());

    if self.record {
      let record = self.record_json(name, frame, result);
      let record_path = path.with_extension("json");
      std::fs::write(&record_path, serde_json::to_string_pretty(&record)?)?;
      debug!("保存检测记录到: {}", record_path.display());
    }

    Ok(())
  }

  fn record_json(&self, name: &str, frame: &PixelFrame, result: &DetectResult) -> Value {
    let detections: Vec<Value> = result
      .iter()
      .map(|d| {
        json!({
          "class_id": d.class_id,
          "class_name": self.draw.class_name(d.class_id),
          "score": d.score,
          "box": [d.bbox.x, d.bbox.y, d.bbox.width, d.bbox.height],
          "mask_area": d.mask.as_ref().map(|_| d.mask_area()),
        })
      })
      .collect();

    json!({
      "image": name,
      "width": frame.width(),
      "height": frame.height(),
      "detections": detections,
    })
  }
}

impl Render<NamedFrame, DetectResult> for DirectoryRecordOutput<'_> {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &NamedFrame, result: &DetectResult) -> Result<(), Self::Error> {
    self.save(&frame.name, &frame.frame, result)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{model::Detection, utils::PixelRect};
  use image::{Rgb, RgbImage};

  #[test]
  fn output_name_keeps_extension() {
    assert_eq!(output_file_name("cat.jpg", "yolov8"), "cat_yolov8.jpg");
    assert_eq!(output_file_name("a.b.png", "seg"), "a.b_seg.png");
    assert_eq!(output_file_name("noext", "yolov8"), "noext_yolov8");
  }

  #[test]
  fn query_configures_output() {
    let url = url::Url::parse("folder:///tmp/out?suffix=seg&record&skip_empty").unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    assert_eq!(output.directory(), Path::new("/tmp/out"));
    assert_eq!(output.suffix(), "seg");
    assert!(output.record);
    assert!(output.skip_empty);
  }

  #[test]
  fn saves_image_and_json_record() {
    let dir = std::env::temp_dir().join(format!("yunhai-record-{}", std::process::id()));
    let output = DirectoryRecordOutput::new(&dir).unwrap().with_record(true);

    let frame = NamedFrame {
      name: "street.png".to_string(),
      frame: PixelFrame::from_rgb_image(RgbImage::from_pixel(64, 48, Rgb([50, 60, 70]))).unwrap(),
    };
    let result = DetectResult::from(vec![Detection {
      bbox: PixelRect::new(10, 20, 16, 8),
      score: 0.75,
      class_id: 0,
      mask: None,
    }]);

    output.render_result(&frame, &result).unwrap();

    let image = image::open(dir.join("street_yolov8.png")).unwrap();
    assert_eq!((image.width(), image.height()), (64, 48));

    let text = std::fs::read_to_string(dir.join("street_yolov8.json")).unwrap();
    let record: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(record["image"], "street.png");
    assert_eq!(record["detections"][0]["box"], json!([10, 20, 16, 8]));
    assert_eq!(record["detections"][0]["class_name"], "class0");
    assert!(record["detections"][0]["mask_area"].is_null());

    std::fs::remove_dir_all(&dir).ok();
  }

  #[test]
  fn skip_empty_writes_nothing() {
    let dir = std::env::temp_dir().join(format!("yunhai-skip-{}", std::process::id()));
    let mut output = DirectoryRecordOutput::new(&dir).unwrap();
    output.skip_empty = true;

    let frame = NamedFrame {
      name: "empty.png".to_string(),
      frame: PixelFrame::from_rgb_image(RgbImage::new(4, 4)).unwrap(),
    };
    output.render_result(&frame, &DetectResult::default()).unwrap();
    assert!(!dir.exists());
  }
}
