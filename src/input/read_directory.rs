// 该文件是 Yunhai （云海） 项目的一部分。
// src/input/read_directory.rs - 图像目录输入
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
  collections::VecDeque,
  path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::{NamedFrame, load_named_frame},
  url_local_path,
};

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

#[derive(Error, Debug)]
pub enum DirectoryInputError {
  #[error("URI 方案不匹配")]
  SchemaMismatch,
  #[error("不是目录: {0}")]
  NotADirectory(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 按扩展名判断是否为支持的图像文件（不区分大小写）
pub fn is_image_file(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| {
      IMAGE_EXTENSIONS
        .iter()
        .any(|known| ext.eq_ignore_ascii_case(known))
    })
    .unwrap_or(false)
}

/// 目录中所有图像，按文件名顺序逐张读取
///
/// 解码失败的文件会被跳过。
pub struct DirectoryInput {
  pending: VecDeque<PathBuf>,
}

impl FromUrlWithScheme for DirectoryInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryInput {
  type Error = DirectoryInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(DirectoryInputError::SchemaMismatch);
    }

    Self::open(url_local_path(url))
  }
}

impl DirectoryInput {
  pub fn open<P: AsRef<Path>>(directory: P) -> Result<Self, DirectoryInputError> {
    let directory = directory.as_ref();
    if !directory.is_dir() {
      return Err(DirectoryInputError::NotADirectory(
        directory.display().to_string(),
      ));
    }

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(directory)? {
      let path = entry?.path();
      if path.is_file() && is_image_file(&path) {
        paths.push(path);
      }
    }
    paths.sort();

    info!("目录 {} 中共有 {} 张图像", directory.display(), paths.len());

    Ok(DirectoryInput {
      pending: paths.into(),
    })
  }

  /// 尚未读取的图像数
  pub fn remaining(&self) -> usize {
    self.pending.len()
  }
}

impl Iterator for DirectoryInput {
  type Item = NamedFrame;

  fn next(&mut self) -> Option<Self::Item> {
    while let Some(path) = self.pending.pop_front() {
      match load_named_frame(&path) {
        Ok(frame) => return Some(frame),
        Err(e) => warn!("跳过无法读取的图像 {}: {}", path.display(), e),
      }
    }
    None
  }
}
