// 该文件是 Yunhai （云海） 项目的一部分。
// src/model/labels.rs - 类别名称表
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

#[derive(Error, Debug)]
pub enum ClassNamesError {
  #[error("读取类别文件失败: {0}")]
  Io(#[from] std::io::Error),
  #[error("类别文件为空")]
  Empty,
}

/// 按行排列的类别名称，第 i 行对应类别 i
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassNames(Box<[String]>);

impl ClassNames {
  /// 每行一个名称，行尾的 `\r` 会被去掉
  pub fn parse(text: &str) -> Result<Self, ClassNamesError> {
    let names: Vec<String> = text
      .lines()
      .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
      .collect();

    if names.is_empty() {
      return Err(ClassNamesError::Empty);
    }

    Ok(Self(names.into_boxed_slice()))
  }

  pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ClassNamesError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let names = Self::parse(&text)?;
    info!("从 {} 加载了 {} 个类别", path.display(), names.len());
    Ok(names)
  }

  pub fn get(&self, class_id: usize) -> Option<&str> {
    self.0.get(class_id).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.0.iter().map(String::as_str)
  }
}

impl<S: Into<String>> FromIterator<S> for ClassNames {
  fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
    Self(iter.into_iter().map(Into::into).collect())
  }
}
