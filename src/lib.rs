// 该文件是 Yunhai （云海） 项目的一部分。
// src/lib.rs - 库主文件
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

pub mod frame;
pub mod input;
pub mod model;
pub mod output;
pub mod task;
pub mod utils;

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

pub trait FromUrlWithScheme: FromUrl {
  const SCHEME: &'static str;
}

/// 从 URL 中取出解码后的本地路径
///
/// `url.path()` 保留了百分号编码，含空格或中文的路径需要先解码。
/// `image://data/a.jpg` 这类相对路径会被解析为主机名 `data`，这里拼回去。
pub fn url_local_path(url: &url::Url) -> String {
  let raw = match url.host_str() {
    Some(host) if !host.is_empty() => format!("{}{}", host, url.path()),
    _ => url.path().to_string(),
  };
  match urlencoding::decode(&raw) {
    Ok(decoded) => decoded.into_owned(),
    Err(_) => raw,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn url_local_path_decodes_absolute_and_relative_paths() {
    let url = url::Url::parse("image:///tmp/my%20photo.jpg").unwrap();
    assert_eq!(url_local_path(&url), "/tmp/my photo.jpg");

    let url = url::Url::parse("folder://data/out").unwrap();
    assert_eq!(url_local_path(&url), "data/out");
  }
}
