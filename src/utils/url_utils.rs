// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use url::{ParseError, Url};

/// 应用商店网页地址前缀
pub const PLAY_GOOGLE_URL: &str = "http://play.google.com/store/apps/";

/// 移动应用市场协议
pub const MARKET_SCHEME: &str = "market";

/// 将可能为相对路径的URL转换为绝对路径URL
pub fn resolve_url(base_url: &Url, path: &str) -> Result<Url, ParseError> {
    base_url.join(path)
}

/// 基于字符串形式的基准URL解析相对地址
///
/// 基准URL无法解析时原样返回目标。
pub fn join_url(base: &str, target: &str) -> String {
    match Url::parse(base) {
        Ok(base_url) => resolve_url(&base_url, target)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| target.to_string()),
        Err(_) => target.to_string(),
    }
}

/// 目标是否带有协议
pub fn has_scheme(url: &str) -> bool {
    Url::parse(url).is_ok()
}

/// 目标是否为应用市场协议
pub fn is_market_url(url: &str) -> bool {
    Url::parse(url)
        .map(|u| u.scheme() == MARKET_SCHEME)
        .unwrap_or(false)
}

/// 将 `market://` 地址改写为应用商店网页地址
pub fn fix_market_url(url: &str) -> String {
    let prefix_len = MARKET_SCHEME.len() + 3;
    match url.get(..prefix_len) {
        Some(prefix) if prefix.eq_ignore_ascii_case("market://") => {
            format!("{}{}", PLAY_GOOGLE_URL, &url[prefix_len..])
        }
        _ => url.to_string(),
    }
}

/// 规范化URL
///
/// 将主机名转换为 IDNA（punycode）小写形式，路径和查询中的非ASCII字符
/// 做百分号编码。主机名无法编码时原样返回输入；`None` 输入返回 `None`。
pub fn prepare_url(url: Option<&str>) -> Option<String> {
    let url = url?;
    Some(normalize(url).unwrap_or_else(|| url.to_string()))
}

fn normalize(url: &str) -> Option<String> {
    let scheme_end = url.find("://")?;
    let (scheme, rest) = url.split_at(scheme_end);
    let rest = &rest[3..];

    let authority_end = rest.find(|c: char| matches!(c, '/' | '?' | '#')).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(authority_end);

    let (userinfo, host_port) = match authority.rfind('@') {
        Some(idx) => authority.split_at(idx + 1),
        None => ("", authority),
    };
    let (host, port) = split_port(host_port);
    if host.is_empty() {
        return None;
    }

    let host = encode_host(host)?;
    Some(format!(
        "{}://{}{}{}{}",
        scheme,
        userinfo,
        host,
        port,
        encode_non_ascii(tail)
    ))
}

fn split_port(host_port: &str) -> (&str, &str) {
    // IPv6 literals keep their brackets and are passed through.
    if host_port.starts_with('[') {
        return match host_port.find(']') {
            Some(idx) => host_port.split_at(idx + 1),
            None => (host_port, ""),
        };
    }
    match host_port.rfind(':') {
        Some(idx) => host_port.split_at(idx),
        None => (host_port, ""),
    }
}

fn encode_host(host: &str) -> Option<String> {
    if host.starts_with('[') || host.is_ascii() {
        return Some(host.to_ascii_lowercase());
    }
    let parsed = Url::parse(&format!("http://{}/", host)).ok()?;
    parsed.host_str().map(|h| h.to_string())
}

fn encode_non_ascii(tail: &str) -> String {
    let mut out = String::with_capacity(tail.len());
    let mut buf = [0u8; 4];
    for ch in tail.chars() {
        if ch.is_ascii() && ch != ' ' {
            out.push(ch);
        } else {
            out.push_str(&urlencoding::encode(ch.encode_utf8(&mut buf)));
        }
    }
    out
}
