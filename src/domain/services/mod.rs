// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含的服务：
/// - 计数器注册表（counter_registry）：按名称匹配统计服务的URL特征
/// - 终止域名（terminal_domains）：命中即停止跟踪的URL模式
/// - 重定向解析器（redirect_resolver）：单跳抓取与分类
/// - 历史遍历器（history_walker）：逐跳构建有上限的重定向链
pub mod counter_registry;
pub mod history_walker;
pub mod redirect_resolver;
pub mod terminal_domains;
