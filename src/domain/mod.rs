// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含系统的核心业务逻辑，包括：
/// - 领域模型（models）：任务、重定向链结果与路由决策
/// - 服务（services）：重定向解析、链遍历、计数器与终止域名匹配
///
/// 领域层只依赖 `HttpEngine` 抽象，不直接接触队列或网络实现。
pub mod models;
pub mod services;
