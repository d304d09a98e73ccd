// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 队列任务及其数据、重定向类型、链结果和路由决策
pub mod task;
