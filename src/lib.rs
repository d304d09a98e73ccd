// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含任务模型、重定向解析与链遍历
pub mod domain;

/// 引擎模块
///
/// 单跳HTTP抓取与网络可达性探测
pub mod engines;

/// 基础设施模块
///
/// 指标导出
pub mod infrastructure;

/// 队列模块
///
/// 队列通道抽象及其实现
pub mod queue;

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
pub mod utils;

/// 工作器模块
///
/// 重定向工作器、进程池监管和通知分发
pub mod workers;
