// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理应用程序的配置设置，包括队列通道、工作进程、监管器、推送器和匹配模式等配置
pub mod settings;
