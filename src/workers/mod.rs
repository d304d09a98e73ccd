// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 重定向工作器、工作进程池监管器和通知分发器
pub mod manager;
pub mod notification_dispatcher;
pub mod redirect_worker;
pub mod worker;

pub use worker::Worker;
