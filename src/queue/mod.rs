// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 队列模块
///
/// 提供具名队列通道（tube）的抽象及其 Redis 与内存实现
pub mod memory;
pub mod redis_tube;
pub mod tube;
