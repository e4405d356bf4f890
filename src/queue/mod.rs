// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 队列模块
///
/// 提供租约领取、内存预取缓冲和延迟确认功能
pub mod completion_tracker;
pub mod error;
pub mod lease_manager;
pub mod prefetch_buffer;

pub use error::QueueError;
