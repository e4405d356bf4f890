// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod match_queue_repository_test;
pub mod match_worker_test;
pub mod prefetch_buffer_test;
