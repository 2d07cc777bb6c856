// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

/// Rejections raised at the call site, before a reservation is queued.
///
/// These indicate caller bugs; runtime conditions are delivered through the
/// reservation future instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReserveError {
    #[error("cannot reserve more short-lived udp channels ({requested}) than the configured maximum {max}")]
    UdpOverCapacity { requested: u32, max: u32 },
    #[error("cannot reserve more short-lived tcp channels ({requested}) than the configured maximum {max}")]
    TcpOverCapacity { requested: u32, max: u32 },
    #[error("cannot reserve more permanent tcp channels ({requested}) than the configured maximum {max}")]
    PermanentTcpOverCapacity { requested: u32, max: u32 },
    #[error("either a routing or a request configuration must be provided")]
    MissingConfiguration,
}
