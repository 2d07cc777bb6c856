// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

/// # Channel client options
///
/// Capacity budgets and client-side knobs for outbound channels. A copy of
/// these options is forwarded verbatim to every channel creator issued by the
/// reservation manager.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, derive_builder::Builder)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "schemars", schemars(rename = "ChannelClientOptions", default))]
#[serde(rename_all = "kebab-case")]
#[builder(default)]
pub struct ChannelClientOptions {
    /// # Maximum short-lived UDP channels
    ///
    /// Upper bound on concurrently reserved short-lived UDP channels.
    /// Reservations beyond this bound wait; requests above it are rejected.
    pub max_udp_channels: u32,

    /// # Maximum short-lived TCP channels
    ///
    /// Upper bound on concurrently reserved short-lived TCP channels.
    pub max_tcp_channels: u32,

    /// # Maximum permanent TCP channels
    ///
    /// Upper bound on concurrently reserved long-lived TCP channels.
    pub max_permanent_tcp_channels: u32,

    /// # Connect timeout
    ///
    /// Time budget for establishing a single outbound channel.
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    #[cfg_attr(feature = "schemars", schemars(with = "u64"))]
    pub connect_timeout: Duration,
}

const DEFAULT_MAX_UDP_CHANNELS: u32 = 250;
const DEFAULT_MAX_TCP_CHANNELS: u32 = 250;
const DEFAULT_MAX_PERMANENT_TCP_CHANNELS: u32 = 250;
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

impl Default for ChannelClientOptions {
    fn default() -> Self {
        Self {
            max_udp_channels: DEFAULT_MAX_UDP_CHANNELS,
            max_tcp_channels: DEFAULT_MAX_TCP_CHANNELS,
            max_permanent_tcp_channels: DEFAULT_MAX_PERMANENT_TCP_CHANNELS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// # Routing options
///
/// Parallelism of routing requests issued while resolving a peer.
#[derive(Debug, Clone, Serialize, Deserialize, derive_builder::Builder)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "schemars", schemars(rename = "RoutingOptions", default))]
#[serde(rename_all = "kebab-case")]
#[builder(default)]
pub struct RoutingOptions {
    /// # Parallel routing requests
    ///
    /// Number of routing requests kept in flight at the same time.
    pub parallel: u32,
}

impl Default for RoutingOptions {
    fn default() -> Self {
        Self { parallel: 5 }
    }
}

/// # Request options
///
/// Parallelism of peer-to-peer operation requests.
#[derive(Debug, Clone, Serialize, Deserialize, derive_builder::Builder)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "schemars", schemars(rename = "RequestOptions", default))]
#[serde(rename_all = "kebab-case")]
#[builder(default)]
pub struct RequestOptions {
    /// # Parallel operation requests
    ///
    /// Number of operation requests kept in flight at the same time.
    pub parallel: u32,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self { parallel: 3 }
    }
}

/// # Connection options
///
/// Transport selection overrides for a single operation. `force_udp` routes
/// operation requests over UDP; `force_tcp` routes routing requests over TCP.
#[derive(Debug, Clone, Default, Serialize, Deserialize, derive_builder::Builder)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[cfg_attr(feature = "schemars", schemars(rename = "ConnectionOptions", default))]
#[serde(rename_all = "kebab-case")]
#[builder(default)]
pub struct ConnectionOptions {
    /// # Force UDP
    pub force_udp: bool,

    /// # Force TCP
    pub force_tcp: bool,
}
