// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Connection reservation core.
//!
//! Outbound channels are a bounded resource. Before opening short-lived UDP,
//! short-lived TCP, or long-lived TCP channels, callers reserve capacity from
//! the [`Reservation`] manager and receive a [`ChannelCreator`] bound to the
//! reserved permits. Shutting the creator down returns the permits; shutting
//! the manager down drains all outstanding creators and completes only once
//! every permit has been returned.

mod channel_creator;
mod error;
mod metric_definitions;
mod reservation;

pub use channel_creator::ChannelCreator;
pub use error::ReserveError;
pub use reservation::{Drained, PendingReservation, Reservation};
