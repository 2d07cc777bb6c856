// Copyright (c) 2023 - 2026 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use metrics::{Unit, describe_counter, describe_gauge};

pub const RESERVATION_ISSUED: &str = "peermesh.connection.reservations_issued.total";
pub const RESERVATION_REJECTED: &str = "peermesh.connection.reservations_rejected.total";
pub const CHANNEL_CREATOR_CLOSED: &str = "peermesh.connection.channel_creators_closed.total";
pub const RESERVATION_QUEUE_LENGTH: &str = "peermesh.connection.reservation_queue_length";

pub fn describe_metrics() {
    describe_counter!(
        RESERVATION_ISSUED,
        Unit::Count,
        "Number of channel creators issued by the reservation manager"
    );
    describe_counter!(
        RESERVATION_REJECTED,
        Unit::Count,
        "Number of reservations rejected because the manager is shutting down"
    );
    describe_counter!(
        CHANNEL_CREATOR_CLOSED,
        Unit::Count,
        "Number of channel creators shut down with their permits returned"
    );
    describe_gauge!(
        RESERVATION_QUEUE_LENGTH,
        Unit::Count,
        "Number of reservation requests waiting for the serial waiter"
    );
}
