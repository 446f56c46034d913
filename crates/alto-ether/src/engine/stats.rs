// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::fmt;

/// Gateway traffic counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GatewayStats {
    /// Receive completions handed to the decoder.
    pub frames_received: u64,
    /// Receives rejected by the decoder.
    pub bad_frames: u64,
    /// Decoded frames sent out over UDP.
    pub frames_relayed: u64,
    /// UDP sends that failed.
    pub relay_failures: u64,
    pub datagrams_received: u64,
    /// Datagrams that never made it to the transmit buffer.
    pub datagrams_dropped: u64,
    pub frames_transmitted: u64,
    /// Transmit completions other than output-complete.
    pub transmit_failures: u64,
    /// Receive completions other than input-complete.
    pub receive_failures: u64,
    /// Input the device had to drop while the host held the receive buffer.
    pub truncations: u64,
}

impl GatewayStats {
    /// The short form logged with every bad frame.
    pub fn packet_summary(&self) -> String {
        format!("{} packets, {} bad", self.frames_received, self.bad_frames)
    }
}

impl fmt::Display for GatewayStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rx {} packets ({} bad, {} relayed, {} relay errors, {} status errors, {} truncated), \
             tx {} datagrams ({} dropped, {} sent, {} failed)",
            self.frames_received,
            self.bad_frames,
            self.frames_relayed,
            self.relay_failures,
            self.receive_failures,
            self.truncations,
            self.datagrams_received,
            self.datagrams_dropped,
            self.frames_transmitted,
            self.transmit_failures
        )
    }
}
