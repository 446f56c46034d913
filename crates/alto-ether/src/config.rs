// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Gateway constants - single source of truth.
//!
//! Wire constants of the Alto Ethernet (frame size, timing windows), the
//! memory map shared with the PRU coprocessor, and the UDP ports used by
//! emulators speaking the length-prefixed datagram format.
//!
//! **Do not hardcode any of these elsewhere.**

use std::time::Duration;

// =======================================================================
// UDP ports (see the emulator's ifs.cfg)
// =======================================================================

/// Port the gateway binds to; datagrams received here go to the Alto.
pub const UDP_RECV_PORT: u16 = 42424;

/// Port frames from the Alto are broadcast to.
pub const UDP_SEND_PORT: u16 = 42425;

/// Length of the datagram header (big-endian word count).
pub const UDP_HEADER_LEN: usize = 2;

// =======================================================================
// Frame limits
// =======================================================================

/// Largest PUP (554 bytes) plus 10 bytes of slop.
///
/// Upper bound on a decoded frame, CRC included.
pub const MAX_PUP_LENGTH: usize = 554 + 10;

/// Length of the trailing Ethernet CRC in bytes.
pub const CRC_LEN: usize = 2;

/// Receive buffer capacity in duration samples.
///
/// Worst case is 16 transitions per byte, so a maximal frame fits under 12K.
pub const DURATION_BUFFER_LEN: usize = 12 * 1024;

/// Scratch capacity for half-bit levels (two per bit, plus sync and parity).
pub const LEVEL_BUFFER_LEN: usize = 16 * MAX_PUP_LENGTH + 2;

// =======================================================================
// Receive timing (durations are sampled in 2 ns units to fit a byte)
// =======================================================================

/// Duration sample unit in nanoseconds.
pub const RECV_WIDTH_NS: u32 = 2;

/// Pulses shorter than this are noise.
pub const MIN_HALF_BIT_NS: u32 = 120;

/// Start of the dead band between one and two half-bits.
pub const AMBIGUOUS_LOW_NS: u32 = 230;

/// First width read as two half-bits.
pub const MIN_FULL_BIT_NS: u32 = 280;

/// Pulses at least this long cannot belong to a frame.
pub const MAX_FULL_BIT_NS: u32 = 400;

/// Transmit half-bit period generated by the PRU PWM timer.
pub const HALF_BIT_NS: u32 = 170;

// =======================================================================
// PRU-ICSS memory map (offsets from the start of PRU0 data RAM)
//
// 0x0_0000  interface block   .... 8K PRU0 RAM
// 0x0_0400  transmit buffer
// 0x0_1000  circular debug buffer (PRU private)
// 0x1_0000  receive buffer    .... 12K shared RAM
// 0x1_3000  end of shared RAM
// 0x2_0000  interrupt controller
// =======================================================================

/// Offset of the interface block.
pub const IFACE_OFFSET: usize = 0x0000;

/// Offset of the transmit buffer.
pub const W_BUF_OFFSET: usize = 0x0400;

/// Transmit buffer capacity (up to the PRU's circular debug buffer).
pub const W_BUF_CAPACITY: usize = 0x1000 - W_BUF_OFFSET;

/// Offset of the receive buffer (start of shared RAM).
pub const R_BUF_OFFSET: usize = 0x1_0000;

/// Receive buffer capacity (all of shared RAM).
pub const R_BUF_CAPACITY: usize = DURATION_BUFFER_LEN;

/// Offset of the PRU interrupt controller registers.
pub const INTC_OFFSET: usize = 0x2_0000;

/// System event status index clear register (INTC + 0x24).
pub const INTC_SICR: usize = INTC_OFFSET + 0x24;

/// Host interrupt enable indexed set register (INTC + 0x34).
pub const INTC_HIEISR: usize = INTC_OFFSET + 0x34;

/// System event raised by PRU0 towards the ARM.
pub const PRU0_ARM_EVENT: u32 = 19;

/// Host interrupt carrying that event (PRU_EVTOUT0).
pub const PRU_EVTOUT0_HOST: u32 = 2;

/// Size of the window mapped from the UIO device.
pub const PRUSS_MAP_LEN: usize = 0x2_2000;

// =======================================================================
// Event loop
// =======================================================================

/// Wait timeout; purely a liveness/diagnostic tick.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(5);
