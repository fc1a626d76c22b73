// Copyright (c) 2024, The overlaytls Project Authors.
// All rights reserved.
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions are
// met:
//
//     * Redistributions of source code must retain the above copyright
//       notice, this list of conditions and the following disclaimer.
//
//     * Redistributions in binary form must reproduce the above
//       copyright notice, this list of conditions and the following disclaimer
//       in the documentation and/or other materials provided with the
//       distribution.
//
//     * Neither the name of the copyright holder nor the names of its
//       contributors may be used to endorse or promote products derived from
//       this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS
// "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT
// LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR
// A PARTICULAR PURPOSE ARE DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT
// OWNER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT
// LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR SERVICES; LOSS OF USE,
// DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY
// THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT
// (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE
// OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! # CPU Capability Overlay
//!
//! Answers two questions for the TLS engine: can this CPU run AES in
//! hardware, and can it do carry-less multiplication (PMULL on aarch64,
//! PCLMULQDQ on x86) for GHASH. The answer is resolved once per process.
//!
//! Detection goes through one of three tiers, picked at compile time:
//!
//! * [`Policy::Generic`]: ask the host's own feature detection. This is
//!   right on almost every target.
//! * [`Policy::Auxv`]: android/aarch64, where `/proc/self/auxv` is often
//!   unreadable and generic detection reports no AES at all. We read
//!   `AT_HWCAP` through `getauxval(3)` instead, looked up at run time since
//!   old bionic releases do not export it.
//! * [`Policy::Fixed`]: macOS/aarch64, where no dynamic query was wired up.
//!   Every Apple Silicon part has AES and PMULL, so both are hardcoded.
//!
//! A wrong "no" here makes the engine pick the portable cipher path, which
//! is slower, weaker against timing side channels, and changes the
//! ClientHello cipher preference that observers fingerprint.

mod auxv;
mod generic;

use log::debug;
use once_cell::sync::OnceCell;

pub use auxv::{HWCAP_AES, HWCAP_PMULL};

/// Snapshot of the hardware crypto features relevant to cipher selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Capabilities {
    pub aes: bool,
    pub pmull: bool,
}

impl Capabilities {
    /// Feature floor of the Apple M1 and everything after it.
    pub const APPLE_SILICON: Capabilities = Capabilities {
        aes: true,
        pmull: true,
    };

    /// Decodes a linux/arm64 `AT_HWCAP` word.
    pub fn from_hwcap(hwcap: libc::c_ulong) -> Self {
        Self {
            aes: hwcap & HWCAP_AES != 0,
            pmull: hwcap & HWCAP_PMULL != 0,
        }
    }
}

/// How capabilities are resolved on a given target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Trust the platform's generic feature detection.
    Generic,
    /// Query the kernel auxiliary vector through `getauxval(3)`.
    Auxv,
    /// No dynamic query is available; use a known hardware baseline.
    Fixed(Capabilities),
}

#[cfg(all(target_os = "android", target_arch = "aarch64"))]
const CURRENT_POLICY: Policy = Policy::Auxv;

// TODO: switch to sysctl hw.optional.arm.FEAT_AES / FEAT_PMULL once the
// minimum supported macOS exposes them.
#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
const CURRENT_POLICY: Policy = Policy::Fixed(Capabilities::APPLE_SILICON);

#[cfg(not(any(
    all(target_os = "android", target_arch = "aarch64"),
    all(target_os = "macos", target_arch = "aarch64")
)))]
const CURRENT_POLICY: Policy = Policy::Generic;

impl Policy {
    /// The policy compiled in for this target.
    pub const fn current() -> Self {
        CURRENT_POLICY
    }

    /// Runs the underlying probe. Never fails; unknown means `false`.
    pub fn detect(self) -> Capabilities {
        match self {
            Policy::Generic => generic::detect(),
            Policy::Auxv => auxv::detect(),
            Policy::Fixed(caps) => caps,
        }
    }
}

/// Memoizes a capability probe. The probe runs at most once, even when
/// many threads race on the first query; later callers get the cached value.
pub struct CapabilityOracle {
    cell: OnceCell<Capabilities>,
    probe: fn() -> Capabilities,
}

impl CapabilityOracle {
    pub const fn new(probe: fn() -> Capabilities) -> Self {
        Self {
            cell: OnceCell::new(),
            probe,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        *self.cell.get_or_init(|| {
            let caps = (self.probe)();
            debug!("cpu capabilities resolved: aes={} pmull={}", caps.aes, caps.pmull);
            caps
        })
    }

    pub fn has_aes(&self) -> bool {
        self.capabilities().aes
    }

    pub fn has_pmull(&self) -> bool {
        self.capabilities().pmull
    }
}

fn detect_current() -> Capabilities {
    let policy = Policy::current();
    debug!("probing cpu capabilities with {:?} policy", policy);
    policy.detect()
}

static ORACLE: CapabilityOracle = CapabilityOracle::new(detect_current);

/// Returns whether the CPU supports the AES instructions.
pub fn has_aes() -> bool {
    ORACLE.has_aes()
}

/// Returns whether the CPU supports carry-less multiplication.
pub fn has_pmull() -> bool {
    ORACLE.has_pmull()
}

/// Both predicates at once.
pub fn capabilities() -> Capabilities {
    ORACLE.capabilities()
}

pub fn policy() -> Policy {
    Policy::current()
}
