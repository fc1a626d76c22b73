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

//! # Crypto Module
//!
//! Turns the CPU capability predicates into implementation choices for the
//! TLS engine: which AES path the block cipher takes, which GHASH path the
//! GCM tag computation takes, and in which order cipher suites are offered.
//! The engine never assumes hardware support without asking here first.

use crate::cpu::{self, Capabilities};
use rustls::crypto::CryptoProvider;
use rustls::{CipherSuite, SupportedCipherSuite};

/// Implementation path for a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Dedicated CPU instructions.
    Hardware,
    /// Portable, constant-time software code.
    Portable,
}

/// Coarse cipher family used for preference ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteFamily {
    AesGcm,
    ChaCha20Poly1305,
    Other,
}

pub fn suite_family(suite: CipherSuite) -> SuiteFamily {
    match suite {
        CipherSuite::TLS13_AES_128_GCM_SHA256
        | CipherSuite::TLS13_AES_256_GCM_SHA384
        | CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256
        | CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384
        | CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256
        | CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384 => SuiteFamily::AesGcm,
        CipherSuite::TLS13_CHACHA20_POLY1305_SHA256
        | CipherSuite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256
        | CipherSuite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256 => {
            SuiteFamily::ChaCha20Poly1305
        }
        _ => SuiteFamily::Other,
    }
}

/// Selects cipher implementation strategies from CPU capabilities.
#[derive(Debug, Clone, Copy)]
pub struct CipherSuiteSelector {
    caps: Capabilities,
}

impl CipherSuiteSelector {
    /// Creates a selector from the process-wide capability oracle.
    pub fn new() -> Self {
        Self::with_capabilities(cpu::capabilities())
    }

    /// Creates a selector for the given capabilities.
    pub fn with_capabilities(caps: Capabilities) -> Self {
        Self { caps }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    /// Strategy for the AES block cipher.
    pub fn aes_strategy(&self) -> Strategy {
        if self.caps.aes {
            Strategy::Hardware
        } else {
            Strategy::Portable
        }
    }

    /// Strategy for the GCM authentication tag. Needs both AES and
    /// carry-less multiply; either alone leaves GCM on the software path.
    pub fn ghash_strategy(&self) -> Strategy {
        if self.caps.aes && self.caps.pmull {
            Strategy::Hardware
        } else {
            Strategy::Portable
        }
    }

    pub fn prefers_aes_gcm(&self) -> bool {
        self.ghash_strategy() == Strategy::Hardware
    }

    /// Reorders `suites` so the family that is fast on this CPU comes
    /// first. Stable within each family, never drops a suite.
    pub fn order(&self, suites: Vec<SupportedCipherSuite>) -> Vec<SupportedCipherSuite> {
        let preferred = if self.prefers_aes_gcm() {
            SuiteFamily::AesGcm
        } else {
            SuiteFamily::ChaCha20Poly1305
        };
        let (mut first, rest): (Vec<_>, Vec<_>) = suites
            .into_iter()
            .partition(|s| suite_family(s.suite()) == preferred);
        first.extend(rest);
        first
    }

    /// The engine's crypto provider with suites ordered for this CPU.
    pub fn provider(&self) -> CryptoProvider {
        let mut provider = rustls::crypto::ring::default_provider();
        provider.cipher_suites = self.order(provider.cipher_suites);
        provider
    }

    /// IANA identifiers of the suites in offer order.
    pub fn suite_ids(&self) -> Vec<u16> {
        self.provider()
            .cipher_suites
            .iter()
            .map(|s| u16::from(s.suite()))
            .collect()
    }
}

impl Default for CipherSuiteSelector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn families(sel: &CipherSuiteSelector) -> Vec<SuiteFamily> {
        sel.provider()
            .cipher_suites
            .iter()
            .map(|s| suite_family(s.suite()))
            .collect()
    }

    #[test]
    fn aes_alone_is_not_enough_for_gcm() {
        let sel = CipherSuiteSelector::with_capabilities(Capabilities {
            aes: true,
            pmull: false,
        });
        assert_eq!(sel.aes_strategy(), Strategy::Hardware);
        assert_eq!(sel.ghash_strategy(), Strategy::Portable);
        assert!(!sel.prefers_aes_gcm());
    }

    #[test]
    fn hardware_gcm_puts_aes_first() {
        let sel = CipherSuiteSelector::with_capabilities(Capabilities::APPLE_SILICON);
        let fams = families(&sel);
        assert_eq!(fams[0], SuiteFamily::AesGcm);
        let last_aes = fams.iter().rposition(|f| *f == SuiteFamily::AesGcm).unwrap();
        let first_chacha = fams
            .iter()
            .position(|f| *f == SuiteFamily::ChaCha20Poly1305)
            .unwrap();
        assert!(last_aes < first_chacha);
    }

    #[test]
    fn portable_path_puts_chacha_first() {
        let sel = CipherSuiteSelector::with_capabilities(Capabilities::default());
        assert_eq!(sel.aes_strategy(), Strategy::Portable);
        let fams = families(&sel);
        assert_eq!(fams[0], SuiteFamily::ChaCha20Poly1305);
    }

    #[test]
    fn ordering_is_a_permutation() {
        let default_ids: Vec<u16> = rustls::crypto::ring::default_provider()
            .cipher_suites
            .iter()
            .map(|s| u16::from(s.suite()))
            .collect();
        for caps in [Capabilities::default(), Capabilities::APPLE_SILICON] {
            let mut ids = CipherSuiteSelector::with_capabilities(caps).suite_ids();
            let mut expected = default_ids.clone();
            ids.sort_unstable();
            expected.sort_unstable();
            assert_eq!(ids, expected);
        }
    }

    #[test]
    fn tls13_stays_ahead_of_tls12_within_family() {
        let ids = CipherSuiteSelector::with_capabilities(Capabilities::APPLE_SILICON).suite_ids();
        let tls13_aes = ids.iter().position(|id| *id == 0x1301).unwrap();
        let tls12_aes = ids.iter().position(|id| *id == 0xc02b).unwrap();
        assert!(tls13_aes < tls12_aes);
    }
}
