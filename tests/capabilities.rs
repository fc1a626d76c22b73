use overlaytls::cpu::{self, Capabilities, CapabilityOracle, Policy};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

#[test]
fn predicates_agree_with_snapshot() {
    let caps = cpu::capabilities();
    assert_eq!(cpu::has_aes(), caps.aes);
    assert_eq!(cpu::has_pmull(), caps.pmull);
    assert_eq!(overlaytls::has_aes(), caps.aes);
}

#[test]
fn answers_are_stable_across_threads() {
    let first = cpu::capabilities();
    let handles: Vec<_> = (0..16).map(|_| thread::spawn(cpu::capabilities)).collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), first);
    }
}

#[test]
fn current_policy_matches_target() {
    let policy = cpu::policy();
    if cfg!(all(target_os = "android", target_arch = "aarch64")) {
        assert_eq!(policy, Policy::Auxv);
    } else if cfg!(all(target_os = "macos", target_arch = "aarch64")) {
        assert_eq!(policy, Policy::Fixed(Capabilities::APPLE_SILICON));
    } else {
        assert_eq!(policy, Policy::Generic);
    }
}

static CALLS: AtomicUsize = AtomicUsize::new(0);

fn probe() -> Capabilities {
    CALLS.fetch_add(1, Ordering::SeqCst);
    Capabilities::APPLE_SILICON
}

#[test]
fn oracle_probes_once_under_contention() {
    let oracle = Arc::new(CapabilityOracle::new(probe));
    let handles: Vec<_> = (0..32)
        .map(|_| {
            let oracle = oracle.clone();
            thread::spawn(move || (oracle.has_aes(), oracle.has_pmull()))
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), (true, true));
    }
    assert_eq!(CALLS.load(Ordering::SeqCst), 1);
}

#[test]
fn hwcap_bits_decode_independently() {
    assert_eq!(Capabilities::from_hwcap(0), Capabilities::default());
    let aes = Capabilities::from_hwcap(cpu::HWCAP_AES);
    assert!(aes.aes && !aes.pmull);
    let both = Capabilities::from_hwcap(cpu::HWCAP_AES | cpu::HWCAP_PMULL | 0x1);
    assert_eq!(both, Capabilities::APPLE_SILICON);
}
