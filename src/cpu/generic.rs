//! Generic detection: whatever the host's own feature detection says.

use super::Capabilities;

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
cpufeatures::new!(cpuid_aes, "aes");
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
cpufeatures::new!(cpuid_pclmul, "pclmulqdq");

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub(crate) fn detect() -> Capabilities {
    Capabilities {
        aes: cpuid_aes::get(),
        pmull: cpuid_pclmul::get(),
    }
}

#[cfg(target_arch = "aarch64")]
pub(crate) fn detect() -> Capabilities {
    Capabilities {
        aes: std::arch::is_aarch64_feature_detected!("aes"),
        pmull: std::arch::is_aarch64_feature_detected!("pmull"),
    }
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
pub(crate) fn detect() -> Capabilities {
    Capabilities::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn matches_std_detection() {
        let caps = detect();
        assert_eq!(caps.aes, std::is_x86_feature_detected!("aes"));
        assert_eq!(caps.pmull, std::is_x86_feature_detected!("pclmulqdq"));
    }

    #[test]
    fn detection_is_deterministic() {
        assert_eq!(detect(), detect());
    }
}
