//! `getauxval(3)` based hwcap lookup for android/arm64.

use super::Capabilities;
use libc::c_ulong;
use log::debug;
use once_cell::sync::OnceCell;

/// Hardware capability bit vector (linux specific).
pub(crate) const AT_HWCAP: c_ulong = 16;

/// `HWCAP_AES` as exposed by linux on arm64.
pub const HWCAP_AES: c_ulong = 1 << 3;
/// `HWCAP_PMULL` as exposed by linux on arm64.
pub const HWCAP_PMULL: c_ulong = 1 << 4;

pub(crate) type GetAuxval = unsafe extern "C" fn(c_ulong) -> c_ulong;

/// Looks `getauxval` up in the already loaded images. Bionic only exports
/// it from API level 18 on, so absence is a normal outcome.
#[cfg(unix)]
pub(crate) fn lookup_getauxval() -> Option<GetAuxval> {
    let this = libloading::os::unix::Library::this();
    // SAFETY: the signature matches getauxval(3). libc is never unloaded,
    // so the copied function pointer outlives the handle.
    let symbol = unsafe { this.get::<GetAuxval>(b"getauxval\0") };
    match symbol {
        Ok(f) => Some(*f),
        Err(e) => {
            debug!("getauxval unavailable: {}", e);
            None
        }
    }
}

#[cfg(not(unix))]
pub(crate) fn lookup_getauxval() -> Option<GetAuxval> {
    None
}

/// Reads `AT_HWCAP`, or 0 where `getauxval` does not exist.
pub(crate) fn hwcap_with(getauxval: Option<GetAuxval>) -> c_ulong {
    match getauxval {
        // SAFETY: getauxval has no preconditions on its argument.
        Some(f) => unsafe { f(AT_HWCAP) },
        None => 0,
    }
}

static HWCAP: OnceCell<c_ulong> = OnceCell::new();

fn hwcap() -> c_ulong {
    *HWCAP.get_or_init(|| hwcap_with(lookup_getauxval()))
}

pub(crate) fn detect() -> Capabilities {
    Capabilities::from_hwcap(hwcap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_entry_point_means_no_capabilities() {
        assert_eq!(hwcap_with(None), 0);
        let caps = Capabilities::from_hwcap(hwcap_with(None));
        assert!(!caps.aes);
        assert!(!caps.pmull);
    }

    unsafe extern "C" fn fake_getauxval(kind: c_ulong) -> c_ulong {
        if kind == AT_HWCAP {
            HWCAP_AES | HWCAP_PMULL
        } else {
            0
        }
    }

    #[test]
    fn entry_point_is_queried_for_hwcap() {
        let caps = Capabilities::from_hwcap(hwcap_with(Some(fake_getauxval)));
        assert!(caps.aes);
        assert!(caps.pmull);
    }

    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    #[test]
    fn glibc_exports_getauxval() {
        assert!(lookup_getauxval().is_some());
    }

    #[test]
    fn hwcap_is_memoized() {
        assert_eq!(hwcap(), hwcap());
    }
}
