//! Platform capability domain.
//!
//! Identification only: the CPUID vendor string picks a named backend,
//! with a generic fallback when the vendor is unrecognized.

/// Platform identity queries.
pub trait PlatformOps: Sync {
    /// Human-readable platform name.
    fn name(&self) -> &'static str;
    /// The raw 12-byte CPUID vendor string, if identification ran.
    fn vendor_id(&self) -> &'static str;
}

struct IntelPlatform;
struct AmdPlatform;
struct GenericPlatform;

impl PlatformOps for IntelPlatform {
    fn name(&self) -> &'static str {
        "Intel x86_64"
    }

    fn vendor_id(&self) -> &'static str {
        "GenuineIntel"
    }
}

impl PlatformOps for AmdPlatform {
    fn name(&self) -> &'static str {
        "AMD x86_64"
    }

    fn vendor_id(&self) -> &'static str {
        "AuthenticAMD"
    }
}

impl PlatformOps for GenericPlatform {
    fn name(&self) -> &'static str {
        "Generic x86_64"
    }

    fn vendor_id(&self) -> &'static str {
        "unknown"
    }
}

static INTEL: IntelPlatform = IntelPlatform;
static AMD: AmdPlatform = AmdPlatform;
static GENERIC: GenericPlatform = GenericPlatform;

/// Reads CPUID leaf 0 and reassembles the vendor string from the
/// EBX/EDX/ECX register order the CPU reports it in.
fn vendor_string() -> [u8; 12] {
    // SAFETY: CPUID leaf 0 exists on every x86_64 CPU and only reads
    // processor identification.
    let id = unsafe { core::arch::x86_64::__cpuid(0) };
    let mut vendor = [0u8; 12];
    vendor[0..4].copy_from_slice(&id.ebx.to_le_bytes());
    vendor[4..8].copy_from_slice(&id.edx.to_le_bytes());
    vendor[8..12].copy_from_slice(&id.ecx.to_le_bytes());
    vendor
}

/// Selects the platform backend by CPU vendor. Unrecognized vendors
/// (hypervisors with custom strings, future parts) get the generic
/// backend, so the domain always resolves.
pub fn detect() -> &'static dyn PlatformOps {
    match &vendor_string() {
        b"GenuineIntel" => &INTEL,
        b"AuthenticAMD" => &AMD,
        _ => &GENERIC,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_always_resolves_to_a_named_backend() {
        let platform = detect();
        assert!(!platform.name().is_empty());
        assert!(!platform.vendor_id().is_empty());
    }

    #[test]
    fn vendor_string_is_printable_ascii() {
        let vendor = vendor_string();
        assert!(vendor.iter().all(|&b| b.is_ascii() && b != 0));
    }
}
