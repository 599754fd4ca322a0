//! Device token permission bitmasks.
//!
//! Tokens combine permissions via OR; an operation is authorized when the
//! token's mask contains every required bit.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Per-device token permissions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Permission: u32 {
        /// Read device state and feedback history
        const VIEWER     = 1 << 0;
        /// Send control messages to the device
        const CONTROLLER = 1 << 1;
        /// Manage the device's tokens
        const ADMIN      = 1 << 2;
    }
}

impl Permission {
    /// Every permission bit.
    pub const ALL: Permission = Permission::VIEWER
        .union(Permission::CONTROLLER)
        .union(Permission::ADMIN);

    /// Check whether this mask satisfies `required`.
    pub fn has(&self, required: Permission) -> bool {
        self.contains(required)
    }

    /// Interpret raw stored bits, dropping anything unknown. Masks with none
    /// of the known bits set fall back to [`Permission::VIEWER`].
    pub fn normalize(bits: u32) -> Permission {
        let known = Permission::from_bits_truncate(bits);

        if known.is_empty() {
            Permission::VIEWER
        } else {
            known
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_is_the_union_of_every_bit() {
        assert_eq!(Permission::ALL.bits(), 0b111);
        assert!(Permission::ALL.has(Permission::VIEWER));
        assert!(Permission::ALL.has(Permission::CONTROLLER | Permission::ADMIN));
    }

    #[test]
    fn has_requires_every_bit() {
        let mask = Permission::VIEWER | Permission::CONTROLLER;

        assert!(mask.has(Permission::CONTROLLER));
        assert!(!mask.has(Permission::ADMIN));
        assert!(!mask.has(Permission::CONTROLLER | Permission::ADMIN));
    }

    #[test]
    fn normalize_falls_back_to_viewer() {
        assert_eq!(Permission::normalize(0), Permission::VIEWER);
        assert_eq!(Permission::normalize(1 << 10), Permission::VIEWER);
        assert_eq!(
            Permission::normalize(0b110),
            Permission::CONTROLLER | Permission::ADMIN
        );
    }
}
