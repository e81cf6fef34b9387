use sha2::{Digest, Sha256};

use super::record::FaultIdentity;

/// Lowest exit code derived from a fault.
pub const FAULT_EXIT_CODE_MIN: u8 = 100;
/// Highest exit code derived from a fault.
pub const FAULT_EXIT_CODE_MAX: u8 = 254;
/// Exit code used when a fault occurs while a fault is being handled.
pub const REENTRANT_FAULT_EXIT_CODE: u8 = 255;

const FAULT_EXIT_CODE_SPAN: u32 = (FAULT_EXIT_CODE_MAX - FAULT_EXIT_CODE_MIN) as u32 + 1;

/// Maps a fault identity onto `100..=254`.
///
/// The code is a pure function of the identity's canonical form, so the same
/// fault exits with the same code across runs and builds.
#[must_use]
pub fn exit_code_for(identity: &FaultIdentity) -> u8 {
    let digest = Sha256::digest(identity.canonical().as_bytes());
    let mut prefix = [0_u8; 4];
    prefix.copy_from_slice(&digest[..4]);
    let offset = u32::from_be_bytes(prefix) % FAULT_EXIT_CODE_SPAN;
    // The span is 155, so the offset always fits.
    FAULT_EXIT_CODE_MIN + u8::try_from(offset).unwrap_or(0)
}
