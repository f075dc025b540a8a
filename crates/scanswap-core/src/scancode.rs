//! PS/2 Scan Code Set 1 byte layout: masks, well-known codes, and helpers.
//!
//! Everything the remapping engine knows about a scancode byte is defined here.
//!
//! # How a set-1 scancode byte is laid out (for beginners)
//!
//! An AT-compatible keyboard reports each key event as a single byte (plus an
//! optional prefix byte for "extended" keys).  The byte packs two facts:
//!
//! ```text
//!   bit 7          bits 6..0
//! ┌────────┬─────────────────────┐
//! │ status │        code         │
//! └────────┴─────────────────────┘
//! ```
//!
//! - **code** (low 7 bits) identifies *which physical key* the event is about.
//!   For example Caps Lock is code 58 (0x3A) and Left Ctrl is code 29 (0x1D).
//! - **status** (bit 7) says *what happened*: clear = the key was pressed
//!   (a "make" code), set = the key was released (a "break" code).  Pressing
//!   Caps Lock therefore produces 0x3A and releasing it produces 0xBA.
//!
//! Keys added after the original layout ran out of code space (Right Ctrl,
//! Right Alt, the navigation cluster, …) are reported as *two* bytes: the
//! prefix 0xE0 followed by a code byte.  The second byte reuses the low-7-bit
//! code space, so Right Ctrl arrives as `E0 1D` — the same 0x1D that means
//! Left Ctrl when it stands alone.  Any byte-level rewriting must therefore
//! know whether it is looking at the companion of a prefix.
//!
//! The prefix test is on the *whole* byte value 0xE0, never on the masked
//! code: 0xE0 happens to have its top bit set, and masking first would make
//! it indistinguishable from a release of code 0x60.

/// Bit 7 of a scancode byte: set for key release ("break"), clear for press ("make").
pub const RELEASE_FLAG: u8 = 0x80;

/// Mask selecting the 7-bit key code portion of a scancode byte.
pub const CODE_MASK: u8 = 0x7F;

/// First byte of a two-byte extended sequence (Right Ctrl, arrows, numpad Enter, …).
pub const EXTENDED_PREFIX: u8 = 0xE0;

/// Key code for Caps Lock (58).
pub const CAPS_LOCK: u8 = 0x3A;

/// Key code for Left Ctrl (29).
pub const LEFT_CTRL: u8 = 0x1D;

/// Extracts the 7-bit key code from a scancode byte.
#[inline]
pub const fn code(byte: u8) -> u8 {
    byte & CODE_MASK
}

/// Extracts the status bit (0x00 for press, 0x80 for release) from a scancode byte.
#[inline]
pub const fn status(byte: u8) -> u8 {
    byte & RELEASE_FLAG
}

/// Returns `true` if `byte` is a break (key release) code.
#[inline]
pub const fn is_release(byte: u8) -> bool {
    byte & RELEASE_FLAG != 0
}

/// Recombines a 7-bit key code with a status bit into a scancode byte.
///
/// The code is below 0x80, so bitwise OR and addition produce the same byte;
/// OR makes the non-overlap explicit.
#[inline]
pub const fn compose(code: u8, status: u8) -> u8 {
    (code & CODE_MASK) | (status & RELEASE_FLAG)
}
