//! The scancode remapping engine: swaps Caps Lock and Left Ctrl in a raw
//! scancode byte stream.
//!
//! The engine consumes one byte at a time, in hardware order, and decides for
//! each byte whether it passes through untouched or is substituted by its
//! partner code.  Only the 7-bit key code is ever rewritten; the status bit
//! (press/release) is carried over unchanged, and every byte outside the
//! swapped pair — including both bytes of an extended `E0 xx` sequence — is
//! left exactly as it arrived.
//!
//! Two engines are provided:
//!
//! - [`Remapper`] — the single-stream engine.  Takes `&mut self`, keeps its
//!   session state in a plain field, and is the reference implementation of
//!   the decision logic.
//! - [`SharedRemapper`] — the lock-free engine for use behind an `Arc`.
//!   Takes `&self`, keeps the session state in an atomic, and additionally
//!   exposes the runtime [toggle](SharedRemapper::set_disable_caps) so an
//!   administrative thread can flip it while the byte stream is flowing.
//!
//! `process` on either engine is a pure function over (byte, state): it never
//! allocates, never blocks, and cannot fail.  A byte it does not recognise is
//! simply passed through.

pub mod shared;

use serde::{Deserialize, Serialize};

use crate::scancode;

pub use shared::SharedRemapper;

// ── The swap rule ─────────────────────────────────────────────────────────────

/// The fixed, bidirectional Caps Lock ↔ Left Ctrl pairing.
pub struct RemapRule;

impl RemapRule {
    /// Returns the partner code for `code`, or `None` if `code` is not part
    /// of the swapped pair.
    ///
    /// The rule is an involution: `swap(swap(c))` returns `c` for both pair
    /// members.
    pub const fn swap(code: u8) -> Option<u8> {
        match code {
            scancode::CAPS_LOCK => Some(scancode::LEFT_CTRL),
            scancode::LEFT_CTRL => Some(scancode::CAPS_LOCK),
            _ => None,
        }
    }

    /// Returns `true` if `code` is one of the two codes the rule touches.
    pub const fn affects(code: u8) -> bool {
        RemapRule::swap(code).is_some()
    }
}

// ── Configuration ─────────────────────────────────────────────────────────────

/// Behaviour switches for the remapping engine.
///
/// The defaults give the full behaviour: extended sequences are tracked (so
/// Right Ctrl is never mistaken for Left Ctrl) and both swap directions are
/// active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemapConfig {
    /// Track `E0` prefixes and pass the companion byte through untouched.
    ///
    /// Disabling this reverts to pure byte-at-a-time matching: any byte whose
    /// masked code equals a pair member is remapped, even inside an extended
    /// sequence.
    #[serde(default = "default_track_extended_sequences")]
    pub track_extended_sequences: bool,

    /// Suppress the Ctrl → Caps Lock direction of the swap.
    ///
    /// When set, Left Ctrl events pass through unchanged while Caps Lock is
    /// still rewritten to Left Ctrl — the keyboard ends up with two Ctrl keys
    /// and no Caps Lock at all.
    #[serde(default = "default_disable_caps")]
    pub disable_caps: bool,
}

fn default_track_extended_sequences() -> bool {
    true
}
fn default_disable_caps() -> bool {
    false
}

impl Default for RemapConfig {
    fn default() -> Self {
        Self {
            track_extended_sequences: default_track_extended_sequences(),
            disable_caps: default_disable_caps(),
        }
    }
}

// ── Session state ─────────────────────────────────────────────────────────────

/// Position of the engine within a multi-byte scancode sequence.
///
/// The stream grammar only ever needs one byte of lookbehind, so the machine
/// has exactly two states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SequenceState {
    /// Between sequences; the next byte stands alone (or starts a new sequence).
    Idle = 0,
    /// The previous byte was the `E0` prefix; the next byte is its companion
    /// and must not be remapped.
    AwaitingExtendedCompanion = 1,
}

impl Default for SequenceState {
    fn default() -> Self {
        SequenceState::Idle
    }
}

// ── Decisions ─────────────────────────────────────────────────────────────────

/// The outcome of processing one scancode byte.
///
/// Exactly one of the two variants applies to every byte, which is what makes
/// the substitution auditable: a byte is either forwarded as-is or replaced,
/// never both and never dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemapDecision {
    /// Forward the byte unchanged.
    Pass(u8),
    /// Forward the replacement byte instead of the original.
    Substitute(u8),
}

impl RemapDecision {
    /// The byte to forward, regardless of how it was decided.
    pub fn byte(self) -> u8 {
        match self {
            RemapDecision::Pass(b) | RemapDecision::Substitute(b) => b,
        }
    }

    /// Returns `true` if the byte was rewritten.
    pub fn is_substitution(self) -> bool {
        matches!(self, RemapDecision::Substitute(_))
    }
}

/// Classifies a standalone byte (one that is not part of an extended
/// sequence) against the swap rule and the toggle.
///
/// Shared by both engines so their per-byte decisions cannot drift apart.
fn classify(byte: u8, config: RemapConfig) -> RemapDecision {
    let code = scancode::code(byte);

    // The toggle suppresses only the Ctrl → Caps Lock direction.
    if config.disable_caps && code == scancode::LEFT_CTRL {
        return RemapDecision::Pass(byte);
    }

    match RemapRule::swap(code) {
        Some(partner) => {
            RemapDecision::Substitute(scancode::compose(partner, scancode::status(byte)))
        }
        None => RemapDecision::Pass(byte),
    }
}

// ── Single-stream engine ──────────────────────────────────────────────────────

/// The single-stream remapping engine.
///
/// Feed it scancode bytes in arrival order via [`process`](Remapper::process).
/// One `Remapper` tracks one stream; bytes from different keyboards must not
/// be interleaved through the same instance (use one engine per stream, or
/// [`SharedRemapper`] if a single engine must be shared).
///
/// # Examples
///
/// ```rust
/// use scanswap_core::{RemapConfig, RemapDecision, Remapper};
///
/// let mut remapper = Remapper::new(RemapConfig::default());
///
/// // Caps Lock press becomes a Left Ctrl press.
/// assert_eq!(remapper.process(0x3A), RemapDecision::Substitute(0x1D));
///
/// // Right Ctrl (E0 1D) is extended and passes through untouched.
/// assert_eq!(remapper.process(0xE0), RemapDecision::Pass(0xE0));
/// assert_eq!(remapper.process(0x1D), RemapDecision::Pass(0x1D));
/// ```
#[derive(Debug, Clone)]
pub struct Remapper {
    config: RemapConfig,
    state: SequenceState,
}

impl Remapper {
    /// Creates an engine with the given configuration, starting in
    /// [`SequenceState::Idle`].
    pub fn new(config: RemapConfig) -> Self {
        Self {
            config,
            state: SequenceState::Idle,
        }
    }

    /// Processes one scancode byte and returns the forwarding decision.
    ///
    /// Infallible and non-blocking: unknown bytes come back as
    /// [`RemapDecision::Pass`].
    pub fn process(&mut self, byte: u8) -> RemapDecision {
        if self.config.track_extended_sequences {
            // Compared against the whole byte value, before any masking.
            if byte == scancode::EXTENDED_PREFIX {
                self.state = SequenceState::AwaitingExtendedCompanion;
                return RemapDecision::Pass(byte);
            }
            if self.state == SequenceState::AwaitingExtendedCompanion {
                // The companion of a prefix is never remapped: extended keys
                // reuse the low-7-bit code space of legacy keys.
                self.state = SequenceState::Idle;
                return RemapDecision::Pass(byte);
            }
        }

        classify(byte, self.config)
    }

    /// Sets the toggle that suppresses the Ctrl → Caps Lock direction.
    pub fn set_disable_caps(&mut self, disable: bool) {
        self.config.disable_caps = disable;
    }

    /// Returns the current value of the toggle.
    pub fn disable_caps(&self) -> bool {
        self.config.disable_caps
    }

    /// Returns the current sequence state.
    pub fn state(&self) -> SequenceState {
        self.state
    }
}

impl Default for Remapper {
    fn default() -> Self {
        Self::new(RemapConfig::default())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── RemapRule ─────────────────────────────────────────────────────────────

    #[test]
    fn test_rule_swaps_caps_lock_and_left_ctrl_both_ways() {
        // Arrange / Act / Assert
        assert_eq!(RemapRule::swap(scancode::CAPS_LOCK), Some(scancode::LEFT_CTRL));
        assert_eq!(RemapRule::swap(scancode::LEFT_CTRL), Some(scancode::CAPS_LOCK));
    }

    #[test]
    fn test_rule_is_an_involution() {
        for code in 0u8..=scancode::CODE_MASK {
            if let Some(partner) = RemapRule::swap(code) {
                assert_eq!(
                    RemapRule::swap(partner),
                    Some(code),
                    "swapping twice must return the original code"
                );
            }
        }
    }

    #[test]
    fn test_rule_ignores_all_other_codes() {
        let affected: Vec<u8> = (0u8..=scancode::CODE_MASK)
            .filter(|&c| RemapRule::affects(c))
            .collect();
        assert_eq!(affected, vec![scancode::LEFT_CTRL, scancode::CAPS_LOCK]);
    }

    // ── Press / release substitution ──────────────────────────────────────────

    #[test]
    fn test_caps_lock_press_becomes_left_ctrl_press() {
        // Arrange
        let mut remapper = Remapper::default();

        // Act
        let decision = remapper.process(0x3A);

        // Assert
        assert_eq!(decision, RemapDecision::Substitute(0x1D));
        assert!(decision.is_substitution());
    }

    #[test]
    fn test_left_ctrl_release_becomes_caps_lock_release() {
        // Arrange
        let mut remapper = Remapper::default();

        // Act
        let decision = remapper.process(0x9D);

        // Assert – 0x9D is Ctrl+release; the result keeps the release bit
        assert_eq!(decision, RemapDecision::Substitute(0xBA));
    }

    #[test]
    fn test_status_bit_is_preserved_for_every_input_byte() {
        let mut remapper = Remapper::default();
        for byte in 0u8..=255 {
            let decision = remapper.process(byte);
            assert_eq!(
                scancode::status(decision.byte()),
                scancode::status(byte),
                "status bit must survive processing of {byte:#04x}"
            );
        }
    }

    #[test]
    fn test_unrelated_key_passes_through() {
        // Arrange – 0x10 is the Q key
        let mut remapper = Remapper::default();

        // Act
        let decision = remapper.process(0x10);

        // Assert
        assert_eq!(decision, RemapDecision::Pass(0x10));
        assert!(!decision.is_substitution());
    }

    #[test]
    fn test_only_the_pair_codes_are_ever_modified() {
        let mut remapper = Remapper::default();
        for byte in 0u8..=255 {
            // Skip the prefix so every probe byte is classified standalone.
            if byte == scancode::EXTENDED_PREFIX {
                continue;
            }
            let decision = remapper.process(byte);
            let expected = RemapRule::affects(scancode::code(byte));
            assert_eq!(
                decision.is_substitution(),
                expected,
                "byte {byte:#04x} substitution mismatch"
            );
        }
    }

    // ── Extended sequences ────────────────────────────────────────────────────

    #[test]
    fn test_extended_prefix_passes_and_arms_the_state() {
        // Arrange
        let mut remapper = Remapper::default();

        // Act
        let decision = remapper.process(0xE0);

        // Assert
        assert_eq!(decision, RemapDecision::Pass(0xE0));
        assert_eq!(remapper.state(), SequenceState::AwaitingExtendedCompanion);
    }

    #[test]
    fn test_right_ctrl_sequence_is_not_remapped() {
        // Arrange – Right Ctrl press arrives as E0 1D
        let mut remapper = Remapper::default();

        // Act
        let prefix = remapper.process(0xE0);
        let companion = remapper.process(0x1D);

        // Assert
        assert_eq!(prefix, RemapDecision::Pass(0xE0));
        assert_eq!(companion, RemapDecision::Pass(0x1D));
        assert_eq!(remapper.state(), SequenceState::Idle);
    }

    #[test]
    fn test_companion_with_caps_lock_code_is_not_remapped() {
        // Arrange
        let mut remapper = Remapper::default();

        // Act
        remapper.process(0xE0);
        let companion = remapper.process(0x3A);

        // Assert
        assert_eq!(companion, RemapDecision::Pass(0x3A));
    }

    #[test]
    fn test_state_clears_after_exactly_one_companion_byte() {
        // Arrange
        let mut remapper = Remapper::default();
        remapper.process(0xE0);
        remapper.process(0x48); // arrow-up companion

        // Act – the byte after the companion is standalone again
        let decision = remapper.process(0x3A);

        // Assert
        assert_eq!(decision, RemapDecision::Substitute(0x1D));
    }

    #[test]
    fn test_double_prefix_rearms_the_state() {
        // Arrange – E0 E0 1D: the second prefix re-arms, so 1D is a companion
        let mut remapper = Remapper::default();

        // Act
        remapper.process(0xE0);
        let second_prefix = remapper.process(0xE0);
        let companion = remapper.process(0x1D);

        // Assert
        assert_eq!(second_prefix, RemapDecision::Pass(0xE0));
        assert_eq!(companion, RemapDecision::Pass(0x1D));
    }

    #[test]
    fn test_tracking_disabled_remaps_inside_extended_sequences() {
        // Arrange – byte-at-a-time matching, no prefix awareness
        let mut remapper = Remapper::new(RemapConfig {
            track_extended_sequences: false,
            disable_caps: false,
        });

        // Act
        let prefix = remapper.process(0xE0);
        let companion = remapper.process(0x1D);

        // Assert – the prefix still passes (its masked code is 0x60), but the
        // companion is remapped as if it were Left Ctrl
        assert_eq!(prefix, RemapDecision::Pass(0xE0));
        assert_eq!(companion, RemapDecision::Substitute(0x3A));
    }

    // ── Toggle ────────────────────────────────────────────────────────────────

    #[test]
    fn test_toggle_suppresses_ctrl_to_caps_direction() {
        // Arrange
        let mut remapper = Remapper::default();
        remapper.set_disable_caps(true);

        // Act
        let ctrl_release = remapper.process(0x9D);

        // Assert
        assert_eq!(ctrl_release, RemapDecision::Pass(0x9D));
    }

    #[test]
    fn test_toggle_keeps_caps_to_ctrl_direction_active() {
        // Arrange
        let mut remapper = Remapper::default();
        remapper.set_disable_caps(true);

        // Act
        let caps_press = remapper.process(0x3A);

        // Assert – Caps Lock is still rewritten
        assert_eq!(caps_press, RemapDecision::Substitute(0x1D));
    }

    #[test]
    fn test_toggle_can_be_flipped_mid_stream() {
        // Arrange
        let mut remapper = Remapper::default();
        assert_eq!(remapper.process(0x1D), RemapDecision::Substitute(0x3A));

        // Act
        remapper.set_disable_caps(true);
        let while_disabled = remapper.process(0x1D);
        remapper.set_disable_caps(false);
        let after_reenable = remapper.process(0x1D);

        // Assert
        assert_eq!(while_disabled, RemapDecision::Pass(0x1D));
        assert_eq!(after_reenable, RemapDecision::Substitute(0x3A));
    }

    #[test]
    fn test_involution_round_trip_with_toggle_off() {
        // Applying the rule to its own output restores the original byte.
        let mut remapper = Remapper::default();
        for &byte in &[0x3Au8, 0xBA, 0x1D, 0x9D] {
            let once = remapper.process(byte).byte();
            let twice = remapper.process(once).byte();
            assert_eq!(twice, byte, "double swap must restore {byte:#04x}");
        }
    }

    // ── Config serde ──────────────────────────────────────────────────────────

    #[test]
    fn test_config_defaults_track_sequences_and_enable_both_directions() {
        // Arrange / Act
        let config = RemapConfig::default();

        // Assert
        assert!(config.track_extended_sequences);
        assert!(!config.disable_caps);
    }
}
