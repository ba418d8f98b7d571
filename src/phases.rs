use std::sync::OnceLock;

/// Phase C conductor.
pub const PHASE_C: u8 = 0x01;
/// Phase B conductor.
pub const PHASE_B: u8 = 0x02;
/// Phase A conductor.
pub const PHASE_A: u8 = 0x04;
/// Delta connection.
pub const PHASE_D: u8 = 0x08;
/// Children connected on differing phases.
pub const PHASE_Z: u8 = 0x10;
/// Transformer secondary.
pub const PHASE_X: u8 = 0x20;
/// House connected node.
pub const PHASE_H: u8 = 0x40;
/// Split phase (triplex) connection.
pub const PHASE_S: u8 = 0x80;

/// Bit/character pairs in output order. The order is fixed and is not
/// the bit order.
const PHASE_FLAGS: [(u8, char); 8] = [
    (PHASE_S, 'S'),
    (PHASE_X, 'X'),
    (PHASE_A, 'A'),
    (PHASE_B, 'B'),
    (PHASE_C, 'C'),
    (PHASE_D, 'D'),
    (PHASE_Z, 'Z'),
    (PHASE_H, 'H'),
];

/// Decodes a phase mask into its short name, e.g. `0x07` into `"ABC"`.
///
/// Every mask has a name. A mask with no bits set decodes to the empty
/// string.
pub fn phase_name(mask: u8) -> String {
    PHASE_FLAGS
        .iter()
        .filter(|(bit, _)| mask & bit != 0)
        .map(|(_, c)| *c)
        .collect()
}

static SHARED: OnceLock<PhaseTable> = OnceLock::new();

/// Names of all 256 phase masks, indexed by mask.
pub struct PhaseTable {
    names: [String; 256],
}

impl PhaseTable {
    pub fn new() -> Self {
        Self {
            names: std::array::from_fn(|mask| phase_name(mask as u8)),
        }
    }

    /// Process-wide table, built on first use.
    pub fn shared() -> &'static Self {
        SHARED.get_or_init(Self::new)
    }

    pub fn name(&self, mask: u8) -> &str {
        &self.names[mask as usize]
    }
}

impl Default for PhaseTable {
    fn default() -> Self {
        Self::new()
    }
}
