use crate::protocol::RegisterUpdate;

pub const REGISTER_COUNT: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterInfo {
    pub id: &'static str,
    pub abi: &'static str,
    pub description: &'static str,
}

const fn reg(id: &'static str, abi: &'static str, description: &'static str) -> RegisterInfo {
    RegisterInfo {
        id,
        abi,
        description,
    }
}

/// RV32I integer registers in index order.
pub const REGISTERS: [RegisterInfo; REGISTER_COUNT] = [
    reg("x0", "zero", "Hard-wired zero"),
    reg("x1", "ra", "Return address"),
    reg("x2", "sp", "Stack pointer"),
    reg("x3", "gp", "Global pointer"),
    reg("x4", "tp", "Thread pointer"),
    reg("x5", "t0", "Temporary/alternate link register"),
    reg("x6", "t1", "Temporary"),
    reg("x7", "t2", "Temporary"),
    reg("x8", "s0/fp", "Saved register/frame pointer"),
    reg("x9", "s1", "Saved register"),
    reg("x10", "a0", "Function argument/return value"),
    reg("x11", "a1", "Function argument/return value"),
    reg("x12", "a2", "Function argument"),
    reg("x13", "a3", "Function argument"),
    reg("x14", "a4", "Function argument"),
    reg("x15", "a5", "Function argument"),
    reg("x16", "a6", "Function argument"),
    reg("x17", "a7", "Function argument"),
    reg("x18", "s2", "Saved register"),
    reg("x19", "s3", "Saved register"),
    reg("x20", "s4", "Saved register"),
    reg("x21", "s5", "Saved register"),
    reg("x22", "s6", "Saved register"),
    reg("x23", "s7", "Saved register"),
    reg("x24", "s8", "Saved register"),
    reg("x25", "s9", "Saved register"),
    reg("x26", "s10", "Saved register"),
    reg("x27", "s11", "Saved register"),
    reg("x28", "t3", "Temporary"),
    reg("x29", "t4", "Temporary"),
    reg("x30", "t5", "Temporary"),
    reg("x31", "t6", "Temporary"),
];

/// Resolves `x<n>` or an ABI name (`s0` and `fp` both name x8).
pub fn register_index(key: &str) -> Option<usize> {
    if let Some(n) = key.strip_prefix('x').and_then(|n| n.parse::<usize>().ok()) {
        return (n < REGISTER_COUNT && key == format!("x{n}")).then_some(n);
    }
    REGISTERS
        .iter()
        .position(|info| info.abi.split('/').any(|name| name == key))
}

/// Last known value of every register; registers never reported read as zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegisterFile([u32; REGISTER_COUNT]);

impl RegisterFile {
    pub fn get(&self, index: usize) -> u32 {
        self.0.get(index).copied().unwrap_or_default()
    }

    pub fn by_name(&self, key: &str) -> Option<u32> {
        register_index(key).map(|i| self.get(i))
    }

    /// Applies an update last-write-wins and returns how many registers it
    /// named. Wire values are truncated to 32 bits, so `-1` reads as
    /// `0xFFFFFFFF`. Writes to x0 are dropped.
    pub fn merge(&mut self, update: &RegisterUpdate) -> usize {
        let mut applied = 0;
        for (key, value) in &update.0 {
            match register_index(key) {
                Some(0) => applied += 1,
                Some(index) => {
                    self.0[index] = *value as u32;
                    applied += 1;
                }
                None => tracing::warn!("ignoring unknown register '{key}'"),
            }
        }
        applied
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static RegisterInfo, u32)> + '_ {
        REGISTERS.iter().zip(self.0.iter().copied())
    }

    pub fn hex(&self, index: usize) -> String {
        format!("0x{:08X}", self.get(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn update(pairs: &[(&str, i64)]) -> RegisterUpdate {
        RegisterUpdate(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<IndexMap<_, _>>(),
        )
    }

    #[test]
    fn unseen_registers_read_zero() {
        let regs = RegisterFile::default();
        assert_eq!(regs.iter().count(), REGISTER_COUNT);
        assert!(regs.iter().all(|(_, v)| v == 0));
        assert_eq!(regs.hex(31), "0x00000000");
    }

    #[test]
    fn merge_is_last_write_wins_and_wraps() {
        let mut regs = RegisterFile::default();
        assert_eq!(regs.merge(&update(&[("x1", 5), ("sp", 0x1000)])), 2);
        assert_eq!(regs.merge(&update(&[("ra", -1)])), 1);
        assert_eq!(regs.get(1), 0xFFFF_FFFF);
        assert_eq!(regs.get(2), 0x1000);
        assert_eq!(regs.hex(1), "0xFFFFFFFF");
        assert_eq!(regs.by_name("fp"), regs.by_name("x8"));
    }

    #[test]
    fn aliases_in_one_frame_apply_in_peer_order() {
        let mut regs = RegisterFile::default();
        regs.merge(&update(&[("x10", 2), ("a0", 1)]));
        assert_eq!(regs.get(10), 1);
        regs.merge(&update(&[("a0", 1), ("x10", 2)]));
        assert_eq!(regs.get(10), 2);

        let frame = r#"{"event":"register_update","data":{"fp":9,"x8":4,"s0":7}}"#;
        let crate::protocol::PeerEvent::RegisterUpdate(update) =
            crate::protocol::PeerEvent::decode(frame).expect("decode")
        else {
            panic!("expected register_update");
        };
        regs.merge(&update);
        assert_eq!(regs.get(8), 7);
    }

    #[test]
    fn x0_stays_zero_and_unknown_keys_are_ignored() {
        let mut regs = RegisterFile::default();
        regs.merge(&update(&[("x0", 42), ("zero", 7), ("pc", 12), ("x32", 1), ("x01", 9)]));
        assert_eq!(regs, RegisterFile::default());
    }

    #[test]
    fn names_resolve() {
        assert_eq!(register_index("x0"), Some(0));
        assert_eq!(register_index("x31"), Some(31));
        assert_eq!(register_index("s0"), Some(8));
        assert_eq!(register_index("fp"), Some(8));
        assert_eq!(register_index("a0"), Some(10));
        assert_eq!(register_index("t6"), Some(31));
        assert_eq!(register_index("x32"), None);
        assert_eq!(register_index("s0/fp"), None);
    }
}
