//! Human and JSON printing for client commands.

use anyhow::Result;
use rvlab_relay::RegisterFile;
use serde_json::Value;

use crate::opts::ClientOpts;

/// Prints `data` as JSON when requested; otherwise runs `human`.
pub fn print_success(opts: &ClientOpts, data: &Value, human: impl FnOnce(&Value)) -> Result<()> {
    if opts.pretty {
        println!("{}", serde_json::to_string_pretty(data)?);
    } else if opts.json {
        println!("{}", serde_json::to_string(data)?);
    } else {
        human(data);
    }
    Ok(())
}

pub fn register_table(registers: &RegisterFile) -> String {
    let mut table = String::new();
    for (info, value) in registers.iter() {
        table.push_str(&format!(
            "{:<4} {:<6} 0x{:08X}  {}\n",
            info.id, info.abi, value, info.description
        ));
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use rvlab_relay::RegisterUpdate;

    #[test]
    fn register_table_lists_every_register_in_hex() {
        let mut regs = RegisterFile::default();
        regs.merge(&RegisterUpdate([("sp".to_string(), 0x8000)].into()));
        let table = register_table(&regs);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 32);
        assert!(lines[0].starts_with("x0   zero   0x00000000"));
        assert!(lines[2].starts_with("x2   sp     0x00008000"));
        assert!(lines[8].contains("s0/fp"));
    }
}
