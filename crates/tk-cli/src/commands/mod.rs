//! CLI subcommand implementations.

pub mod employee;
pub mod slice;
pub mod timer;

use std::io::Write;

use anyhow::Result;
use serde::Serialize;

/// Writes `value` as pretty JSON followed by a newline.
fn write_json<W: Write, T: Serialize + ?Sized>(writer: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, value)?;
    writeln!(writer)?;
    Ok(())
}

/// Confirmation printed for deletes, which have no entity left to show.
#[derive(Debug, Serialize)]
struct Deleted<'a> {
    deleted: &'a str,
}

#[cfg(test)]
pub(crate) mod test_support {
    use tk_core::Engine;
    use tk_db::MemoryStore;

    pub fn engine() -> Engine {
        Engine::new(Box::new(MemoryStore::new()), "tester")
    }

    pub fn json(output: Vec<u8>) -> serde_json::Value {
        serde_json::from_slice(&output).unwrap()
    }
}
