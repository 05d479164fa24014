use crate::error::Result;
use crate::source::SourceSchema;

pub fn run() -> Result<()> {
    println!("{}", SourceSchema::nuga_bank_v1().to_json()?);
    Ok(())
}
