//! Renders an [`Assembled`] result into the three output file formats.
//!
//! Each format has a `write_*_to` function that accepts any [`std::io::Write`]
//! sink, so the layout can be tested without touching the filesystem; the
//! `write_*_file` wrappers open the named path and delegate to it.

use std::fs::File;
use std::io::{self, Write};

use crate::assembler::{Address, Assembled, Error, IC_INIT};

/// Write the `.ob` file: a header line, then one `%04d %05o` line per code
/// word followed immediately by one per data word, addresses continuing
/// from the end of the code image.
pub fn write_ob_to<W: Write>(w: &mut W, assembled: &Assembled) -> io::Result<()> {
    writeln!(w, "{} {}", assembled.code_image.len(), assembled.data_image.len())?;
    let mut address: Address = IC_INIT;
    for word in &assembled.code_image {
        writeln!(w, "{:04} {:05o}", address, word)?;
        address += 1;
    }
    for word in &assembled.data_image {
        writeln!(w, "{:04} {:05o}", address, word)?;
        address += 1;
    }
    Ok(())
}

/// Write the `.ent` file: one `<name> %04d` line per entry, in the reverse
/// of the order entries were declared in the source.
pub fn write_ent_to<W: Write>(w: &mut W, assembled: &Assembled) -> io::Result<()> {
    for (name, address) in assembled.entries.iter().rev() {
        writeln!(w, "{name} {address:04}")?;
    }
    Ok(())
}

/// Write the `.ext` file: one `<name> %04d` line per extern *use*, in the
/// order the second pass encountered them.
pub fn write_ext_to<W: Write>(w: &mut W, assembled: &Assembled) -> io::Result<()> {
    for (name, address) in &assembled.ext_uses {
        writeln!(w, "{name} {address:04}")?;
    }
    Ok(())
}

pub fn write_ob_file(path: &str, assembled: &Assembled) -> Result<(), Error> {
    let mut file = File::create(path).map_err(|_| Error::WriteError { path: path.to_string() })?;
    write_ob_to(&mut file, assembled).map_err(|_| Error::WriteError { path: path.to_string() })
}

pub fn write_ent_file(path: &str, assembled: &Assembled) -> Result<(), Error> {
    let mut file = File::create(path).map_err(|_| Error::WriteError { path: path.to_string() })?;
    write_ent_to(&mut file, assembled).map_err(|_| Error::WriteError { path: path.to_string() })
}

pub fn write_ext_file(path: &str, assembled: &Assembled) -> Result<(), Error> {
    let mut file = File::create(path).map_err(|_| Error::WriteError { path: path.to_string() })?;
    write_ext_to(&mut file, assembled).map_err(|_| Error::WriteError { path: path.to_string() })
}
