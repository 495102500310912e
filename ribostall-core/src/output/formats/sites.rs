use std::io::Write;

use crate::heatmap::StallSite;
use crate::types::RibostallError;

/// One row per stall site: transcript, 1-based position, window codons.
pub fn write_stall_sites_table<W: Write>(
    writer: &mut W,
    sites: &[StallSite],
) -> Result<(), RibostallError> {
    writeln!(writer, "transcript\tstall_site\tcodons")?;
    for site in sites {
        writeln!(
            writer,
            "{}\t{}\t{}",
            site.transcript,
            site.display_position(),
            site.codons.join(",")
        )?;
    }
    Ok(())
}
