use rotalog::humanize::ByteSize;
use rotalog::rotation::retention;
use std::fs;
use std::path::Path;
use time::format_description::well_known::Rfc3339;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Print managed archives as `created_at<TAB>size<TAB>path`, oldest first.
pub fn run(prefix: &Path) -> Result<(), AnyError> {
    let mut archives = retention::scan(prefix)?;
    archives.sort_by_key(|archive| archive.created_at);

    for archive in archives {
        let size = fs::metadata(&archive.path)?.len();
        println!(
            "{}\t{}\t{}",
            archive.created_at.format(&Rfc3339)?,
            ByteSize(size),
            archive.path.display()
        );
    }

    Ok(())
}
