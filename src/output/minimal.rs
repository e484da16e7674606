use std::time::Instant;

use tracing::debug;

use crate::error::Result;
use crate::event::ProgressUpdate;
use crate::fs::host::{FileBody, FileSystem};
use crate::fs::ignore::{file_extension, is_binary_name};
use crate::fs::tree::SelectedFile;
use crate::output::format::push_fenced;
use crate::output::{Generator, Pass, Yielder};

/// Title, then `path` + fenced content per text file. Binary and unreadable
/// files leave no trace in the document.
pub(crate) async fn render<F, Y, P>(
    gen: &Generator<'_, F>,
    files: &[SelectedFile],
    pass: &mut Pass<'_, Y, P>,
) -> Result<String>
where
    F: FileSystem,
    Y: Yielder,
    P: FnMut(&ProgressUpdate),
{
    let mut out = format!("# {}\n\n", gen.root_name);

    for file in files {
        if is_binary_name(&file.name) {
            pass.binaries += 1;
        } else {
            let started = Instant::now();
            let read = gen.fs.read(&file.handle);
            pass.io_time += started.elapsed();

            match read.map(|content| content.body) {
                Ok(FileBody::Text(text)) => {
                    out.push_str(&file.path);
                    out.push('\n');
                    push_fenced(&mut out, &file_extension(&file.name), &text);
                    out.push('\n');
                }
                Ok(FileBody::Binary) => pass.binaries += 1,
                Err(e) => {
                    pass.errors += 1;
                    debug!(path = %file.path, "skipping unreadable file: {}", e);
                }
            }
        }
        pass.file_done(&file.name).await?;
    }

    Ok(out)
}
