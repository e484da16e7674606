use crate::error::Result;
use crate::event::ProgressUpdate;
use crate::fs::host::{FileBody, FileSystem};
use crate::fs::ignore::file_extension;
use crate::fs::tree::SelectedFile;
use crate::output::format::{format_size, group_by_directory, push_fenced};
use crate::output::{Generator, Pass, Yielder};

/// Files grouped under one heading per directory, each with its path and
/// size, followed by a one-line summary.
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
    let mut out = format!(
        "# {}\nFiles: {} | {}\n\n",
        gen.root_name,
        files.len(),
        gen.generated_at
    );
    let mut processed = 0;

    for group in group_by_directory(files) {
        out.push_str(&format!("## {}\n\n", group.label));

        for file in group.files {
            out.push_str(&format!("### {}\n", file.name));

            match gen.fetch(file, pass) {
                Ok(content) => {
                    out.push_str(&format!(
                        "`{}` - {}\n\n",
                        file.path,
                        format_size(content.byte_len)
                    ));
                    match content.body {
                        FileBody::Text(text) => {
                            push_fenced(&mut out, &file_extension(&file.name), &text);
                            out.push('\n');
                            processed += 1;
                        }
                        _ => {
                            out.push_str("[Binary]\n\n");
                            pass.binaries += 1;
                        }
                    }
                }
                Err(e) => {
                    out.push_str(&format!("`{}`\n\n[Error: {}]\n\n", file.path, e));
                    pass.errors += 1;
                }
            }

            pass.file_done(&file.name).await?;
        }
    }

    out.push_str(&format!("---\n{} files processed\n", processed));
    Ok(out)
}
