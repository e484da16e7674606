use crate::error::Result;
use crate::event::ProgressUpdate;
use crate::fs::host::{FileBody, FileSystem};
use crate::fs::ignore::file_extension;
use crate::fs::tree::SelectedFile;
use crate::output::format::{
    count_lines, format_size, group_by_directory, group_thousands, push_fenced, slug,
};
use crate::output::{Generator, Pass, Yielder};

const BANNER_RULE: &str = "##############################################";

#[derive(Default)]
struct Totals {
    processed: usize,
    skipped: usize,
    warnings: usize,
    lines: usize,
    bytes: u64,
}

/// Banner, navigable index, per-file metadata with large-file warnings, and
/// closing statistics.
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
    let groups = group_by_directory(files);
    let mut out = String::new();

    out.push_str(BANNER_RULE);
    out.push('\n');
    out.push_str(&format!("# DIRECTORY: {}\n", gen.root_name));
    out.push_str(&format!("# GENERATED: {}\n", gen.generated_at));
    out.push_str(BANNER_RULE);
    out.push_str("\n\n");

    // index
    out.push_str("## 📑 INDEX\n\n");
    out.push_str(&format!("> Total files: **{}**\n\n", files.len()));
    for group in &groups {
        out.push_str(&format!("### 📁 {}\n\n", group.label));
        for file in &group.files {
            out.push_str(&format!("- [{}](#{})\n", file.name, slug(&file.path)));
        }
        out.push('\n');
    }
    out.push_str("---\n\n");

    let mut totals = Totals::default();
    for group in &groups {
        out.push_str(&format!("# 📂 {}\n\n", group.label));
        for file in &group.files {
            render_file(gen, file, pass, &mut totals, &mut out);
            pass.file_done(&file.name).await?;
        }
        out.push('\n');
    }

    // statistics
    out.push_str("# 📊 STATISTICS\n\n");
    out.push_str("## Summary\n\n");
    out.push_str(&format!("- **Total files:** {}\n", files.len()));
    out.push_str(&format!("- **Processed files:** {}\n", totals.processed));
    out.push_str(&format!(
        "- **Binary or unreadable files:** {}\n",
        totals.skipped
    ));
    out.push_str(&format!("- **Files with warnings:** {}\n", totals.warnings));
    out.push_str(&format!(
        "- **Total lines:** {}\n",
        group_thousands(totals.lines)
    ));
    out.push_str(&format!("- **Total size:** {}\n\n", format_size(totals.bytes)));

    out.push_str("## Files per Directory\n\n");
    for group in &groups {
        out.push_str(&format!(
            "- **{}:** {} file(s)\n",
            group.label,
            group.files.len()
        ));
    }
    out.push_str("\n---\n\n");
    out.push_str(&format!("*Generated by mdasm on {}*\n", gen.generated_at));

    Ok(out)
}

fn render_file<F, Y, P>(
    gen: &Generator<'_, F>,
    file: &SelectedFile,
    pass: &mut Pass<'_, Y, P>,
    totals: &mut Totals,
    out: &mut String,
) where
    F: FileSystem,
{
    let read = gen.fetch(file, pass);

    let anchor = slug(&file.path);
    out.push_str(&format!("<a id=\"{}\"></a>\n\n", anchor));
    out.push_str(&format!("## 📄 {}\n\n", file.name));
    out.push_str(&format!("**Path:** `{}`  \n", file.path));

    let content = match read {
        Ok(content) => content,
        Err(e) => {
            out.push('\n');
            out.push_str(&format!("> ❌ **READ ERROR:** {}\n\n", e));
            out.push_str("---\n\n");
            totals.skipped += 1;
            pass.errors += 1;
            return;
        }
    };

    out.push_str(&format!("**Size:** {}\n\n", format_size(content.byte_len)));
    totals.bytes += content.byte_len;

    match content.body {
        FileBody::Text(text) => {
            let lines = count_lines(&text);
            totals.lines += lines;
            out.push_str(&format!("**Lines:** {}\n\n", lines));

            let mut reasons = Vec::new();
            if lines > gen.options.large_file_lines {
                reasons.push(format!("{} lines", lines));
            }
            if content.byte_len > gen.options.large_file_bytes {
                reasons.push(format_size(content.byte_len));
            }
            if !reasons.is_empty() {
                out.push_str(&format!(
                    "> ⚠️ **WARNING: LARGE FILE** ({}) - consider whether it needs to be included\n\n",
                    reasons.join(", ")
                ));
                totals.warnings += 1;
            }

            push_fenced(out, &file_extension(&file.name), &text);
            out.push('\n');
            totals.processed += 1;
        }
        _ => {
            out.push_str("> ⚠️ **BINARY FILE** - content not shown\n\n");
            totals.skipped += 1;
            pass.binaries += 1;
        }
    }

    out.push_str("---\n\n");
}
