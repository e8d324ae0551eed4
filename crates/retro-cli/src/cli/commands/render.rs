//! Render command handler.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use retro_core::markdown;

/// Renders Markdown from `file` (or stdin) to stdout. With a `title`, the
/// fragment is wrapped in a standalone page.
pub fn run(file: Option<&Path>, title: Option<&str>) -> Result<()> {
    let input = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("read stdin")?;
            buf
        }
    };

    let html = markdown::render(&input);
    match title {
        Some(title) => print!("{}", markdown::render_document(title, &html)),
        None => println!("{html}"),
    }
    Ok(())
}
