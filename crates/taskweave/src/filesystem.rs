use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::fs;
use tracing::info;

use crate::errors::PipelineResult;
use crate::models::file::{BinaryFileContent, FileRef, ImageFileContent, TextFileContent};
use crate::pipeline::{sequence, try_execute};

/// Regular files in `dir` whose name ends with `extension`, in directory iteration order
pub async fn get_file_names(dir: &Path, extension: &str) -> PipelineResult<Vec<FileRef>> {
    let label = format!("Read directory {}", dir.display());
    let mut entries = try_execute(&label, fs::read_dir(dir)).await?;

    let mut files = Vec::new();
    while let Some(entry) = try_execute(&label, entries.next_entry()).await? {
        let file_type = try_execute(&label, entry.file_type()).await?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if file_type.is_file() && name.ends_with(extension) {
            files.push(FileRef {
                parent: dir.to_path_buf(),
                name,
            });
        }
    }
    Ok(files)
}

pub async fn get_text_file_content(file: &FileRef) -> PipelineResult<TextFileContent> {
    let text = try_execute("Read file as utf-8 text", fs::read_to_string(file.path())).await?;
    Ok(TextFileContent {
        parent: file.parent.clone(),
        name: file.name.clone(),
        text,
    })
}

/// Read every matching text file, one after another, stopping at the first failure
pub async fn get_text_files_content(
    dir: &Path,
    extension: &str,
) -> PipelineResult<Vec<TextFileContent>> {
    let files = get_file_names(dir, extension).await?;
    sequence(files.iter().map(get_text_file_content)).await
}

pub async fn get_binary_file_content(file: &FileRef) -> PipelineResult<BinaryFileContent> {
    let bytes = try_execute("Read file as bytes", fs::read(file.path())).await?;
    Ok(BinaryFileContent {
        parent: file.parent.clone(),
        name: file.name.clone(),
        bytes,
    })
}

pub async fn get_image_file_content(file: &FileRef) -> PipelineResult<ImageFileContent> {
    let encoded = read_file_as_base64(&file.path()).await?;
    Ok(ImageFileContent {
        parent: file.parent.clone(),
        name: file.name.clone(),
        base64_url: base64_url(&file.name, &encoded),
    })
}

fn base64_url(name: &str, encoded: &str) -> String {
    let mime = if name.to_lowercase().ends_with(".png") {
        "image/png"
    } else {
        "image/jpeg"
    };
    format!("data:{};base64,{}", mime, encoded)
}

pub async fn read_file_as_base64(path: &Path) -> PipelineResult<String> {
    let bytes = try_execute("Read file as base64", fs::read(path)).await?;
    Ok(STANDARD.encode(bytes))
}

/// Write `content` to `dir/name` and return the written path
pub async fn save_text_file(dir: &Path, name: &str, content: &str) -> PipelineResult<PathBuf> {
    let path = dir.join(name);
    try_execute("Save file", fs::write(&path, content)).await?;
    info!("Saved file {}", path.display());
    Ok(path)
}
