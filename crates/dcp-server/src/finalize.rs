use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::Utc;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

use dcp_core::JobId;

/// Append one timestamped line to `<working_dir>/job.log` (spec §6).
pub fn append_job_log(working_dir: &Path, line: &str) -> std::io::Result<()> {
    std::fs::create_dir_all(working_dir)?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(working_dir.join("job.log"))?;
    writeln!(file, "[{}] {}", Utc::now().to_rfc3339(), line)
}

/// Reject any caller-supplied relative path that could escape the job's
/// working directory (spec §6).
pub fn reject_path_traversal(relative: &str) -> std::io::Result<()> {
    if relative.split('/').any(|segment| segment == "..") {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("path traversal rejected: {relative:?}"),
        ));
    }
    Ok(())
}

/// Archive `working_dir` into `<output_dir>/<jobId>.zip`, then delete the
/// working directory (spec §4.3/§6: finalization on job completion).
pub fn finalize_working_dir(
    working_dir: &Path,
    output_dir: &Path,
    job_id: JobId,
) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let zip_path = output_dir.join(format!("{job_id}.zip"));
    let file = File::create(&zip_path)?;
    let mut writer = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for entry in WalkDir::new(working_dir).into_iter().filter_map(Result::ok) {
        let path = entry.path();
        let relative = path
            .strip_prefix(working_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        if relative.is_empty() {
            continue;
        }
        if entry.file_type().is_dir() {
            writer.add_directory(format!("{relative}/"), options)?;
        } else {
            writer.start_file(relative, options)?;
            let bytes = std::fs::read(path)?;
            writer.write_all(&bytes)?;
        }
    }
    writer.finish()?;

    std::fs::remove_dir_all(working_dir).or_else(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            Ok(())
        } else {
            Err(err)
        }
    })?;
    Ok(zip_path)
}

/// Resume checkpoint layout: `saved/<jobId>` holds the serialized job state,
/// `tasks/<jobId>/<taskId>` holds each outstanding task's payload so a
/// restarted coordinator can re-offer them without re-querying the job
/// object (spec §6's optional resume feature).
pub fn saved_job_path(output_dir: &Path, job_id: JobId) -> PathBuf {
    output_dir.join("saved").join(job_id.to_string())
}

pub fn saved_task_path(output_dir: &Path, job_id: JobId, task_id: i32) -> PathBuf {
    output_dir
        .join("tasks")
        .join(job_id.to_string())
        .join(task_id.to_string())
}

/// Write `bytes` atomically (write-to-temp then rename), the same durable
/// write idiom used by the artifact store's `FileStore`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_dotdot_segments() {
        assert!(reject_path_traversal("a/../b").is_err());
        assert!(reject_path_traversal("a/b/c").is_ok());
    }

    #[test]
    fn zips_and_removes_working_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let working = tmp.path().join("work");
        std::fs::create_dir_all(working.join("nested")).unwrap();
        std::fs::write(working.join("output.txt"), b"55").unwrap();
        std::fs::write(working.join("nested/extra.txt"), b"x").unwrap();

        let output_dir = tmp.path().join("out");
        let job_id = JobId::new();
        let zip_path = finalize_working_dir(&working, &output_dir, job_id).unwrap();

        assert!(zip_path.exists());
        assert!(!working.exists());

        let file = File::open(&zip_path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        assert!(archive.by_name("output.txt").is_ok());
    }

    #[test]
    fn job_log_appends_with_timestamp() {
        let tmp = tempfile::tempdir().unwrap();
        append_job_log(tmp.path(), "started").unwrap();
        append_job_log(tmp.path(), "finished").unwrap();
        let contents = std::fs::read_to_string(tmp.path().join("job.log")).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains("started"));
        assert!(contents.contains("finished"));
    }
}
