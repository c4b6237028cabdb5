//! Single-entry extraction from a zip container.
//!
//! Entries are located through the central directory, so archives written by
//! streaming zip writers (sizes in trailing data descriptors) read the same
//! as any other. The chosen entry is copied to a temp file beside the
//! destination and renamed into place only once complete.

use std::fs;
use std::io::{self, Read, Seek};
use std::path::Path;

use tempfile::NamedTempFile;
use zip::ZipArchive;

use crate::ProvisionError;

/// Entry paths may use `\` on archives built on Windows.
fn normalize_entry_path(name: &str) -> String {
    name.replace('\\', "/")
}

fn io_error(path: &Path, source: io::Error) -> ProvisionError {
    ProvisionError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Read `reader` as a zip archive and write the first entry, in archive
/// order, whose path ends with `entry_suffix` to `dest`, marked executable.
///
/// Returns `Ok(false)` when no entry matches; `dest` is then left untouched.
pub fn extract_entry<R: Read + Seek>(
    reader: R,
    entry_suffix: &str,
    dest: &Path,
) -> Result<bool, ProvisionError> {
    let mut archive = ZipArchive::new(reader)?;
    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| io_error(parent, e))?;

    let mut found = false;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let name = normalize_entry_path(entry.name());
        if entry.is_dir() || !name.ends_with(entry_suffix) {
            continue;
        }
        let written = io::copy(&mut entry, tmp.as_file_mut()).map_err(|e| io_error(dest, e))?;
        tracing::debug!(entry = %name, bytes = written, index, "Extracted archive entry");
        found = true;
        break;
    }

    if !found {
        tracing::debug!(
            entries = archive.len(),
            suffix = entry_suffix,
            "No archive entry matched"
        );
        return Ok(false);
    }

    tmp.as_file().sync_all().map_err(|e| io_error(dest, e))?;
    set_executable(tmp.path())?;
    tmp.persist(dest).map_err(|e| io_error(dest, e.error))?;
    Ok(true)
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<(), ProvisionError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(|e| io_error(path, e))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<(), ProvisionError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, bytes) in entries {
            writer
                .start_file(*name, zip::write::FileOptions::default())
                .unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn crc32(bytes: &[u8]) -> u32 {
        let mut crc = !0u32;
        for &b in bytes {
            crc ^= u32::from(b);
            for _ in 0..8 {
                crc = if crc & 1 == 1 { (crc >> 1) ^ 0xEDB8_8320 } else { crc >> 1 };
            }
        }
        !crc
    }

    /// Stored entries laid out the way a streaming writer emits them: general
    /// purpose flag bit 3 set, zero sizes in the local headers, and the real
    /// CRC and sizes in a data descriptor after each entry.
    fn descriptor_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
        const DOS_DATE: u16 = 0x0021;

        let mut out = Vec::new();
        let mut central = Vec::new();
        for (name, data) in entries {
            let offset = u32::try_from(out.len()).unwrap();
            let crc = crc32(data);
            let size = u32::try_from(data.len()).unwrap();
            let name_len = u16::try_from(name.len()).unwrap();

            out.extend_from_slice(&0x0403_4b50u32.to_le_bytes());
            out.extend_from_slice(&20u16.to_le_bytes());
            out.extend_from_slice(&FLAG_DATA_DESCRIPTOR.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes()); // stored
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&DOS_DATE.to_le_bytes());
            out.extend_from_slice(&[0u8; 12]); // crc and sizes deferred
            out.extend_from_slice(&name_len.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(data);
            out.extend_from_slice(&0x0807_4b50u32.to_le_bytes());
            out.extend_from_slice(&crc.to_le_bytes());
            out.extend_from_slice(&size.to_le_bytes());
            out.extend_from_slice(&size.to_le_bytes());

            central.extend_from_slice(&0x0201_4b50u32.to_le_bytes());
            central.extend_from_slice(&20u16.to_le_bytes());
            central.extend_from_slice(&20u16.to_le_bytes());
            central.extend_from_slice(&FLAG_DATA_DESCRIPTOR.to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&DOS_DATE.to_le_bytes());
            central.extend_from_slice(&crc.to_le_bytes());
            central.extend_from_slice(&size.to_le_bytes());
            central.extend_from_slice(&size.to_le_bytes());
            central.extend_from_slice(&name_len.to_le_bytes());
            central.extend_from_slice(&[0u8; 12]); // extra, comment, disk, attrs
            central.extend_from_slice(&offset.to_le_bytes());
            central.extend_from_slice(name.as_bytes());
        }

        let central_offset = u32::try_from(out.len()).unwrap();
        let central_size = u32::try_from(central.len()).unwrap();
        let count = u16::try_from(entries.len()).unwrap();
        out.extend_from_slice(&central);
        out.extend_from_slice(&0x0605_4b50u32.to_le_bytes());
        out.extend_from_slice(&[0u8; 4]);
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&central_size.to_le_bytes());
        out.extend_from_slice(&central_offset.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out
    }

    #[test]
    fn data_descriptor_entries_are_extracted() {
        let archive = descriptor_zip(&[
            ("pkg/README", b"read me first"),
            ("pkg/bin/glslangValidator", b"#!validator"),
        ]);
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("glslangValidator-linux");

        let found = extract_entry(Cursor::new(archive), "bin/glslangValidator", &dest).unwrap();

        assert!(found);
        assert_eq!(fs::read(&dest).unwrap(), b"#!validator");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn first_match_in_archive_order_wins() {
        let archive = build_zip(&[("a/bin/glsl_analyzer", b"first"), ("b/bin/glsl_analyzer", b"second")]);
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("glsl_analyzer-x86_64-linux");

        assert!(extract_entry(Cursor::new(archive), "bin/glsl_analyzer", &dest).unwrap());
        assert_eq!(fs::read(&dest).unwrap(), b"first");
    }

    #[test]
    fn extracts_only_the_matching_entry() {
        let archive = build_zip(&[("foo/baz.txt", b"readme"), ("foo/bar.exe", b"BINARY")]);
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("bar.exe");

        let found = extract_entry(Cursor::new(archive), "bar.exe", &dest).unwrap();

        assert!(found);
        assert_eq!(fs::read(&dest).unwrap(), b"BINARY");
        // only the destination remains, no temp leftovers
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn missing_entry_leaves_destination_absent() {
        let archive = build_zip(&[("foo/bar.exe", b"BINARY"), ("foo/baz.txt", b"readme")]);
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("qux.exe");

        let found = extract_entry(Cursor::new(archive), "qux.exe", &dest).unwrap();

        assert!(!found);
        assert!(!dest.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn backslash_entry_names_are_normalized() {
        let archive = build_zip(&[("pkg\\bin\\glslangValidator.exe", b"MZ")]);
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("glslangValidator-windows.exe");

        let found =
            extract_entry(Cursor::new(archive), "bin/glslangValidator.exe", &dest).unwrap();

        assert!(found);
        assert_eq!(fs::read(&dest).unwrap(), b"MZ");
    }

    #[test]
    fn directory_entries_are_skipped() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .add_directory("release/bin/glsl_analyzer", zip::write::FileOptions::default())
            .unwrap();
        writer
            .start_file("release/bin/glsl_analyzer", zip::write::FileOptions::default())
            .unwrap();
        writer.write_all(b"ELF").unwrap();
        let archive = writer.finish().unwrap().into_inner();

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("glsl_analyzer-x86_64-linux");
        assert!(extract_entry(Cursor::new(archive), "bin/glsl_analyzer", &dest).unwrap());
        assert_eq!(fs::read(&dest).unwrap(), b"ELF");
    }

    #[cfg(unix)]
    #[test]
    fn extracted_binary_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let archive = build_zip(&[("bin/glsl_analyzer", b"ELF")]);
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("glsl_analyzer-x86_64-linux");

        extract_entry(Cursor::new(archive), "bin/glsl_analyzer", &dest).unwrap();

        let mode = fs::metadata(&dest).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o755);
    }

    #[test]
    fn garbage_input_is_an_archive_error() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("bin");
        let err = extract_entry(Cursor::new(b"not a zip at all".to_vec()), "bin", &dest)
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Archive(_)));
        assert!(!dest.exists());
    }
}
