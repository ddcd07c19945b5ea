use std::fs::{self, File};
use std::io::Write;
use std::os::windows::fs::{symlink_dir, symlink_file, OpenOptionsExt};
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use crate::{
    classify, create_junction, delete_path, expand_short_names, is_symlink_or_junction, read_target,
    CreateJunctionError, CreateJunctionResult, DeletePathError, ExpandShortNamesError,
    IsSymlinkOrJunctionError, LinkKind, LinkType, ReadLinkError, MAX_JUNCTION_TARGET_LEN,
};

// IO_REPARSE_TAG_SYMLINK
const SYMLINK_TAG: u32 = 0xA000_000C;
const FILE_FLAG_BACKUP_SEMANTICS: u32 = 0x0200_0000;
// Everyone
const WORLD_SID: &str = "*S-1-1-0";

struct Scratch {
    _tmpdir: TempDir,
    /// Canonical root, without the `\\?\` prefix `fs::canonicalize` adds.
    root: PathBuf,
}

impl Scratch {
    fn join(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

fn create_tempdir() -> Scratch {
    let tmpdir = tempfile::Builder::new()
        .prefix("dirlink-test-")
        .tempdir_in("target/debug")
        .unwrap();
    let canonical = fs::canonicalize(tmpdir.path()).unwrap();
    let root = PathBuf::from(canonical.to_str().unwrap().trim_start_matches(r"\\?\"));
    Scratch { _tmpdir: tmpdir, root }
}

fn prefixed(p: &Path) -> PathBuf {
    PathBuf::from(format!(r"\\?\{}", p.display()))
}

fn device_prefixed(p: &Path) -> PathBuf {
    PathBuf::from(format!(r"\\.\{}", p.display()))
}

fn with_trailing_separator(p: &Path) -> PathBuf {
    PathBuf::from(format!(r"{}\", p.display()))
}

fn icacls(dir: &Path, args: &[&str]) -> bool {
    Command::new("icacls")
        .arg(dir)
        .args(args)
        .status()
        .map_or(false, |status| status.success())
}

fn write_file(p: &Path, content: &[u8]) {
    File::create(p).unwrap().write_all(content).unwrap();
}

#[test]
fn junction_lifecycle() {
    let tmpdir = create_tempdir();
    let out = tmpdir.join("out");
    let path = out.join("bin");
    let target = tmpdir.join("execroot").join("bin");
    fs::create_dir_all(&out).unwrap();
    fs::create_dir_all(&target).unwrap();

    create_junction(&path, &target).unwrap();
    assert_eq!(classify(&path), Ok(LinkKind::ManagedLink(LinkType::Junction)));
    assert_eq!(is_symlink_or_junction(&path), Ok(true));
    assert_eq!(read_target(&path).unwrap(), target);
    delete_path(&path).unwrap();
    assert_eq!(is_symlink_or_junction(&path), Err(IsSymlinkOrJunctionError::DoesNotExist));
    assert!(target.is_dir());
}

#[test]
fn create_twice_is_a_no_op() {
    let tmpdir = create_tempdir();
    let target = tmpdir.join("target");
    let junction = tmpdir.join("junction");
    fs::create_dir_all(&target).unwrap();

    create_junction(&junction, &target).unwrap();
    create_junction(&junction, &target).unwrap();
    assert_eq!(read_target(&junction).unwrap(), target);

    // Prefix and letter case do not make a different target.
    let shouted = PathBuf::from(target.to_str().unwrap().to_uppercase());
    create_junction(prefixed(&junction), prefixed(&shouted)).unwrap();
    assert_eq!(read_target(&junction).unwrap(), target);

    // Neither does a trailing backslash.
    create_junction(&junction, with_trailing_separator(&target)).unwrap();
    assert_eq!(read_target(&junction).unwrap(), target);
}

#[test]
fn create_stores_target_without_trailing_separator() {
    let tmpdir = create_tempdir();
    let target = tmpdir.join("target");
    let junction = tmpdir.join("junction");
    fs::create_dir_all(&target).unwrap();

    create_junction(&junction, with_trailing_separator(&target)).unwrap();
    assert_eq!(read_target(&junction).unwrap(), target);
    create_junction(&junction, &target).unwrap();
}

#[test]
fn create_dir_all_with_junctions() {
    let tmpdir = create_tempdir();
    let target = tmpdir.join("target");
    let junction = tmpdir.join("junction");
    let b = junction.join(r"a\b");
    fs::create_dir_all(&target).unwrap();

    create_junction(&junction, &target).unwrap();
    fs::create_dir_all(&b).unwrap();
    // the junction itself is not a directory, but `is_dir()` on a Path
    // follows links
    assert!(junction.is_dir());
    assert!(target.join(r"a\b").is_dir());
}

#[test]
fn create_converts_empty_directory() {
    let tmpdir = create_tempdir();
    let target = tmpdir.join("target");
    let junction = tmpdir.join("junction");
    fs::create_dir_all(&target).unwrap();
    write_file(&target.join("file"), b"foo");
    fs::create_dir_all(&junction).unwrap();

    create_junction(&junction, &target).unwrap();
    assert!(is_symlink_or_junction(&junction).unwrap());
    assert!(junction.join("file").exists(), "file should be accessible via the junction");
}

#[test]
fn create_keeps_non_empty_directory() {
    let tmpdir = create_tempdir();
    let target = tmpdir.join("target");
    let junction = tmpdir.join("junction");
    let canary = junction.join("do_not_delete");
    fs::create_dir_all(&junction).unwrap();
    write_file(&canary, b"foo");

    let result = create_junction(&junction, &target);
    assert_eq!(result, Err(CreateJunctionError::AlreadyExistsButNotJunction));
    assert_eq!(CreateJunctionResult::of(&result).code(), 4);
    assert_eq!(classify(&junction), Ok(LinkKind::Directory));
    assert_eq!(fs::read(&canary).unwrap(), b"foo");
}

#[test]
fn create_keeps_file() {
    let tmpdir = create_tempdir();
    let target = tmpdir.join("target");
    let file = tmpdir.join("file");
    write_file(&file, b"foo");

    assert_eq!(
        create_junction(&file, &target),
        Err(CreateJunctionError::AlreadyExistsButNotJunction)
    );
    assert_eq!(fs::read(&file).unwrap(), b"foo");
}

#[test]
fn create_keeps_junction_to_other_target() {
    let tmpdir = create_tempdir();
    let first = tmpdir.join("first");
    let second = tmpdir.join("second");
    let junction = tmpdir.join("junction");

    create_junction(&junction, &first).unwrap();
    assert_eq!(
        create_junction(&junction, &second),
        Err(CreateJunctionError::AlreadyExistsWithDifferentTarget)
    );
    assert_eq!(read_target(&junction).unwrap(), first);
}

#[test]
fn create_on_held_placeholder() {
    let tmpdir = create_tempdir();
    let target = tmpdir.join("target");
    let junction = tmpdir.join("junction");
    fs::create_dir_all(&junction).unwrap();
    let held = fs::OpenOptions::new()
        .read(true)
        .share_mode(0)
        .custom_flags(FILE_FLAG_BACKUP_SEMANTICS)
        .open(&junction)
        .unwrap();

    let result = create_junction(&junction, &target);
    assert_eq!(result, Err(CreateJunctionError::AccessDenied));
    assert_eq!(CreateJunctionResult::of(&result).code(), 5);
    assert!(!result.unwrap_err().is_retryable());

    drop(held);
    assert_eq!(classify(&junction), Ok(LinkKind::Directory));
    create_junction(&junction, &target).unwrap();
    assert_eq!(read_target(&junction).unwrap(), target);
}

#[test]
fn create_in_write_protected_parent() {
    let tmpdir = create_tempdir();
    let parent = tmpdir.join("locked");
    let junction = parent.join("junction");
    fs::create_dir_all(&parent).unwrap();
    // Nobody may add subdirectories to `parent`.
    let deny = format!("{WORLD_SID}:(AD)");
    assert!(icacls(&parent, &["/deny", deny.as_str()]));
    scopeguard::defer! {
        icacls(&parent, &["/remove:d", WORLD_SID]);
    }

    let result = create_junction(&junction, tmpdir.join("target"));
    assert_eq!(result, Err(CreateJunctionError::AccessDenied));
    assert!(!result.unwrap_err().is_retryable());
    assert!(!junction.exists());
}

#[test]
fn create_target_no_exist() {
    let tmpdir = create_tempdir();
    let target = tmpdir.join("target");
    let junction = tmpdir.join("junction");

    match create_junction(&junction, &target) {
        Ok(()) => {}
        _ => panic!("junction should point to non exist target path"),
    }
    assert!(!target.exists());
    assert_eq!(read_target(&junction).unwrap(), target);
}

#[test]
fn create_target_too_long() {
    let tmpdir = create_tempdir();
    let junction = tmpdir.join("junction");
    let mut target = tmpdir.join("target");
    while target.as_os_str().len() <= MAX_JUNCTION_TARGET_LEN {
        target.push("a".repeat(200));
    }

    let result = create_junction(&junction, &target);
    assert_eq!(result, Err(CreateJunctionError::TargetNameTooLong));
    assert_eq!(CreateJunctionResult::of(&result), CreateJunctionResult::TargetNameTooLong);
    assert!(!junction.exists(), "nothing should be created");
}

#[test]
fn create_without_parent() {
    let tmpdir = create_tempdir();
    let junction = tmpdir.join(r"missing\junction");

    match create_junction(&junction, tmpdir.join("target")) {
        Err(CreateJunctionError::Other(message)) => assert!(message.starts_with("CreateDirectoryW(")),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn relative_paths_are_rejected() {
    let result = create_junction(r"foo\junction", r"C:\target");
    assert_eq!(CreateJunctionResult::of(&result), CreateJunctionResult::Error);
    assert!(matches!(delete_path(r"C:\foo\..\bar"), Err(DeletePathError::Other(_))));
    assert!(matches!(read_target("C:/foo"), Err(ReadLinkError::Other(_))));
    assert!(matches!(classify("NUL"), Err(IsSymlinkOrJunctionError::Other(_))));
}

#[test]
fn delete_junction_keeps_target() {
    let tmpdir = create_tempdir();
    let target = tmpdir.join("target");
    let junction = tmpdir.join("junction");
    let canary = target.join("do_not_delete");
    fs::create_dir_all(&target).unwrap();
    write_file(&canary, b"foo");

    create_junction(&junction, &target).unwrap();
    delete_path(&junction).unwrap();

    assert!(!junction.exists());
    assert_eq!(fs::read(&canary).unwrap(), b"foo");
}

#[test]
fn delete_junction_to_missing_target() {
    let tmpdir = create_tempdir();
    let junction = tmpdir.join("junction");

    create_junction(&junction, tmpdir.join("target")).unwrap();
    delete_path(prefixed(&junction)).unwrap();
    assert_eq!(classify(&junction), Err(IsSymlinkOrJunctionError::DoesNotExist));
}

#[test]
fn delete_paths() {
    let tmpdir = create_tempdir();

    let non_existence_dir = tmpdir.join("non_existence_dir");
    assert_eq!(delete_path(&non_existence_dir), Err(DeletePathError::DoesNotExist));
    assert_eq!(
        delete_path(non_existence_dir.join("child")),
        Err(DeletePathError::DoesNotExist)
    );

    let empty = tmpdir.join("empty");
    fs::create_dir_all(&empty).unwrap();
    delete_path(&empty).unwrap();
    assert!(!empty.exists());

    let file = tmpdir.join("foo-file");
    write_file(&file, b"foo");
    delete_path(&file).unwrap();
    assert!(!file.exists());
}

#[test]
fn delete_keeps_non_empty_directory() {
    let tmpdir = create_tempdir();
    let dir = tmpdir.join("dir");
    let canary = dir.join("do_not_delete");
    fs::create_dir_all(&dir).unwrap();
    write_file(&canary, b"foo");

    assert_eq!(delete_path(&dir), Err(DeletePathError::DirectoryNotEmpty));
    assert_eq!(fs::read(&canary).unwrap(), b"foo");
}

#[test]
fn delete_read_only_file() {
    let tmpdir = create_tempdir();
    let file = tmpdir.join("read-only");
    write_file(&file, b"foo");
    let mut permissions = fs::metadata(&file).unwrap().permissions();
    permissions.set_readonly(true);
    fs::set_permissions(&file, permissions).unwrap();

    delete_path(&file).unwrap();
    assert!(!file.exists());
}

#[test]
fn delete_file_held_open() {
    let tmpdir = create_tempdir();
    let file = tmpdir.join("busy");
    write_file(&file, b"foo");
    let held = fs::OpenOptions::new().read(true).share_mode(0).open(&file).unwrap();

    let result = delete_path(&file);
    assert_eq!(result, Err(DeletePathError::AccessDenied));
    assert!(result.unwrap_err().is_retryable());

    drop(held);
    delete_path(&file).unwrap();
}

#[test]
fn read_target_of_non_links() {
    let tmpdir = create_tempdir();

    let non_existence_dir = tmpdir.join("non_existence_dir");
    assert_eq!(read_target(&non_existence_dir), Err(ReadLinkError::DoesNotExist));

    let dir_not_junction = tmpdir.join("dir_not_junction");
    fs::create_dir_all(&dir_not_junction).unwrap();
    assert_eq!(read_target(&dir_not_junction), Err(ReadLinkError::NotALink));

    let file = tmpdir.join("foo-file");
    write_file(&file, b"foo");
    assert_eq!(read_target(&file), Err(ReadLinkError::NotALink));
}

#[test]
fn read_target_keeps_prefix_style() {
    let tmpdir = create_tempdir();
    let target = tmpdir.join("target");
    let junction = tmpdir.join("junction");

    create_junction(&junction, &target).unwrap();
    assert_eq!(read_target(&junction).unwrap(), target);
    assert_eq!(read_target(prefixed(&junction)).unwrap(), prefixed(&target));
    assert_eq!(read_target(device_prefixed(&junction)).unwrap(), device_prefixed(&target));
}

#[test]
fn classify_entries() {
    let tmpdir = create_tempdir();

    assert_eq!(classify(tmpdir.join("missing")), Err(IsSymlinkOrJunctionError::DoesNotExist));

    let dir = tmpdir.join("dir");
    fs::create_dir_all(&dir).unwrap();
    assert_eq!(classify(&dir), Ok(LinkKind::Directory));
    assert_eq!(is_symlink_or_junction(&dir), Ok(false));

    let file = tmpdir.join("file");
    write_file(&file, b"foo");
    assert_eq!(classify(&file), Ok(LinkKind::File));
    assert_eq!(classify(prefixed(&file)), Ok(LinkKind::File));
}

// Symlinks need SeCreateSymbolicLinkPrivilege or developer mode; skip the
// assertions where neither is available.
#[test]
fn classify_and_read_symlinks() {
    let tmpdir = create_tempdir();
    let dir = tmpdir.join("dir");
    let file = dir.join("file");
    fs::create_dir_all(&dir).unwrap();
    write_file(&file, b"foo");

    let dir_link = tmpdir.join("dir-link");
    if symlink_dir(&dir, &dir_link).is_ok() {
        assert_eq!(classify(&dir_link), Ok(LinkKind::ManagedLink(LinkType::DirectorySymlink)));
        assert_eq!(read_target(&dir_link).unwrap(), dir);
        assert_eq!(
            create_junction(&dir_link, &dir),
            Err(CreateJunctionError::AlreadyExistsButNotJunction)
        );
        delete_path(&dir_link).unwrap();
        assert!(file.exists());
    }

    let file_link = tmpdir.join("file-link");
    if symlink_file(&file, &file_link).is_ok() {
        assert_eq!(classify(&file_link), Ok(LinkKind::OtherReparsePoint { tag: SYMLINK_TAG }));
        assert_eq!(is_symlink_or_junction(&file_link), Ok(false));
        assert_eq!(read_target(&file_link).unwrap(), file);
    }

    let relative_link = tmpdir.join("relative-link");
    if symlink_dir("dir", &relative_link).is_ok() {
        assert_eq!(read_target(&relative_link).unwrap(), PathBuf::from("dir"));
    }
}

#[test]
fn get_target_user_dirs() {
    // junction
    assert_eq!(
        read_target(r"C:\Users\Default User").unwrap().to_str(),
        Some(r"C:\Users\Default"),
    );
    // junction with special permissions
    assert_eq!(
        read_target(r"C:\Documents and Settings").unwrap().to_str(),
        Some(r"C:\Users"),
    );
}

#[test]
fn expand_without_short_names() {
    let tmpdir = create_tempdir();
    let missing = tmpdir.join(r"no\such\path");
    assert_eq!(expand_short_names(&missing).unwrap(), missing);
    assert_eq!(expand_short_names("NUL").unwrap(), PathBuf::from("NUL"));
    assert!(matches!(
        expand_short_names(r"relative\PROGRA~1"),
        Err(ExpandShortNamesError::NotNormalized(_))
    ));
}

#[test]
fn expand_missing_short_name() {
    let tmpdir = create_tempdir();
    let missing = tmpdir.join(r"NOSUCH~1\x");
    match expand_short_names(&missing) {
        Err(ExpandShortNamesError::Unresolved { path, .. }) => assert_eq!(path, missing),
        other => panic!("unexpected {other:?}"),
    }
}

// Only meaningful on volumes with 8dot3 name generation enabled.
#[test]
fn expand_program_files() {
    let short = Path::new(r"C:\PROGRA~1");
    if !short.exists() {
        return;
    }
    let long = expand_short_names(short).unwrap();
    assert!(!long.to_str().unwrap().contains('~'));
    assert_eq!(expand_short_names(prefixed(short)).unwrap(), prefixed(&long));

    let tmpdir = create_tempdir();
    let junction = tmpdir.join("junction");
    create_junction(&junction, short).unwrap();
    assert_eq!(read_target(&junction).unwrap(), long);
}
