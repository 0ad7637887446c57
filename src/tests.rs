use std::fs::{self, File};
use std::io::Write;

use tempfile::TempDir;

use crate::{create, is_link, paths_equivalent, read, rmtree_shallow, unlink, Error};

fn create_tempdir() -> TempDir {
    tempfile::Builder::new()
        .prefix("win-symlink-test-")
        .tempdir()
        .unwrap()
}

#[test]
fn create_then_read_round_trips() {
    let tmpdir = create_tempdir();
    let target = tmpdir.path().join("target");
    let link = tmpdir.path().join("link");
    fs::create_dir_all(&target).unwrap();
    File::create(target.join("file"))
        .unwrap()
        .write_all(b"foo")
        .unwrap();

    create(&target, &link).unwrap();

    let read_back = read(&link).expect("link should read back as a junction");
    assert!(
        paths_equivalent(&read_back, &target),
        "{} should be equivalent to {}",
        read_back.display(),
        target.display()
    );
    assert!(is_link(&link));
    assert!(
        link.join("file").exists(),
        "target contents should be visible through the link"
    );
}

#[test]
fn create_into_missing_parent() {
    let tmpdir = create_tempdir();
    let target = tmpdir.path().join("target");
    let link = tmpdir.path().join("a/b/link");
    fs::create_dir_all(&target).unwrap();

    create(&target, &link).unwrap();
    assert!(is_link(&link));
}

#[test]
fn create_replaces_existing_link() {
    let tmpdir = create_tempdir();
    let target1 = tmpdir.path().join("target1");
    let target2 = tmpdir.path().join("target2");
    let link = tmpdir.path().join("link");
    fs::create_dir_all(&target1).unwrap();
    fs::create_dir_all(&target2).unwrap();
    File::create(target2.join("marker")).unwrap();

    create(&target1, &link).unwrap();
    create(&target1, &link).unwrap(); // same pair again
    create(&target2, &link).unwrap(); // retarget

    assert!(paths_equivalent(read(&link).unwrap(), &target2));
    assert!(link.join("marker").exists());
}

#[test]
fn create_replaces_empty_plain_directory() {
    let tmpdir = create_tempdir();
    let target = tmpdir.path().join("target");
    let link = tmpdir.path().join("link");
    fs::create_dir_all(&target).unwrap();
    fs::create_dir_all(&link).unwrap();

    create(&target, &link).unwrap();
    assert!(is_link(&link));
}

#[test]
fn create_refuses_nonempty_plain_directory() {
    let tmpdir = create_tempdir();
    let target = tmpdir.path().join("target");
    let link = tmpdir.path().join("link");
    let canary = link.join("do_not_delete");
    fs::create_dir_all(&target).unwrap();
    fs::create_dir_all(&link).unwrap();
    File::create(&canary).unwrap().write_all(b"foo").unwrap();

    match create(&target, &link) {
        Err(Error::RemoveDir { path, .. }) => assert_eq!(path, link),
        other => panic!("expected RemoveDir error, got {other:?}"),
    }
    assert!(canary.exists(), "directory contents must survive");
    assert!(!is_link(&link));
}

#[test]
fn read_on_non_links_is_none() {
    let tmpdir = create_tempdir();

    assert_eq!(read(tmpdir.path().join("missing")), None);

    let file = tmpdir.path().join("file");
    File::create(&file).unwrap().write_all(b"foo").unwrap();
    assert_eq!(read(&file), None);
    assert!(!is_link(&file));

    let dir = tmpdir.path().join("dir");
    fs::create_dir_all(&dir).unwrap();
    assert_eq!(read(&dir), None);
    assert!(!is_link(&dir));
}

#[test]
fn unlink_is_idempotent_on_non_links() {
    let tmpdir = create_tempdir();

    unlink(tmpdir.path().join("missing")).unwrap();

    let file = tmpdir.path().join("file");
    File::create(&file).unwrap().write_all(b"foo").unwrap();
    unlink(&file).unwrap();
    assert!(file.exists(), "unlink must not touch a plain file");

    let dir = tmpdir.path().join("dir");
    fs::create_dir_all(&dir).unwrap();
    unlink(&dir).unwrap();
    assert!(dir.exists(), "unlink must not touch a plain directory");
}

#[test]
fn unlink_removes_link_and_shell() {
    let tmpdir = create_tempdir();
    let target = tmpdir.path().join("target");
    let link = tmpdir.path().join("link");
    fs::create_dir_all(&target).unwrap();
    File::create(target.join("file")).unwrap();

    create(&target, &link).unwrap();
    unlink(&link).unwrap();

    assert!(!is_link(&link));
    assert!(!link.exists(), "link entry should be gone entirely");
    assert!(target.join("file").exists(), "target must be untouched");

    // Unlinking again is a no-op.
    unlink(&link).unwrap();
}

#[test]
fn rmtree_shallow_does_not_follow_links() {
    let tmpdir = create_tempdir();
    let d1 = tmpdir.path().join("d1");
    let dt = d1.join("t");
    let d2 = tmpdir.path().join("d2");
    let canary = d2.join("do_not_delete");

    fs::create_dir_all(&dt).unwrap();
    fs::create_dir_all(&d2).unwrap();
    File::create(&canary).unwrap().write_all(b"foo").unwrap();
    create(&d2, dt.join("d2")).unwrap(); // "d1/t/d2" -> "d2"

    rmtree_shallow(&d1).unwrap();

    assert!(!d1.exists());
    assert!(canary.exists(), "contents behind the junction must survive");
}

#[test]
fn rmtree_shallow_on_link_itself() {
    let tmpdir = create_tempdir();
    let target = tmpdir.path().join("target");
    let link = tmpdir.path().join("link");
    let canary = target.join("do_not_delete");
    fs::create_dir_all(&target).unwrap();
    File::create(&canary).unwrap().write_all(b"foo").unwrap();
    create(&target, &link).unwrap();

    rmtree_shallow(&link).unwrap();

    assert!(!link.exists());
    assert!(canary.exists());
}

#[test]
fn rmtree_shallow_clears_readonly_files() {
    let tmpdir = create_tempdir();
    let dir = tmpdir.path().join("dir");
    let file = dir.join("file");
    fs::create_dir_all(&dir).unwrap();
    File::create(&file).unwrap().write_all(b"foo").unwrap();
    let mut perms = fs::metadata(&file).unwrap().permissions();
    perms.set_readonly(true);
    fs::set_permissions(&file, perms).unwrap();

    rmtree_shallow(&dir).unwrap();
    assert!(!dir.exists());
}

#[test]
fn link_usable_through_create_dir_all() {
    let tmpdir = create_tempdir();
    let target = tmpdir.path().join("target");
    let link = tmpdir.path().join("link");
    let nested = link.join("a/b");
    fs::create_dir_all(&target).unwrap();

    create(&target, &link).unwrap();
    fs::create_dir_all(&nested).unwrap();

    // `is_dir` follows links even though the junction is not itself a
    // plain directory.
    assert!(link.is_dir());
    assert!(nested.exists());
    assert!(target.join("a/b").exists());
}

#[test]
fn paths_equivalent_cases() {
    let tmpdir = create_tempdir();
    let target = tmpdir.path().join("target");
    let link = tmpdir.path().join("link");
    fs::create_dir_all(&target).unwrap();
    create(&target, &link).unwrap();

    assert!(paths_equivalent("", ""));
    assert!(!paths_equivalent("", &target));
    assert!(!paths_equivalent(&target, ""));
    assert!(paths_equivalent(&target, &target));
    assert!(
        paths_equivalent(&link, &target),
        "a link and its target resolve to the same record"
    );
    assert!(!paths_equivalent(&target, tmpdir.path()));
    assert!(!paths_equivalent(
        tmpdir.path().join("missing1"),
        tmpdir.path().join("missing2")
    ));
}
