use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use super::{
    ArchiveResources, BootstrapRepository, FileSystemRepository, MapResources, ModuleContent,
    ModuleRepository, RepositoryChain, RepositoryError, ResourceRepository, SourceHandle,
};
use crate::runtime::module_id::ModuleId;

fn temp_root(label: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut root = std::env::temp_dir();
    root.push(format!("loam_repository_test_{}_{}", label, nanos));
    fs::create_dir_all(&root).expect("create temp root");
    root
}

fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(path, contents).expect("write file");
}

fn id(path: &str) -> ModuleId {
    ModuleId::parse(path).unwrap()
}

fn source_of(repo: &dyn ModuleRepository, path: &str) -> String {
    let location = repo.locate(&id(path)).unwrap().expect("module located");
    match location.content {
        ModuleContent::Source(handle) => handle
            .read(&location.repository, &location.source_name)
            .unwrap(),
        ModuleContent::Prebuilt(_) => panic!("expected source for {path}"),
    }
}

fn tar_bytes(files: &[(&str, &str)]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut builder = tar::Builder::new(&mut buf);
        for (path, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, path, contents.as_bytes())
                .expect("append tar entry");
        }
        builder.finish().expect("finish tar");
    }
    buf
}

#[test]
fn directory_repository_maps_paths_to_files() {
    let root = temp_root("dir_locate");
    write_file(&root.join("src/a/b.loam"), "[\"define\", \"x\", 1]");
    let repo = FileSystemRepository::new(&root);

    assert_eq!(repo.module_file(&id("/a/b")), root.join("src/a/b.loam"));
    assert!(repo.identify().starts_with("dir:"));
    assert_eq!(source_of(&repo, "/a/b"), "[\"define\", \"x\", 1]");
    assert!(repo.locate(&id("/a/c")).unwrap().is_none());
    assert!(repo.locate(&id("/a")).unwrap().is_none());
}

#[test]
fn directory_repository_collects_valid_modules() {
    let root = temp_root("dir_collect");
    write_file(&root.join("src/a/b.loam"), "");
    write_file(&root.join("src/a/c.loam"), "");
    write_file(&root.join("src/top.loam"), "");
    write_file(&root.join("src/not-a-module.loam"), "");
    write_file(&root.join("src/notes.txt"), "");
    let repo = FileSystemRepository::new(&root);

    let all = repo.collect_modules(&|_| true).unwrap();
    assert_eq!(all, vec![id("/a/b"), id("/a/c"), id("/top")]);

    let prefix = id("/a");
    let nested = repo.collect_modules(&|m| m.is_within(&prefix)).unwrap();
    assert_eq!(nested.len(), 2);

    let missing = FileSystemRepository::new(root.join("nowhere"));
    assert!(missing.collect_modules(&|_| true).unwrap().is_empty());
}

#[cfg(unix)]
#[test]
fn directory_walk_ignores_symlink_loops() {
    let root = temp_root("dir_symlink_loop");
    write_file(&root.join("src/a/b.loam"), "");
    std::os::unix::fs::symlink(root.join("src/a"), root.join("src/a/again"))
        .expect("create symlink");
    let repo = FileSystemRepository::new(&root);

    assert_eq!(repo.collect_modules(&|_| true).unwrap(), vec![id("/a/b")]);
}

#[test]
fn resource_repository_reads_listed_modules() {
    let resources = MapResources::new("lib")
        .with(
            "manifest.json",
            r#"{"version": 1, "root": "/pkg", "modules": ["/a/b"]}"#,
        )
        .with("pkg/src/a/b.loam", "[\"define\", \"x\", 2]");
    let repo = ResourceRepository::new(resources).unwrap();

    assert_eq!(repo.resource_name(&id("/a/b")), "pkg/src/a/b.loam");
    assert_eq!(source_of(&repo, "/a/b"), "[\"define\", \"x\", 2]");
    assert!(repo.locate(&id("/a/c")).unwrap().is_none());
    assert_eq!(repo.collect_modules(&|_| true).unwrap(), vec![id("/a/b")]);
}

#[test]
fn listed_but_missing_resource_is_a_read_error() {
    let resources = MapResources::new("lib").with(
        "manifest.json",
        r#"{"version": 1, "root": "/", "modules": ["/gone"]}"#,
    );
    let repo = ResourceRepository::new(resources).unwrap();
    let err = repo.locate(&id("/gone")).unwrap_err();
    assert!(matches!(err, RepositoryError::Read { .. }));
    assert_eq!(err.code().code, "E102");
}

#[test]
fn bad_manifests_are_rejected() {
    let cases = [
        r#"{"version": 2, "root": "/", "modules": []}"#,
        r#"{"version": 1, "root": "pkg", "modules": []}"#,
        r#"{"version": 1, "root": "/", "modules": ["dum/my"]}"#,
        r#"{"version": 1, "root": "/", "modules": ["dummy"]}"#,
        r#"not json"#,
    ];
    for manifest in cases {
        let resources = MapResources::new("bad").with("manifest.json", manifest);
        let err = ResourceRepository::new(resources).err().expect("manifest rejected");
        assert!(
            matches!(err, RepositoryError::InvalidManifest { .. }),
            "unexpected error for {manifest}: {err}"
        );
    }

    let err = ResourceRepository::new(MapResources::new("empty")).err().unwrap();
    assert_eq!(err.code().code, "E103");
}

#[test]
fn archive_resources_come_from_tar() {
    let bytes = tar_bytes(&[
        (
            "manifest.json",
            r#"{"version": 1, "root": "/", "modules": ["/packed"]}"#,
        ),
        ("src/packed.loam", "[\"define\", \"packed\", true]"),
    ]);
    let resources = ArchiveResources::from_bytes(Path::new("lib.tar"), bytes).unwrap();
    let repo = ResourceRepository::new(resources).unwrap();

    assert_eq!(repo.identify(), "archive:lib.tar");
    assert_eq!(source_of(&repo, "/packed"), "[\"define\", \"packed\", true]");
}

#[test]
fn bootstrap_carries_kernel_and_library() {
    let repo = BootstrapRepository::new().unwrap();
    let modules = repo.collect_modules(&|_| true).unwrap();
    assert_eq!(modules, vec![id("/loam/base"), id("/loam/kernel"), id("/loam/list")]);

    let kernel = repo.locate(&id("/loam/kernel")).unwrap().unwrap();
    assert!(matches!(kernel.content, ModuleContent::Prebuilt(_)));
    assert!(source_of(&repo, "/loam/base").contains("empty_list"));
}

#[test]
fn chain_takes_first_match() {
    let low = temp_root("chain_low");
    let high = temp_root("chain_high");
    write_file(&low.join("src/greet.loam"), "low");
    write_file(&high.join("src/greet.loam"), "high");
    write_file(&low.join("src/only_low.loam"), "only");

    let chain = RepositoryChain::new(vec![
        Arc::new(FileSystemRepository::new(&high)),
        Arc::new(FileSystemRepository::new(&low)),
    ]);

    let location = chain.resolve(&id("greet")).unwrap().unwrap();
    assert_eq!(location.repository, format!("dir:{}", high.display()));
    let ModuleContent::Source(SourceHandle::File(file)) = location.content else {
        panic!("expected file source");
    };
    assert_eq!(fs::read_to_string(file).unwrap(), "high");

    assert!(chain.resolve(&id("/only_low")).unwrap().is_some());
    assert!(chain.resolve(&id("/nothing")).unwrap().is_none());
    assert_eq!(
        chain.collect_modules(&|_| true).unwrap(),
        vec![id("/greet"), id("/only_low")]
    );
    assert!(chain.describe().contains(", dir:"));
    assert_eq!(RepositoryChain::default().describe(), "no repositories configured");
}
